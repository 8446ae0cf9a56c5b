//! Items, edited through server-rendered HTML forms.

pub mod item_form;
pub mod item_repository;
pub mod item_view;
