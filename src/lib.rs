//! A small shop: items edited through validated HTML forms, and members
//! registered through a JSON API under unique names.

pub mod app;
pub mod feature;
pub mod infra;
