//! The features of the application.

pub mod item;
pub mod member;
