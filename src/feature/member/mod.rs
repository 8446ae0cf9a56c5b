//! Members, registered through a JSON API under unique names.

pub mod member_api;
pub mod member_repository;
pub mod member_service;
