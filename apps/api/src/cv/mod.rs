//! CV records: storage, listing, validation and the JSON API.

pub mod handlers;
pub mod listing;
pub mod repository;
pub mod validation;
