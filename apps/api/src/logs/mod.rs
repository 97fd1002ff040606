pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod repository;
