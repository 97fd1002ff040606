pub mod cv;
pub mod request_log;
pub mod user;
