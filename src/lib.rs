pub mod accounts;
pub mod api;
pub mod app;
pub mod catalog;
pub mod config;
pub mod error;
pub mod progress;
pub mod seed;

pub use app::App;
pub use error::ServiceError;
