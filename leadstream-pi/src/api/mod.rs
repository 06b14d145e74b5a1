//! HTTP API handlers for leadstream-pi

pub mod health;
pub mod import_stream;

pub use health::health_routes;
pub use import_stream::{import_routes, StartImportRequest};
