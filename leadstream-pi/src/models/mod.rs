//! Data models for leadstream-pi

pub mod import_session;

pub use import_session::{ImportProgress, ImportSession, SessionStatus};
