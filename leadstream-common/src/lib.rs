//! # LeadStream Common Library
//!
//! Shared code for LeadStream services including:
//! - Prospect record type
//! - Import stream event types (ImportEvent enum)
//! - SSE wire framing (frame encoding and consumer-side reassembly)
//! - Common error types

pub mod error;
pub mod events;
pub mod prospect;
pub mod sse;

pub use error::{Error, Result};
pub use events::ImportEvent;
pub use prospect::Prospect;
