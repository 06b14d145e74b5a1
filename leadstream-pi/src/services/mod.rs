//! Business logic services for leadstream-pi

pub mod producer;
pub mod source;

pub use producer::{BatchProducer, ProducerConfig};
pub use source::{DirectorySearchClient, ProspectSource, SourceError, SourcePage};
