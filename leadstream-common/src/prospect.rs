//! Prospect record type shared across LeadStream services

use serde::{Deserialize, Serialize};

/// One ingested directory record.
///
/// Created when a source page is successfully mapped; immutable afterwards.
/// Display fields may be empty strings when the directory omits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prospect {
    /// Source-provided unique identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Job title or headline
    #[serde(default)]
    pub title: String,

    /// Current company
    #[serde(default)]
    pub company: String,

    /// Location string as reported by the directory
    #[serde(default)]
    pub location: String,

    /// Canonical link back to the directory entity
    pub profile_url: String,

    /// Profile picture, when the directory exposes one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,

    /// Relationship distance (1 = direct connection)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_degree: Option<u8>,
}
