use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The kind of content a memory was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryType {
    /// An ingested document chunk.
    Document,
    /// A free-form note.
    Note,
    /// A captured conversation turn.
    Conversation,
    /// An image caption or description.
    Image,
    /// An audio transcript.
    Audio,
    /// Content clipped from the web.
    Web,
}

impl Default for MemoryType {
    fn default() -> Self {
        Self::Note
    }
}

/// The modality of the stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryModality {
    /// Plain prose.
    Text,
    /// Tabular data.
    Table,
    /// Image content.
    Image,
    /// Source code.
    Code,
    /// A mix of the above.
    Mixed,
}

impl Default for MemoryModality {
    fn default() -> Self {
        Self::Text
    }
}

/// Metadata attached to a [`Memory`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Person who authored or captured the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Project the memory belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source file the content was extracted from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
    /// Source URL the content was clipped from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Page number within the source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Section heading within the source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Arbitrary key-value extras.
    #[serde(default)]
    pub custom: HashMap<String, serde_json::Value>,
}

/// A stored knowledge item.
///
/// Memories are owned by the vector store; the search and review engines read
/// them by id and attach derived scores and schedules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier.
    pub id: Uuid,
    /// The text content.
    pub content: String,
    /// Optional human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Content kind.
    #[serde(default)]
    pub memory_type: MemoryType,
    /// Content modality.
    #[serde(default)]
    pub modality: MemoryModality,
    /// Attached metadata.
    #[serde(default)]
    pub metadata: MemoryMetadata,
    /// Creation timestamp (UTC).
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp (UTC).
    pub updated_at: DateTime<Utc>,
    /// Monotonic version counter, bumped on update.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl Memory {
    /// Creates a new memory with the given content and default metadata.
    pub fn new(content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            title: None,
            memory_type: MemoryType::Note,
            modality: MemoryModality::Text,
            metadata: MemoryMetadata::default(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Sets the title. Chainable.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the memory type. Chainable.
    pub fn with_type(mut self, memory_type: MemoryType) -> Self {
        self.memory_type = memory_type;
        self
    }

    /// Replaces the metadata. Chainable.
    pub fn with_metadata(mut self, metadata: MemoryMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_defaults() {
        let m = Memory::new("some content");
        assert_eq!(m.memory_type, MemoryType::Note);
        assert_eq!(m.modality, MemoryModality::Text);
        assert_eq!(m.version, 1);
        assert!(m.title.is_none());
    }

    #[test]
    fn memory_serde_round_trip() {
        let m = Memory::new("hello").with_title("greeting");
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"note\""), "enum should serialize lowercase: {json}");
        let back: Memory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, m.id);
        assert_eq!(back.title.as_deref(), Some("greeting"));
    }
}
