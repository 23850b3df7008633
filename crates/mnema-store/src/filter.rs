use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mnema_core::{Memory, MemoryModality, MemoryType};

/// Structural filter over memory payloads.
///
/// List-valued fields match when the memory matches any listed value;
/// separate fields combine with AND. An empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryFilter {
    /// Match any of these memory types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_types: Option<Vec<MemoryType>>,
    /// Match any of these modalities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<MemoryModality>>,
    /// Match any of these authors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    /// Match any of these projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projects: Option<Vec<String>>,
    /// Match memories carrying any of these tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// Creation timestamp lower bound (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    /// Creation timestamp upper bound (inclusive).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
}

impl MemoryFilter {
    /// True when no condition is set.
    pub fn is_empty(&self) -> bool {
        self.memory_types.is_none()
            && self.modalities.is_none()
            && self.authors.is_none()
            && self.projects.is_none()
            && self.tags.is_none()
            && self.date_from.is_none()
            && self.date_to.is_none()
    }

    /// Evaluate the filter against a memory.
    pub fn matches(&self, memory: &Memory) -> bool {
        if let Some(types) = &self.memory_types {
            if !types.contains(&memory.memory_type) {
                return false;
            }
        }
        if let Some(modalities) = &self.modalities {
            if !modalities.contains(&memory.modality) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            match &memory.metadata.author {
                Some(author) if authors.contains(author) => {}
                _ => return false,
            }
        }
        if let Some(projects) = &self.projects {
            match &memory.metadata.project {
                Some(project) if projects.contains(project) => {}
                _ => return false,
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().any(|t| memory.metadata.tags.contains(t)) {
                return false;
            }
        }
        if let Some(from) = self.date_from {
            if memory.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if memory.created_at > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mnema_core::MemoryMetadata;

    fn tagged_memory(author: &str, project: &str, tags: &[&str]) -> Memory {
        Memory::new("content").with_metadata(MemoryMetadata {
            author: Some(author.to_string()),
            project: Some(project.to_string()),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            ..MemoryMetadata::default()
        })
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = MemoryFilter::default();
        assert!(filter.is_empty());
        assert!(filter.matches(&Memory::new("anything")));
    }

    #[test]
    fn any_of_within_field() {
        let memory = tagged_memory("ada", "compilers", &["parsing"]);
        let filter = MemoryFilter {
            authors: Some(vec!["grace".into(), "ada".into()]),
            ..MemoryFilter::default()
        };
        assert!(filter.matches(&memory), "any listed author should match");
    }

    #[test]
    fn and_across_fields() {
        let memory = tagged_memory("ada", "compilers", &["parsing"]);
        let filter = MemoryFilter {
            authors: Some(vec!["ada".into()]),
            projects: Some(vec!["databases".into()]),
            ..MemoryFilter::default()
        };
        assert!(!filter.matches(&memory), "all fields must match");
    }

    #[test]
    fn tag_overlap_matches() {
        let memory = tagged_memory("ada", "compilers", &["parsing", "grammars"]);
        let filter = MemoryFilter {
            tags: Some(vec!["grammars".into()]),
            ..MemoryFilter::default()
        };
        assert!(filter.matches(&memory));

        let miss = MemoryFilter {
            tags: Some(vec!["cooking".into()]),
            ..MemoryFilter::default()
        };
        assert!(!miss.matches(&memory));
    }

    #[test]
    fn missing_author_fails_author_filter() {
        let memory = Memory::new("anonymous note");
        let filter = MemoryFilter {
            authors: Some(vec!["ada".into()]),
            ..MemoryFilter::default()
        };
        assert!(!filter.matches(&memory));
    }

    #[test]
    fn date_window_is_inclusive() {
        let memory = Memory::new("dated");
        let filter = MemoryFilter {
            date_from: Some(memory.created_at),
            date_to: Some(memory.created_at),
            ..MemoryFilter::default()
        };
        assert!(filter.matches(&memory));

        let later = MemoryFilter {
            date_from: Some(memory.created_at + Duration::days(1)),
            ..MemoryFilter::default()
        };
        assert!(!later.matches(&memory));
    }
}
