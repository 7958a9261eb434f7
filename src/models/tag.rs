//! Tag model
//!
//! This module defines the Tag entity, the `PostTag` junction row and the
//! outcome of a tag-set synchronization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tag entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// URL-friendly slug, unique across tags
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Tag with the number of live posts carrying it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagWithCount {
    #[serde(flatten)]
    pub tag: Tag,
    pub post_count: i64,
}

/// Input for creating a tag. The slug is generated from the name when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTagInput {
    pub name: String,
    #[serde(default)]
    pub slug: String,
}

/// Input for updating a tag
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTagInput {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// One row of the post/tag junction table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTag {
    pub post_id: i64,
    pub tag_id: i64,
    /// When this tag was first attached; kept across syncs that retain it
    pub created_at: DateTime<Utc>,
}

/// What a tag-set synchronization changed. Each list is sorted ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSyncOutcome {
    pub added: Vec<i64>,
    pub removed: Vec<i64>,
    pub unchanged: Vec<i64>,
}

impl TagSyncOutcome {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Tag ids attached to the post after the sync
    pub fn final_tag_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.added.iter().chain(&self.unchanged).copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_outcome_final_ids() {
        let outcome = TagSyncOutcome {
            added: vec![5, 1],
            removed: vec![3],
            unchanged: vec![2],
        };
        assert_eq!(outcome.final_tag_ids(), vec![1, 2, 5]);
        assert!(!outcome.is_noop());
        assert!(TagSyncOutcome::default().is_noop());
    }
}
