//! Author model
//!
//! Authors are the bylines attached to posts. They are separate from `User`
//! accounts: a guest writer can have an author profile without a login.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub name: String,
    /// Avatar image URL
    pub avatar: Option<String>,
    pub bio: Option<String>,
    /// Social links, e.g. `{"twitter": "...", "github": "..."}`
    pub social: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an author
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAuthorInput {
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub social: Option<serde_json::Value>,
}

impl CreateAuthorInput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Input for updating an author. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAuthorInput {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub social: Option<serde_json::Value>,
}

/// Social links must be a JSON object
pub fn is_valid_social(value: &serde_json::Value) -> bool {
    value.is_object()
}

/// Decode the stored `social` column. Unparseable text falls back to `{}`.
pub(crate) fn decode_social(raw: Option<String>) -> serde_json::Value {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_else(|| serde_json::json!({}))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_social() {
        assert_eq!(decode_social(None), serde_json::json!({}));
        assert_eq!(decode_social(Some("not json".into())), serde_json::json!({}));
        assert_eq!(
            decode_social(Some(r#"{"github":"ada"}"#.into())),
            serde_json::json!({"github": "ada"})
        );
    }

    #[test]
    fn test_is_valid_social() {
        assert!(is_valid_social(&serde_json::json!({})));
        assert!(!is_valid_social(&serde_json::json!(["x"])));
    }
}
