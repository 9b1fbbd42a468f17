//! Core data models for annota.
//!
//! These types are shared across all annota crates and represent
//! the core domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// NOTE TYPES
// =============================================================================

/// Maximum length of the user, course, and usage identifier fields.
pub const SCOPE_FIELD_MAX_LEN: usize = 255;

/// A stored annotation attached to a piece of course content.
///
/// Wire format notes: `id` serializes as a string UUID and the storage
/// column `user_id` serializes as `user`, matching the public API contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: String,
    pub course_id: String,
    pub usage_id: String,
    pub text: String,
    pub quote: String,
    pub ranges: Vec<NoteRange>,
    pub tags: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Positional anchor of an annotation within the annotated document.
///
/// `start` and `end` are serialized XPath-like element locators; the
/// offsets are character positions within those elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRange {
    pub start: String,
    pub end: String,
    #[serde(rename = "startOffset")]
    pub start_offset: i64,
    #[serde(rename = "endOffset")]
    pub end_offset: i64,
}

/// Request body for creating a note.
///
/// `user`, `course_id`, `usage_id`, and at least one range are required.
/// Text, quote, and tags default to empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNoteRequest {
    pub user: String,
    pub course_id: String,
    pub usage_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub quote: String,
    pub ranges: Vec<NoteRange>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateNoteRequest {
    /// Validate field presence and length limits.
    pub fn validate(&self) -> Result<()> {
        if self.user.is_empty() {
            return Err(Error::InvalidInput("user may not be blank".to_string()));
        }
        if self.course_id.is_empty() {
            return Err(Error::InvalidInput(
                "course_id may not be blank".to_string(),
            ));
        }
        if self.usage_id.is_empty() {
            return Err(Error::InvalidInput("usage_id may not be blank".to_string()));
        }
        if self.ranges.is_empty() {
            return Err(Error::InvalidInput(
                "ranges must contain at least one range".to_string(),
            ));
        }
        for (field, value) in [
            ("user", &self.user),
            ("course_id", &self.course_id),
            ("usage_id", &self.usage_id),
        ] {
            if value.len() > SCOPE_FIELD_MAX_LEN {
                return Err(Error::InvalidInput(format!(
                    "{} exceeds {} characters",
                    field, SCOPE_FIELD_MAX_LEN
                )));
            }
        }
        Ok(())
    }
}

/// Request body for updating a note.
///
/// Only the text and tags of an existing note may change; both keys are
/// required. All other incoming fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNoteRequest {
    pub text: String,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_range() -> NoteRange {
        NoteRange {
            start: "/div[1]/p[2]".to_string(),
            end: "/div[1]/p[2]".to_string(),
            start_offset: 0,
            end_offset: 16,
        }
    }

    fn valid_request() -> CreateNoteRequest {
        CreateNoteRequest {
            user: "a-user".to_string(),
            course_id: "course-v1:edX+DemoX+Demo".to_string(),
            usage_id: "block-v1:edX+DemoX+Demo+type@html+block@1".to_string(),
            text: "a comment".to_string(),
            quote: "quoted passage".to_string(),
            ranges: vec![sample_range()],
            tags: vec!["pink".to_string()],
        }
    }

    #[test]
    fn test_note_serializes_user_id_as_user() {
        let note = Note {
            id: Uuid::nil(),
            user_id: "someone".to_string(),
            course_id: "c".to_string(),
            usage_id: "u".to_string(),
            text: String::new(),
            quote: String::new(),
            ranges: vec![sample_range()],
            tags: vec![],
            created: Utc::now(),
            updated: Utc::now(),
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["user"], "someone");
        assert!(value.get("user_id").is_none());
        assert!(value["id"].is_string());
    }

    #[test]
    fn test_range_offset_wire_names() {
        let value = serde_json::to_value(sample_range()).unwrap();
        assert_eq!(value["startOffset"], 0);
        assert_eq!(value["endOffset"], 16);
        assert!(value.get("start_offset").is_none());
    }

    #[test]
    fn test_create_request_defaults() {
        let body = serde_json::json!({
            "user": "u1",
            "course_id": "c1",
            "usage_id": "b1",
            "ranges": [{"start": "a", "end": "b", "startOffset": 0, "endOffset": 1}],
        });
        let req: CreateNoteRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.text, "");
        assert_eq!(req.quote, "");
        assert!(req.tags.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_create_request_missing_ranges_fails_deserialize() {
        let body = serde_json::json!({
            "user": "u1",
            "course_id": "c1",
            "usage_id": "b1",
        });
        assert!(serde_json::from_value::<CreateNoteRequest>(body).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_user() {
        let mut req = valid_request();
        req.user = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_course_id() {
        let mut req = valid_request();
        req.course_id = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_usage_id() {
        let mut req = valid_request();
        req.usage_id = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_ranges() {
        let mut req = valid_request();
        req.ranges.clear();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_scope_field() {
        let mut req = valid_request();
        req.user = "x".repeat(SCOPE_FIELD_MAX_LEN + 1);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_max_length_scope_field() {
        let mut req = valid_request();
        req.user = "x".repeat(SCOPE_FIELD_MAX_LEN);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_request_requires_both_keys() {
        let missing_tags = serde_json::json!({"text": "new"});
        assert!(serde_json::from_value::<UpdateNoteRequest>(missing_tags).is_err());

        let missing_text = serde_json::json!({"tags": ["a"]});
        assert!(serde_json::from_value::<UpdateNoteRequest>(missing_text).is_err());

        let both = serde_json::json!({"text": "new", "tags": ["a"]});
        assert!(serde_json::from_value::<UpdateNoteRequest>(both).is_ok());
    }

    #[test]
    fn test_update_request_ignores_extra_fields() {
        let body = serde_json::json!({
            "text": "new",
            "tags": [],
            "id": "not-applied",
            "user": "not-applied",
            "course_id": "not-applied",
        });
        let req: UpdateNoteRequest = serde_json::from_value(body).unwrap();
        assert_eq!(req.text, "new");
        assert!(req.tags.is_empty());
    }
}
