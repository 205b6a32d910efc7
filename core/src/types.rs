//! Wire types for resource collections.
//!
//! # Design
//! These mirror the server's JSON but are defined independently; the
//! integration tests catch schema drift. An item is a free-form field map so
//! one client serves every resource.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;

pub type ItemId = u64;

/// Field name to value mapping.
pub type Fields = Map<String, Value>;

/// One member of a resource collection. `id` is `None` until the server has
/// acknowledged the item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Item {
    /// An item that has not been saved yet.
    pub fn unsaved(mut fields: Fields) -> Self {
        fields.remove("id");
        Self { id: None, fields }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Overwrite the given fields, leaving the others untouched. An `id` key
    /// is skipped; only the server assigns ids.
    pub fn merge(&mut self, fields: &Fields) {
        for (key, value) in fields.iter().filter(|(key, _)| key.as_str() != "id") {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self { page, per_page }
    }

    pub fn query(&self) -> String {
        format!("page={}&per_page={}", self.page, self.per_page)
    }
}

/// Parsed `content-range` header: `{begin}-{end}/{total}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub begin: u64,
    pub end: u64,
    pub total: u64,
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}/{}", self.begin, self.end, self.total)
    }
}

impl FromStr for ContentRange {
    type Err = ApiError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || ApiError::Deserialization(format!("invalid content-range: {raw:?}"));
        let (span, total) = raw.trim().split_once('/').ok_or_else(invalid)?;
        let (begin, end) = span.split_once('-').ok_or_else(invalid)?;
        Ok(Self {
            begin: begin.trim().parse().map_err(|_| invalid())?,
            end: end.trim().parse().map_err(|_| invalid())?,
            total: total.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Result of a list call.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub range: Option<ContentRange>,
}

/// One field-level violation reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub rule: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Vec<ErrorDetail>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn item_deserializes_id_apart_from_fields() {
        let item: Item = serde_json::from_value(json!({"id": 4, "name": "x", "done": true})).unwrap();
        assert_eq!(item.id, Some(4));
        assert_eq!(item.fields.len(), 2);
        assert_eq!(item.get("done"), Some(&json!(true)));
    }

    #[test]
    fn unsaved_item_serializes_without_id() {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("draft"));
        let json = serde_json::to_value(Item::unsaved(fields)).unwrap();
        assert_eq!(json, json!({"name": "draft"}));
    }

    #[test]
    fn merge_overwrites_only_given_fields() {
        let mut item: Item = serde_json::from_value(json!({"id": 1, "name": "a", "done": false})).unwrap();
        let patch = json!({"done": true}).as_object().cloned().unwrap();
        item.merge(&patch);
        assert_eq!(item.get("name"), Some(&json!("a")));
        assert_eq!(item.get("done"), Some(&json!(true)));
    }

    #[test]
    fn content_range_parses_and_prints() {
        let range: ContentRange = "3-4/5".parse().unwrap();
        assert_eq!(range, ContentRange { begin: 3, end: 4, total: 5 });
        assert_eq!(range.to_string(), "3-4/5");
    }

    #[test]
    fn content_range_rejects_garbage() {
        assert!("items 1-2".parse::<ContentRange>().is_err());
        assert!("a-b/c".parse::<ContentRange>().is_err());
    }

    #[test]
    fn error_body_details_are_optional() {
        let body: ErrorBody = serde_json::from_str(r#"{"errorMessage":"taken"}"#).unwrap();
        assert_eq!(body.error_message, "taken");
        assert!(body.error_details.is_none());
    }
}
