//! Declarative field constraints and the validation pass over request payloads.
//!
//! # Design
//! Each resource describes its fields once, as a static `FieldRule` table. The
//! same table drives creation (absent fields are required unless the rule
//! carries a default) and partial updates (every field optional). Validation
//! is a pure function: it never touches storage, and it reports every
//! violation instead of stopping at the first one.

use serde::Serialize;
use serde_json::{Map, Value};

/// Field name to value mapping, without the server-assigned `id`.
pub type Fields = Map<String, Value>;

/// Key that payloads may carry but which is owned by the server.
const ID_KEY: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text whose length, in characters, lies in `min..=max`.
    Text { min: usize, max: usize },
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Bool(bool),
    Null,
}

impl FieldDefault {
    fn to_value(self) -> Value {
        match self {
            FieldDefault::Bool(value) => Value::Bool(value),
            FieldDefault::Null => Value::Null,
        }
    }
}

/// One row of a resource's constraint table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
    /// Must be present on create. Rules with a default are never required.
    pub required: bool,
    pub nullable: bool,
    /// No two rows may hold the same non-null value for this field.
    pub unique: bool,
    pub default: Option<FieldDefault>,
}

impl FieldRule {
    pub const fn text(name: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            kind: FieldKind::Text { min, max },
            required: true,
            nullable: false,
            unique: false,
            default: None,
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Boolean,
            required: true,
            nullable: false,
            unique: false,
            default: None,
        }
    }

    pub const fn unique(self) -> Self {
        Self {
            unique: true,
            ..self
        }
    }

    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    pub const fn with_default(self, default: FieldDefault) -> Self {
        Self {
            required: false,
            default: Some(default),
            ..self
        }
    }

    fn check(&self, value: &Value) -> Result<(), ValidationDetail> {
        if value.is_null() {
            if self.nullable {
                return Ok(());
            }
            return Err(self.type_violation());
        }

        match self.kind {
            FieldKind::Text { min, max } => {
                let Some(text) = value.as_str() else {
                    return Err(self.type_violation());
                };
                let len = text.chars().count();
                if len == 0 && min > 0 {
                    Err(ValidationDetail::new(
                        self.name,
                        format!("\"{}\" is not allowed to be empty", self.name),
                        "string.empty",
                    ))
                } else if len < min {
                    Err(ValidationDetail::new(
                        self.name,
                        format!(
                            "\"{}\" length must be at least {min} characters long",
                            self.name
                        ),
                        "string.min",
                    ))
                } else if len > max {
                    Err(ValidationDetail::new(
                        self.name,
                        format!(
                            "\"{}\" length must be less than or equal to {max} characters long",
                            self.name
                        ),
                        "string.max",
                    ))
                } else {
                    Ok(())
                }
            }
            FieldKind::Boolean if value.is_boolean() => Ok(()),
            FieldKind::Boolean => Err(self.type_violation()),
        }
    }

    fn type_violation(&self) -> ValidationDetail {
        let (expected, rule) = match self.kind {
            FieldKind::Text { .. } => ("a string", "string.base"),
            FieldKind::Boolean => ("a boolean", "boolean.base"),
        };
        ValidationDetail::new(
            self.name,
            format!("\"{}\" must be {expected}", self.name),
            rule,
        )
    }
}

/// Which presence rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// A single field-level violation, as reported in `errorDetails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
    pub rule: &'static str,
}

impl ValidationDetail {
    fn new(field: &str, message: String, rule: &'static str) -> Self {
        Self {
            field: field.to_string(),
            message,
            rule,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub details: Vec<ValidationDetail>,
}

impl ValidationFailure {
    /// All detail messages joined into one sentence list.
    pub fn summary(&self) -> String {
        self.details
            .iter()
            .map(|detail| detail.message.as_str())
            .collect::<Vec<_>>()
            .join(". ")
    }
}

/// Check `payload` against `rules` and return the normalized field map.
///
/// On create, absent fields with a default are filled in. The `id` key is
/// dropped silently; any other key without a rule is a violation.
pub fn validate(
    rules: &[FieldRule],
    payload: &Value,
    mode: Mode,
) -> Result<Fields, ValidationFailure> {
    let Some(object) = payload.as_object() else {
        return Err(ValidationFailure {
            details: vec![ValidationDetail::new(
                "value",
                "\"value\" must be of type object".to_string(),
                "object.base",
            )],
        });
    };

    let mut details = Vec::new();
    let mut fields = Fields::new();

    for (key, value) in object {
        if key == ID_KEY {
            continue;
        }
        match rules.iter().find(|rule| rule.name == key) {
            Some(rule) => match rule.check(value) {
                Ok(()) => {
                    fields.insert(key.clone(), value.clone());
                }
                Err(detail) => details.push(detail),
            },
            None => details.push(ValidationDetail::new(
                key,
                format!("\"{key}\" is not allowed"),
                "object.unknown",
            )),
        }
    }

    if mode == Mode::Create {
        for rule in rules.iter().filter(|rule| !object.contains_key(rule.name)) {
            match rule.default {
                Some(default) => {
                    fields.insert(rule.name.to_string(), default.to_value());
                }
                None if rule.required => details.push(ValidationDetail::new(
                    rule.name,
                    format!("\"{}\" is required", rule.name),
                    "any.required",
                )),
                None => {}
            }
        }
    }

    if details.is_empty() {
        Ok(fields)
    } else {
        Err(ValidationFailure { details })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const RULES: &[FieldRule] = &[
        FieldRule::text("name", 1, 30).unique(),
        FieldRule::boolean("done").with_default(FieldDefault::Bool(false)),
        FieldRule::text("picture", 1, 10)
            .nullable()
            .with_default(FieldDefault::Null),
    ];

    fn rules_of(failure: &ValidationFailure) -> Vec<&'static str> {
        failure.details.iter().map(|d| d.rule).collect()
    }

    #[test]
    fn create_fills_defaults() {
        let fields = validate(RULES, &json!({"name": "write docs"}), Mode::Create).unwrap();
        assert_eq!(fields["name"], "write docs");
        assert_eq!(fields["done"], false);
        assert!(fields["picture"].is_null());
    }

    #[test]
    fn create_keeps_explicit_values() {
        let fields =
            validate(RULES, &json!({"name": "x", "done": true}), Mode::Create).unwrap();
        assert_eq!(fields["done"], true);
    }

    #[test]
    fn create_reports_missing_required_field() {
        let failure = validate(RULES, &json!({}), Mode::Create).unwrap_err();
        assert_eq!(rules_of(&failure), vec!["any.required"]);
        assert_eq!(failure.details[0].field, "name");
        assert_eq!(failure.summary(), "\"name\" is required");
    }

    #[test]
    fn update_treats_every_field_as_optional() {
        let fields = validate(RULES, &json!({}), Mode::Update).unwrap();
        assert!(fields.is_empty());

        let fields = validate(RULES, &json!({"done": true}), Mode::Update).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["done"], true);
    }

    #[test]
    fn empty_string_is_rejected() {
        let failure = validate(RULES, &json!({"name": ""}), Mode::Update).unwrap_err();
        assert_eq!(rules_of(&failure), vec!["string.empty"]);
    }

    #[test]
    fn text_length_is_counted_in_characters() {
        let thirty = "é".repeat(30);
        assert!(validate(RULES, &json!({ "name": thirty }), Mode::Create).is_ok());

        let too_long = "a".repeat(31);
        let failure = validate(RULES, &json!({ "name": too_long }), Mode::Create).unwrap_err();
        assert_eq!(rules_of(&failure), vec!["string.max"]);
    }

    #[test]
    fn wrong_types_are_rejected() {
        let failure =
            validate(RULES, &json!({"name": 12, "done": "yes"}), Mode::Create).unwrap_err();
        let mut rules = rules_of(&failure);
        rules.sort();
        assert_eq!(rules, vec!["boolean.base", "string.base"]);
    }

    #[test]
    fn null_only_allowed_on_nullable_fields() {
        assert!(validate(RULES, &json!({"picture": null}), Mode::Update).is_ok());
        let failure = validate(RULES, &json!({"done": null}), Mode::Update).unwrap_err();
        assert_eq!(rules_of(&failure), vec!["boolean.base"]);
    }

    #[test]
    fn unknown_keys_are_rejected_but_id_is_ignored() {
        let fields = validate(RULES, &json!({"id": 7, "done": true}), Mode::Update).unwrap();
        assert!(!fields.contains_key("id"));

        let failure = validate(RULES, &json!({"colour": "red"}), Mode::Update).unwrap_err();
        assert_eq!(rules_of(&failure), vec!["object.unknown"]);
        assert_eq!(failure.details[0].field, "colour");
    }

    #[test]
    fn every_violation_is_collected() {
        let failure =
            validate(RULES, &json!({"done": 1, "extra": true}), Mode::Create).unwrap_err();
        assert_eq!(failure.details.len(), 3);
        assert_eq!(failure.summary().matches(". ").count(), 2);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let failure = validate(RULES, &json!(["name"]), Mode::Create).unwrap_err();
        assert_eq!(rules_of(&failure), vec!["object.base"]);
    }
}
