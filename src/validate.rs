//! Schema validation for candidate change-set documents.
//!
//! Validation is a pure function of the JSON document: no filesystem
//! access, no side effects. All violations are collected and reported
//! together, each tagged with a `changes/2/content`-style locator, so the
//! operator sees the complete diagnostic in one pass rather than fixing
//! errors one at a time.

use crate::changeset::{
    Change, ChangeSet, Encoding, CHANGE_SET_INTENT, CHANGE_SET_VERSION,
};
use serde_json::Value;
use std::fmt;

/// One schema violation, with a path locator into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub locator: String,
    pub message: String,
}

impl SchemaError {
    fn new(locator: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.locator.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.locator, self.message)
        }
    }
}

const TOP_LEVEL_KEYS: &[&str] = &["version", "intent", "changes", "commands", "notes"];
const WRITE_KEYS: &[&str] = &["action", "path", "content", "encoding"];
const DELETE_KEYS: &[&str] = &["action", "path"];
const MOVE_KEYS: &[&str] = &["action", "from", "to"];

/// Validate a candidate document against the change-set schema.
///
/// Returns the typed `ChangeSet` only when the document is fully
/// conforming; otherwise every violation found is returned. The schema is
/// closed: unknown keys at any level reject the document.
pub fn validate(doc: &Value) -> Result<ChangeSet, Vec<SchemaError>> {
    let mut errors = Vec::new();

    let Some(obj) = doc.as_object() else {
        return Err(vec![SchemaError::new("", "document must be a JSON object")]);
    };

    for key in obj.keys() {
        if !TOP_LEVEL_KEYS.contains(&key.as_str()) {
            errors.push(SchemaError::new(key.clone(), "unknown key"));
        }
    }

    check_literal(obj.get("version"), "version", CHANGE_SET_VERSION, &mut errors);
    check_literal(obj.get("intent"), "intent", CHANGE_SET_INTENT, &mut errors);

    let mut changes = Vec::new();
    match obj.get("changes") {
        None => errors.push(SchemaError::new("changes", "required key is missing")),
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                if let Some(change) = validate_change(index, entry, &mut errors) {
                    changes.push(change);
                }
            }
        }
        Some(_) => errors.push(SchemaError::new("changes", "must be an array")),
    }

    let mut commands = Vec::new();
    match obj.get("commands") {
        None | Some(Value::Null) => {}
        Some(Value::Array(entries)) => {
            for (index, entry) in entries.iter().enumerate() {
                match entry.as_str() {
                    Some(command) => commands.push(command.to_string()),
                    None => errors.push(SchemaError::new(
                        format!("commands/{}", index),
                        "must be a string",
                    )),
                }
            }
        }
        Some(_) => errors.push(SchemaError::new("commands", "must be an array of strings")),
    }

    let notes = match obj.get("notes") {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            errors.push(SchemaError::new("notes", "must be a string"));
            None
        }
    };

    if errors.is_empty() {
        Ok(ChangeSet {
            changes,
            commands,
            notes,
        })
    } else {
        Err(errors)
    }
}

fn check_literal(
    value: Option<&Value>,
    key: &str,
    expected: &str,
    errors: &mut Vec<SchemaError>,
) {
    match value {
        None => errors.push(SchemaError::new(key, "required key is missing")),
        Some(Value::String(actual)) if actual == expected => {}
        Some(Value::String(actual)) => errors.push(SchemaError::new(
            key,
            format!("must be \"{}\" (got \"{}\")", expected, actual),
        )),
        Some(_) => errors.push(SchemaError::new(key, format!("must be \"{}\"", expected))),
    }
}

fn validate_change(
    index: usize,
    entry: &Value,
    errors: &mut Vec<SchemaError>,
) -> Option<Change> {
    let locator = |field: &str| {
        if field.is_empty() {
            format!("changes/{}", index)
        } else {
            format!("changes/{}/{}", index, field)
        }
    };

    let Some(obj) = entry.as_object() else {
        errors.push(SchemaError::new(locator(""), "must be an object"));
        return None;
    };

    let action = match obj.get("action").and_then(Value::as_str) {
        Some(action) => action,
        None => {
            errors.push(SchemaError::new(
                locator("action"),
                "required key is missing or not a string",
            ));
            return None;
        }
    };

    let allowed_keys = match action {
        "write" | "create" => WRITE_KEYS,
        "delete" => DELETE_KEYS,
        "move" => MOVE_KEYS,
        other => {
            errors.push(SchemaError::new(
                locator("action"),
                format!(
                    "unknown action \"{}\" (expected write, create, delete, or move)",
                    other
                ),
            ));
            return None;
        }
    };

    for key in obj.keys() {
        if !allowed_keys.contains(&key.as_str()) {
            errors.push(SchemaError::new(
                locator(key),
                format!("unknown key for action \"{}\"", action),
            ));
        }
    }

    let before = errors.len();

    let change = match action {
        "write" | "create" => {
            let path = require_string(obj.get("path"), &locator("path"), errors);
            let content = require_string(obj.get("content"), &locator("content"), errors);
            let encoding = match obj.get("encoding") {
                None | Some(Value::Null) => Some(Encoding::default()),
                Some(Value::String(raw)) => match Encoding::parse(raw) {
                    Some(encoding) => Some(encoding),
                    None => {
                        errors.push(SchemaError::new(
                            locator("encoding"),
                            format!("must be \"utf-8\" or \"base64\" (got \"{}\")", raw),
                        ));
                        None
                    }
                },
                Some(_) => {
                    errors.push(SchemaError::new(
                        locator("encoding"),
                        "must be \"utf-8\" or \"base64\"",
                    ));
                    None
                }
            };
            match (path, content, encoding) {
                (Some(path), Some(content), Some(encoding)) if action == "write" => {
                    Some(Change::Write {
                        path,
                        content,
                        encoding,
                    })
                }
                (Some(path), Some(content), Some(encoding)) => Some(Change::Create {
                    path,
                    content,
                    encoding,
                }),
                _ => None,
            }
        }
        "delete" => require_string(obj.get("path"), &locator("path"), errors)
            .map(|path| Change::Delete { path }),
        "move" => {
            let from = require_string(obj.get("from"), &locator("from"), errors);
            let to = require_string(obj.get("to"), &locator("to"), errors);
            match (from, to) {
                (Some(from), Some(to)) => Some(Change::Move { from, to }),
                _ => None,
            }
        }
        _ => unreachable!("action already matched against the known tag set"),
    };

    debug_assert!(change.is_some() || errors.len() > before);
    change
}

fn require_string(
    value: Option<&Value>,
    locator: &str,
    errors: &mut Vec<SchemaError>,
) -> Option<String> {
    match value {
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            errors.push(SchemaError::new(locator, "must be a string"));
            None
        }
        None => {
            errors.push(SchemaError::new(locator, "required key is missing"));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn locators(errors: &[SchemaError]) -> Vec<&str> {
        errors.iter().map(|e| e.locator.as_str()).collect()
    }

    #[test]
    fn accepts_minimal_valid_document() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [
                {"action": "write", "path": "src/Main.java", "encoding": "utf-8", "content": "class Main {}"}
            ]
        });
        let change_set = validate(&doc).unwrap();
        assert_eq!(change_set.changes.len(), 1);
        assert!(change_set.commands.is_empty());
        assert_eq!(
            change_set.changes[0],
            Change::Write {
                path: "src/Main.java".into(),
                content: "class Main {}".into(),
                encoding: Encoding::Utf8,
            }
        );
    }

    #[test]
    fn accepts_all_four_actions_and_optional_fields() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [
                {"action": "create", "path": "a.bin", "content": "aGk=", "encoding": "base64"},
                {"action": "write", "path": "b.txt", "content": "hello"},
                {"action": "delete", "path": "old.txt"},
                {"action": "move", "from": "a.bin", "to": "dir/a.bin"}
            ],
            "commands": ["./gradlew build"],
            "notes": "renamed and rebuilt"
        });
        let change_set = validate(&doc).unwrap();
        assert_eq!(change_set.changes.len(), 4);
        assert_eq!(change_set.commands, vec!["./gradlew build".to_string()]);
        assert_eq!(change_set.notes.as_deref(), Some("renamed and rebuilt"));
        // encoding defaults to utf-8 when absent
        assert!(matches!(
            change_set.changes[1],
            Change::Write { encoding: Encoding::Utf8, .. }
        ));
    }

    #[test]
    fn rejects_missing_required_top_level_keys() {
        let errors = validate(&json!({})).unwrap_err();
        let locs = locators(&errors);
        assert!(locs.contains(&"version"));
        assert!(locs.contains(&"intent"));
        assert!(locs.contains(&"changes"));
    }

    #[test]
    fn rejects_wrong_discriminator_values() {
        let doc = json!({"version": "2", "intent": "do_stuff", "changes": []});
        let errors = validate(&doc).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("\"1\""));
        assert!(errors[1].message.contains("\"apply_fixes\""));
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [],
            "mode": "fast"
        });
        let errors = validate(&doc).unwrap_err();
        assert_eq!(locators(&errors), vec!["mode"]);
    }

    #[test]
    fn rejects_unknown_action() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [{"action": "chmod", "path": "a"}]
        });
        let errors = validate(&doc).unwrap_err();
        assert_eq!(locators(&errors), vec!["changes/0/action"]);
        assert!(errors[0].message.contains("chmod"));
    }

    #[test]
    fn enforces_per_action_required_fields() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [
                {"action": "write", "path": "a.txt"},
                {"action": "move", "from": "a.txt"},
                {"action": "delete"}
            ]
        });
        let errors = validate(&doc).unwrap_err();
        let locs = locators(&errors);
        assert!(locs.contains(&"changes/0/content"));
        assert!(locs.contains(&"changes/1/to"));
        assert!(locs.contains(&"changes/2/path"));
    }

    #[test]
    fn rejects_unknown_key_inside_change() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [{"action": "delete", "path": "a", "recursive": true}]
        });
        let errors = validate(&doc).unwrap_err();
        assert_eq!(locators(&errors), vec!["changes/0/recursive"]);
    }

    #[test]
    fn rejects_bad_encoding_value() {
        let doc = json!({
            "version": "1",
            "intent": "apply_fixes",
            "changes": [{"action": "write", "path": "a", "content": "x", "encoding": "latin-1"}]
        });
        let errors = validate(&doc).unwrap_err();
        assert_eq!(locators(&errors), vec!["changes/0/encoding"]);
    }

    #[test]
    fn collects_every_violation_not_just_the_first() {
        let doc = json!({
            "version": 1,
            "changes": [
                {"action": "write", "path": "a.txt"},
                {"action": "noop"}
            ],
            "commands": [1],
            "extra": {}
        });
        let errors = validate(&doc).unwrap_err();
        let locs = locators(&errors);
        assert!(locs.contains(&"extra"));
        assert!(locs.contains(&"version"));
        assert!(locs.contains(&"intent"));
        assert!(locs.contains(&"changes/0/content"));
        assert!(locs.contains(&"changes/1/action"));
        assert!(locs.contains(&"commands/0"));
        assert!(errors.len() >= 6);
    }

    #[test]
    fn rejects_non_object_documents() {
        for doc in [json!([]), json!("text"), json!(null)] {
            let errors = validate(&doc).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].message.contains("JSON object"));
        }
    }

    #[test]
    fn schema_error_display_includes_locator() {
        let err = SchemaError::new("changes/2/content", "required key is missing");
        assert_eq!(err.to_string(), "changes/2/content: required key is missing");
    }
}
