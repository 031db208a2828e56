//! The structured patch document a model proposes for a failed build.
//!
//! A `ChangeSet` is a flat, ordered list of whole-file operations plus
//! optional follow-up shell commands. It is parsed from untrusted model
//! output, so nothing here touches the filesystem; `validate` turns a raw
//! JSON value into these types and `apply` executes them.

/// The only accepted `version` discriminator.
pub const CHANGE_SET_VERSION: &str = "1";

/// The only accepted `intent` discriminator.
pub const CHANGE_SET_INTENT: &str = "apply_fixes";

/// Content encoding for `write`/`create` changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Base64,
}

impl Encoding {
    /// Parse the wire form. Both `utf-8` and `utf8` are accepted since
    /// models emit either spelling.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "base64" => Some(Encoding::Base64),
            _ => None,
        }
    }

}

/// One filesystem operation, tagged by its `action` value.
///
/// `Write` and `Create` carry identical semantics (create-or-overwrite with
/// the full content); the distinction exists so the model can express
/// intent, and it is preserved here so the action log echoes the declared
/// verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Write {
        path: String,
        content: String,
        encoding: Encoding,
    },
    Create {
        path: String,
        content: String,
        encoding: Encoding,
    },
    Delete {
        path: String,
    },
    Move {
        from: String,
        to: String,
    },
}

impl Change {
    /// The wire-level `action` tag.
    pub fn action(&self) -> &'static str {
        match self {
            Change::Write { .. } => "write",
            Change::Create { .. } => "create",
            Change::Delete { .. } => "delete",
            Change::Move { .. } => "move",
        }
    }
}

/// A validated patch document. Execution order is document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
    /// Shell commands to run after all changes are applied. Untrusted
    /// model output; execution is gated behind the apply flag.
    pub commands: Vec<String>,
    /// Free text from the model, surfaced to the operator and otherwise
    /// ignored by the engine.
    pub notes: Option<String>,
}
