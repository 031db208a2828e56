//! Applies a validated change-set to the project tree.
//!
//! Changes run strictly in document order; later changes may depend on
//! directories created by earlier ones. The first failure aborts the rest
//! of the pass, but actions already performed are not rolled back — the
//! partial action log is returned with the error so the operator can
//! reconcile manually.
//!
//! Dry-run mode (`apply_enabled = false`) produces the same action log
//! without touching the filesystem, giving callers a uniform
//! preview/apply interface.

use crate::changeset::{Change, ChangeSet, Encoding};
use crate::sandbox::{self, PathEscape, ResolvedPath};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Ordered, human-readable record of operations performed or simulated.
pub type ActionLog = Vec<String>;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    UnsafePath(#[from] PathEscape),

    #[error("invalid base64 content for '{path}': {source}")]
    BadEncoding {
        path: String,
        source: base64::DecodeError,
    },

    /// Unreachable while the validator and `Change` agree on the tag set;
    /// kept so drift between the two surfaces as an error, not silence.
    #[error("unknown action '{action}'")]
    UnknownAction { action: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },
}

impl ApplyError {
    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ApplyError::Io {
            context: context.into(),
            source,
        }
    }
}

/// An aborted apply pass: the error plus the log of everything that was
/// already done before it. Earlier actions are not rolled back.
#[derive(Debug)]
pub struct ApplyFailure {
    pub actions: ActionLog,
    pub error: ApplyError,
}

/// Apply every change in document order.
///
/// Each path-bearing field is confined via the sandbox before any mutation
/// for that change begins; a single escape aborts the whole pass. With
/// `apply_enabled = false` no I/O happens but the identical log is built.
pub fn apply(
    root: &Path,
    change_set: &ChangeSet,
    apply_enabled: bool,
) -> Result<ActionLog, ApplyFailure> {
    let mut actions = ActionLog::new();

    for change in &change_set.changes {
        match apply_change(root, change, apply_enabled) {
            Ok(entry) => actions.push(entry),
            Err(error) => return Err(ApplyFailure { actions, error }),
        }
    }

    Ok(actions)
}

fn apply_change(
    root: &Path,
    change: &Change,
    apply_enabled: bool,
) -> Result<String, ApplyError> {
    match change {
        Change::Write {
            path,
            content,
            encoding,
        }
        | Change::Create {
            path,
            content,
            encoding,
        } => {
            let resolved = sandbox::resolve(root, path)?;
            let bytes = decode_content(path, content, *encoding)?;
            if apply_enabled {
                write_file(&resolved, &bytes)?;
            }
            Ok(format!(
                "{} {}",
                change.action().to_uppercase(),
                resolved.relative.display()
            ))
        }
        Change::Delete { path } => {
            let resolved = sandbox::resolve(root, path)?;
            if apply_enabled {
                delete_path(&resolved)?;
            }
            Ok(format!("DELETE {}", resolved.relative.display()))
        }
        Change::Move { from, to } => {
            // Both endpoints are confined before anything moves.
            let source = sandbox::resolve(root, from)?;
            let dest = sandbox::resolve(root, to)?;
            if apply_enabled {
                move_path(&source, &dest)?;
            }
            Ok(format!(
                "MOVE {} -> {}",
                source.relative.display(),
                dest.relative.display()
            ))
        }
        #[allow(unreachable_patterns)]
        other => Err(ApplyError::UnknownAction {
            action: other.action().to_string(),
        }),
    }
}

fn decode_content(path: &str, content: &str, encoding: Encoding) -> Result<Vec<u8>, ApplyError> {
    match encoding {
        Encoding::Utf8 => Ok(content.as_bytes().to_vec()),
        Encoding::Base64 => BASE64
            .decode(content.trim())
            .map_err(|source| ApplyError::BadEncoding {
                path: path.to_string(),
                source,
            }),
    }
}

fn write_file(target: &ResolvedPath, bytes: &[u8]) -> Result<(), ApplyError> {
    if let Some(parent) = target.absolute.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ApplyError::io(
                format!("failed to create parent directories for '{}'", target.relative.display()),
                e,
            )
        })?;
    }
    fs::write(&target.absolute, bytes).map_err(|e| {
        ApplyError::io(format!("failed to write '{}'", target.relative.display()), e)
    })
}

fn delete_path(target: &ResolvedPath) -> Result<(), ApplyError> {
    // An absent target is a no-op, not an error.
    let metadata = match fs::symlink_metadata(&target.absolute) {
        Ok(metadata) => metadata,
        Err(_) => return Ok(()),
    };
    let result = if metadata.is_dir() {
        fs::remove_dir_all(&target.absolute)
    } else {
        fs::remove_file(&target.absolute)
    };
    result.map_err(|e| {
        ApplyError::io(format!("failed to delete '{}'", target.relative.display()), e)
    })
}

fn move_path(source: &ResolvedPath, dest: &ResolvedPath) -> Result<(), ApplyError> {
    if let Some(parent) = dest.absolute.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ApplyError::io(
                format!("failed to create parent directories for '{}'", dest.relative.display()),
                e,
            )
        })?;
    }
    fs::rename(&source.absolute, &dest.absolute).map_err(|e| {
        ApplyError::io(
            format!(
                "failed to move '{}' to '{}'",
                source.relative.display(),
                dest.relative.display()
            ),
            e,
        )
    })
}
