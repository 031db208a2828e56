//! Path confinement for model-declared paths.
//!
//! Every `path`, `from`, and `to` in a change-set is untrusted. Resolution
//! joins the declared path onto the project root, refuses absolute paths
//! and parent traversal outright, then canonicalizes the deepest existing
//! ancestor so a symlink inside the root cannot redirect a write outside
//! it. Any result that does not sit under the canonicalized root fails
//! closed with `PathEscape`.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// A declared path resolved outside the project root (or could not be
/// resolved at all). Carries the offending declared path for diagnostics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("path escapes project root: '{declared}' ({reason})")]
pub struct PathEscape {
    pub declared: String,
    pub reason: String,
}

impl PathEscape {
    fn new(declared: &str, reason: impl Into<String>) -> Self {
        Self {
            declared: declared.to_string(),
            reason: reason.into(),
        }
    }
}

/// A confined path: absolute form for I/O, root-relative form for logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub absolute: PathBuf,
    pub relative: PathBuf,
}

/// Resolve a declared path to a location inside `root`.
///
/// The target itself does not have to exist (writes create it), but every
/// existing ancestor is canonicalized before the containment check so
/// `..`, absolute overrides, and symlink redirection all fail.
pub fn resolve(root: &Path, declared: &str) -> Result<ResolvedPath, PathEscape> {
    let candidate = Path::new(declared);

    if declared.trim().is_empty() {
        return Err(PathEscape::new(declared, "path is empty"));
    }
    if candidate.is_absolute() {
        return Err(PathEscape::new(declared, "absolute paths are not allowed"));
    }
    if candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(PathEscape::new(declared, "parent traversal is not allowed"));
    }

    let root = root
        .canonicalize()
        .map_err(|e| PathEscape::new(declared, format!("failed to resolve project root: {}", e)))?;
    let joined = root.join(candidate);

    // Canonicalize as much of the path as exists. For an existing target
    // this resolves the target itself (catching symlinked files); for a
    // new one it resolves the closest existing ancestor.
    let resolved_prefix = canonicalize_existing_prefix(&joined)
        .map_err(|reason| PathEscape::new(declared, reason))?;

    // Component-wise prefix check, so `/root/foobar` never passes for a
    // root of `/root/foo`. Exact equality (the root itself) is allowed.
    if !resolved_prefix.starts_with(&root) {
        return Err(PathEscape::new(declared, "resolved outside project root"));
    }

    let relative = joined
        .strip_prefix(&root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| candidate.to_path_buf());

    Ok(ResolvedPath {
        absolute: joined,
        relative,
    })
}

fn canonicalize_existing_prefix(path: &Path) -> Result<PathBuf, String> {
    let mut current = path.to_path_buf();
    while !current.exists() {
        if !current.pop() {
            return Err("path has no existing ancestor".to_string());
        }
    }
    current
        .canonicalize()
        .map_err(|e| format!("failed to resolve '{}': {}", current.display(), e))
}
