//! The build collaborator: runs the Gradle build for a project and hands
//! back its exit status and combined output. Output content is never
//! interpreted here beyond extracting a failure-marker summary for the
//! prompt.

use crate::util::{run_command_with_timeout, CommandRunResult};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use thiserror::Error;

const MAX_SUMMARY_TAIL_LINES: usize = 400;
const FAILURE_MARKERS: &[&str] = &[" FAILED", "error:", "FAILURE:", "Exception", "Caused by:"];

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no Gradle build file (build.gradle or build.gradle.kts) in '{}'", .root.display())]
    BuildFileMissing { root: PathBuf },

    #[error("build tool missing: {0}")]
    BuildToolMissing(String),

    #[error("failed to run build: {0}")]
    Failed(String),
}

/// Outcome of one build run. Exit code 0 means success; everything else,
/// including a timeout kill, is failure.
#[derive(Debug)]
pub struct BuildOutcome {
    pub exit_code: i32,
    pub output: String,
    pub timed_out: bool,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

/// Locate the Gradle build file in `root`, if any.
pub fn find_build_file(root: &Path) -> Option<PathBuf> {
    for name in ["build.gradle", "build.gradle.kts"] {
        let candidate = root.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Run `gradle build` in `root`, preferring the project's own wrapper.
pub fn run_build(root: &Path, timeout: Duration) -> Result<BuildOutcome, BuildError> {
    if find_build_file(root).is_none() {
        return Err(BuildError::BuildFileMissing {
            root: root.to_path_buf(),
        });
    }

    let mut command = build_command(root);
    command
        .current_dir(root)
        .env("ORG_GRADLE_COLOR", "false")
        .env("GRADLE_OPTS", gradle_opts());

    let result = run_command_with_timeout(&mut command, timeout).map_err(|e| {
        // The runner reports spawn failures with this prefix; that is the
        // "gradle is not installed" case when no wrapper exists.
        if e.starts_with("Failed to start command") {
            BuildError::BuildToolMissing(e)
        } else {
            BuildError::Failed(e)
        }
    })?;

    Ok(outcome_from(result))
}

fn build_command(root: &Path) -> Command {
    let wrapper_name = if cfg!(windows) { "gradlew.bat" } else { "gradlew" };
    let wrapper = root.join(wrapper_name);

    let mut command = if wrapper.exists() {
        if cfg!(windows) {
            let mut c = Command::new("cmd.exe");
            c.arg("/c").arg(&wrapper);
            c
        } else {
            Command::new(&wrapper)
        }
    } else {
        Command::new("gradle")
    };
    command.args(["build", "--no-daemon", "--stacktrace", "--info"]);
    command
}

fn gradle_opts() -> String {
    let existing = std::env::var("GRADLE_OPTS").unwrap_or_default();
    format!("{} -Dorg.gradle.console=plain", existing)
        .trim()
        .to_string()
}

fn outcome_from(result: CommandRunResult) -> BuildOutcome {
    let mut output = result.combined_output();
    if result.timed_out {
        output.push_str("\n[buildmend] build killed by timeout\n");
    }
    BuildOutcome {
        exit_code: result.exit_code(),
        output,
        timed_out: result.timed_out,
    }
}

/// Pull the failure-relevant lines out of a build log: the tail is
/// filtered by well-known Gradle/Java failure markers, falling back to the
/// raw tail when no marker matches.
pub fn extract_error_summary(full_output: &str) -> String {
    let lines: Vec<&str> = full_output.lines().collect();
    let tail_start = lines.len().saturating_sub(MAX_SUMMARY_TAIL_LINES);
    let tail = &lines[tail_start..];

    let picked: Vec<&str> = tail
        .iter()
        .copied()
        .filter(|line| FAILURE_MARKERS.iter().any(|m| line.contains(m)))
        .collect();

    if picked.is_empty() {
        tail.join("\n")
    } else {
        picked.join("\n")
    }
}

/// Best-effort `origin` remote URL from `.git/config`, for the prompt.
pub fn detect_repo_url(root: &Path) -> Option<String> {
    let config = fs::read_to_string(root.join(".git").join("config")).ok()?;

    let mut current_remote: Option<&str> = None;
    for line in config.lines() {
        let line = line.trim();
        if line.starts_with("[remote ") {
            current_remote = line.split('"').nth(1);
        } else if current_remote == Some("origin") {
            if let Some(value) = line.strip_prefix("url") {
                if let Some((_, url)) = value.split_once('=') {
                    return Some(url.trim().to_string());
                }
            }
        }
    }
    None
}
