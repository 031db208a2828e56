//! Best-effort execution of the post-apply commands from a change-set.
//!
//! Commands are shell strings proposed by the model and therefore
//! untrusted; the whole stage is gated behind the same apply flag as the
//! patch applier, so a dry run records every command without executing
//! anything. A failing command does not stop the ones after it.

use crate::util::{run_command_with_timeout, truncate};
use serde::Serialize;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

const MAX_OUTPUT_CHARS: usize = 1800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandResult {
    pub command: String,
    pub status: CommandStatus,
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr (truncated).
    pub output: String,
}

/// Run each command in order inside `root`, capturing results
/// independently. With `apply_enabled = false` every command is recorded
/// as skipped and nothing executes.
pub fn run_all(
    root: &Path,
    commands: &[String],
    apply_enabled: bool,
    timeout: Duration,
) -> Vec<CommandResult> {
    commands
        .iter()
        .map(|command| {
            if apply_enabled {
                run_one(root, command, timeout)
            } else {
                CommandResult {
                    command: command.clone(),
                    status: CommandStatus::Skipped,
                    exit_code: None,
                    output: "skipped (dry-run)".to_string(),
                }
            }
        })
        .collect()
}

fn run_one(root: &Path, command: &str, timeout: Duration) -> CommandResult {
    let mut cmd = shell_command(command);
    cmd.current_dir(root);

    match run_command_with_timeout(&mut cmd, timeout) {
        Ok(result) => {
            let mut output = truncate(result.combined_output().trim(), MAX_OUTPUT_CHARS);
            if result.timed_out {
                output.push_str("\n[timed out]");
            }
            CommandResult {
                command: command.to_string(),
                status: if result.success() && !result.timed_out {
                    CommandStatus::Passed
                } else {
                    CommandStatus::Failed
                },
                exit_code: result.status.and_then(|s| s.code()),
                output,
            }
        }
        Err(e) => CommandResult {
            command: command.to_string(),
            status: CommandStatus::Skipped,
            exit_code: None,
            output: format!("Skipped: {}", e),
        },
    }
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd.exe");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}
