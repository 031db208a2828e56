//! One build-diagnose-apply cycle.
//!
//! The orchestrator walks a single run through
//! `Idle -> Building -> {Succeeded | DiagnosingFailure -> AwaitingModel ->
//! Validating -> Applying -> RunningCommands -> Reported}` and returns a
//! structured report from every terminal state. There is no automatic
//! re-entry into `Building`: repeated invocation is the caller's call.
//! The project tree is assumed to be exclusively ours for the duration of
//! the run; concurrent runs against the same root must be serialized by
//! the caller.

use crate::apply::{self, ApplyFailure};
use crate::artifacts::{run_id, ArtifactStore};
use crate::commands::{self, CommandResult};
use crate::config::Config;
use crate::gradle;
use crate::llm::{client, parse, prompts};
use crate::validate;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where a run currently is. Terminal states always carry a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RepairState {
    #[default]
    Idle,
    Building,
    Succeeded,
    DiagnosingFailure,
    AwaitingModel,
    Validating,
    Applying,
    RunningCommands,
    Reported,
}

impl RepairState {
    /// Human-readable status for display.
    pub fn status_text(&self) -> &'static str {
        match self {
            RepairState::Idle => "Ready",
            RepairState::Building => "Building...",
            RepairState::Succeeded => "Build succeeded",
            RepairState::DiagnosingFailure => "Diagnosing failure",
            RepairState::AwaitingModel => "Waiting for model...",
            RepairState::Validating => "Validating change-set",
            RepairState::Applying => "Applying changes",
            RepairState::RunningCommands => "Running commands",
            RepairState::Reported => "Done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RepairState::Succeeded | RepairState::Reported)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The build passed; nothing to repair.
    BuildSucceeded,
    /// The build could not be run at all (missing build file or tool).
    BuildError,
    /// The model call failed or no API key is configured.
    ModelError,
    /// The model's document did not parse or did not conform.
    SchemaError,
    /// The apply pass aborted; `actions` holds the applied prefix.
    ApplyFailed,
    /// Changes applied (or simulated) and commands ran.
    ChangesApplied,
}

/// The structured result of one run. Every terminal state produces one of
/// these; a bare error is never the sole output.
#[derive(Debug, Serialize)]
pub struct RepairReport {
    pub status: RunStatus,
    pub message: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_file: Option<PathBuf>,
    /// Ordered action log from the applier (partial on `ApplyFailed`).
    pub actions: Vec<String>,
    pub commands: Vec<CommandResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schema_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Artifact paths accumulated while a run progresses.
#[derive(Debug, Default)]
struct RunArtifacts {
    log_file: Option<PathBuf>,
    prompt_file: Option<PathBuf>,
    response_file: Option<PathBuf>,
}

pub struct Orchestrator {
    config: Config,
    artifacts: ArtifactStore,
    state: RepairState,
}

impl Orchestrator {
    pub fn new(config: Config, artifacts: ArtifactStore) -> Self {
        Self {
            config,
            artifacts,
            state: RepairState::Idle,
        }
    }

    pub fn state(&self) -> RepairState {
        self.state
    }

    /// Run one full cycle against `project_root`.
    pub async fn run(&mut self, project_root: &Path) -> RepairReport {
        let id = run_id();
        let mut paths = RunArtifacts::default();

        self.state = RepairState::Building;
        eprintln!("  Running Gradle build...");
        let outcome = match gradle::run_build(project_root, self.config.build_timeout) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state = RepairState::Reported;
                return self.report(RunStatus::BuildError, err.to_string(), paths, Vec::new(), Vec::new());
            }
        };

        match self.artifacts.write_build_log(&id, &outcome.output) {
            Ok(path) => paths.log_file = Some(path),
            Err(err) => eprintln!("  Warning: {}", err),
        }

        if outcome.succeeded() {
            self.state = RepairState::Succeeded;
            eprintln!("  Build succeeded.");
            return self.report(
                RunStatus::BuildSucceeded,
                "Build succeeded; nothing to repair.".to_string(),
                paths,
                Vec::new(),
                Vec::new(),
            );
        }

        self.state = RepairState::DiagnosingFailure;
        eprintln!("  Build failed (exit {}). Preparing repair prompt...", outcome.exit_code);
        let summary = gradle::extract_error_summary(&outcome.output);
        let repo_url = gradle::detect_repo_url(project_root);
        let prompt = prompts::build_repair_prompt(&outcome.output, &summary, repo_url.as_deref());
        match self.artifacts.write_prompt(&id, &prompt) {
            Ok(path) => paths.prompt_file = Some(path),
            Err(err) => eprintln!("  Warning: {}", err),
        }

        self.state = RepairState::AwaitingModel;
        let Some(settings) = self.config.model_settings() else {
            self.state = RepairState::Reported;
            return self.report(
                RunStatus::ModelError,
                "OPENAI_API_KEY is not set; the prompt was saved for manual use.".to_string(),
                paths,
                Vec::new(),
                Vec::new(),
            );
        };

        eprintln!("  Asking {} for a fix...", settings.model);
        let reply = match client::request_fix(&prompt, &settings).await {
            Ok(reply) => reply,
            Err(err) => {
                self.state = RepairState::Reported;
                return self.report(
                    RunStatus::ModelError,
                    format!("{}; the build log and prompt were saved for manual use.", err),
                    paths,
                    Vec::new(),
                    Vec::new(),
                );
            }
        };
        match self.artifacts.write_response(&id, &reply.raw_body) {
            Ok(path) => paths.response_file = Some(path),
            Err(err) => eprintln!("  Warning: {}", err),
        }

        self.finish_from_response(project_root, &reply.text, paths)
    }

    /// Validating -> Applying -> RunningCommands -> Reported, from the
    /// model's reply text. Split out so the back half of the cycle can be
    /// exercised without a live model.
    fn finish_from_response(
        &mut self,
        project_root: &Path,
        response_text: &str,
        paths: RunArtifacts,
    ) -> RepairReport {
        self.state = RepairState::Validating;
        let document = match parse::extract_document(response_text) {
            Ok(document) => document,
            Err(err) => {
                self.state = RepairState::Reported;
                return self.report(
                    RunStatus::SchemaError,
                    format!("{}; the raw response was saved for inspection.", err),
                    paths,
                    Vec::new(),
                    Vec::new(),
                );
            }
        };

        let change_set = match validate::validate(&document) {
            Ok(change_set) => change_set,
            Err(errors) => {
                self.state = RepairState::Reported;
                let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                return self.report_with(
                    RunStatus::SchemaError,
                    format!("Change-set failed validation with {} error(s).", rendered.len()),
                    paths,
                    Vec::new(),
                    Vec::new(),
                    rendered,
                    None,
                );
            }
        };

        self.state = RepairState::Applying;
        let verb = if self.config.apply_enabled { "Applying" } else { "Previewing" };
        eprintln!("  {} {} change(s)...", verb, change_set.changes.len());
        let actions = match apply::apply(project_root, &change_set, self.config.apply_enabled) {
            Ok(actions) => actions,
            Err(ApplyFailure { actions, error }) => {
                self.state = RepairState::Reported;
                return self.report_with(
                    RunStatus::ApplyFailed,
                    format!("{}; earlier changes in the log were not rolled back.", error),
                    paths,
                    actions,
                    Vec::new(),
                    Vec::new(),
                    change_set.notes.clone(),
                );
            }
        };

        self.state = RepairState::RunningCommands;
        let command_results = commands::run_all(
            project_root,
            &change_set.commands,
            self.config.apply_enabled,
            self.config.command_timeout,
        );

        self.state = RepairState::Reported;
        let message = if self.config.apply_enabled {
            format!(
                "Applied {} change(s) and ran {} command(s).",
                actions.len(),
                command_results.len()
            )
        } else {
            format!(
                "Dry run: {} change(s) and {} command(s) recorded, filesystem untouched.",
                actions.len(),
                command_results.len()
            )
        };
        self.report_with(
            RunStatus::ChangesApplied,
            message,
            paths,
            actions,
            command_results,
            Vec::new(),
            change_set.notes,
        )
    }

    fn report(
        &self,
        status: RunStatus,
        message: String,
        paths: RunArtifacts,
        actions: Vec<String>,
        commands: Vec<CommandResult>,
    ) -> RepairReport {
        self.report_with(status, message, paths, actions, commands, Vec::new(), None)
    }

    #[allow(clippy::too_many_arguments)]
    fn report_with(
        &self,
        status: RunStatus,
        message: String,
        paths: RunArtifacts,
        actions: Vec<String>,
        commands: Vec<CommandResult>,
        schema_errors: Vec<String>,
        notes: Option<String>,
    ) -> RepairReport {
        RepairReport {
            status,
            message,
            dry_run: !self.config.apply_enabled,
            log_file: paths.log_file,
            prompt_file: paths.prompt_file,
            response_file: paths.response_file,
            actions,
            commands,
            schema_errors,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandStatus;
    use std::fs;
    use tempfile::tempdir;

    fn orchestrator(base: &Path, apply_enabled: bool) -> Orchestrator {
        let config = Config {
            apply_enabled,
            api_key: None,
            ..Config::default()
        };
        Orchestrator::new(config, ArtifactStore::new(base))
    }

    #[cfg(unix)]
    fn fake_gradle_project(exit_code: i32) -> tempfile::TempDir {
        use std::os::unix::fs::PermissionsExt;
        let root = tempdir().unwrap();
        fs::write(root.path().join("build.gradle"), "plugins {}").unwrap();
        let wrapper = root.path().join("gradlew");
        fs::write(
            &wrapper,
            format!("#!/bin/sh\necho 'FAILURE: Build failed'\nexit {}\n", exit_code),
        )
        .unwrap();
        fs::set_permissions(&wrapper, fs::Permissions::from_mode(0o755)).unwrap();
        root
    }

    #[test]
    fn state_texts_cover_the_cycle() {
        assert_eq!(RepairState::default(), RepairState::Idle);
        assert!(!RepairState::Building.is_terminal());
        assert!(RepairState::Succeeded.is_terminal());
        assert!(RepairState::Reported.is_terminal());
        assert_eq!(RepairState::Validating.status_text(), "Validating change-set");
    }

    #[tokio::test]
    async fn missing_build_file_reports_build_error() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        let mut orchestrator = orchestrator(base.path(), true);

        let report = orchestrator.run(project.path()).await;
        assert_eq!(report.status, RunStatus::BuildError);
        assert!(report.message.contains("build.gradle"));
        assert!(report.log_file.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_build_terminates_with_log_artifact() {
        let base = tempdir().unwrap();
        let project = fake_gradle_project(0);
        let mut orchestrator = orchestrator(base.path(), true);

        let report = orchestrator.run(project.path()).await;
        assert_eq!(report.status, RunStatus::BuildSucceeded);
        assert_eq!(orchestrator.state(), RepairState::Succeeded);
        let log = report.log_file.unwrap();
        assert!(log.exists());
        assert!(report.prompt_file.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_build_without_api_key_saves_prompt_and_reports_model_error() {
        let base = tempdir().unwrap();
        let project = fake_gradle_project(1);
        let mut orchestrator = orchestrator(base.path(), true);

        let report = orchestrator.run(project.path()).await;
        assert_eq!(report.status, RunStatus::ModelError);
        assert!(report.message.contains("OPENAI_API_KEY"));
        let prompt = report.prompt_file.unwrap();
        let prompt_text = fs::read_to_string(prompt).unwrap();
        assert!(prompt_text.contains("FAILURE: Build failed"));
        assert!(report.log_file.unwrap().exists());
    }

    #[test]
    fn response_with_valid_change_set_applies_and_runs_commands() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        let mut orchestrator = orchestrator(base.path(), true);

        let response = r#"{
            "version": "1",
            "intent": "apply_fixes",
            "changes": [
                {"action": "write", "path": "src/Main.java", "content": "class Main {}"}
            ],
            "commands": ["echo verified"],
            "notes": "missing class restored"
        }"#;

        let report = orchestrator.finish_from_response(
            project.path(),
            response,
            RunArtifacts::default(),
        );
        assert_eq!(report.status, RunStatus::ChangesApplied);
        assert_eq!(orchestrator.state(), RepairState::Reported);
        assert_eq!(report.actions, vec!["WRITE src/Main.java".to_string()]);
        assert_eq!(report.commands.len(), 1);
        assert_eq!(report.commands[0].status, CommandStatus::Passed);
        assert_eq!(report.notes.as_deref(), Some("missing class restored"));
        assert!(project.path().join("src/Main.java").exists());
    }

    #[test]
    fn dry_run_reports_actions_but_skips_io_and_commands() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        let mut orchestrator = orchestrator(base.path(), false);

        let response = r#"{
            "version": "1",
            "intent": "apply_fixes",
            "changes": [{"action": "write", "path": "a.txt", "content": "x"}],
            "commands": ["touch b.txt"]
        }"#;

        let report = orchestrator.finish_from_response(
            project.path(),
            response,
            RunArtifacts::default(),
        );
        assert_eq!(report.status, RunStatus::ChangesApplied);
        assert!(report.dry_run);
        assert_eq!(report.actions, vec!["WRITE a.txt".to_string()]);
        assert_eq!(report.commands[0].status, CommandStatus::Skipped);
        assert!(!project.path().join("a.txt").exists());
        assert!(!project.path().join("b.txt").exists());
    }

    #[test]
    fn nonconforming_document_reports_every_schema_error() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        let mut orchestrator = orchestrator(base.path(), true);

        let response = r#"{"version": "1", "changes": [{"action": "chmod", "path": "a"}]}"#;
        let report = orchestrator.finish_from_response(
            project.path(),
            response,
            RunArtifacts::default(),
        );
        assert_eq!(report.status, RunStatus::SchemaError);
        assert!(report
            .schema_errors
            .iter()
            .any(|e| e.starts_with("intent:")));
        assert!(report
            .schema_errors
            .iter()
            .any(|e| e.starts_with("changes/0/action:")));
        assert!(report.actions.is_empty());
    }

    #[test]
    fn unparsable_response_reports_schema_error() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        let mut orchestrator = orchestrator(base.path(), true);

        let report = orchestrator.finish_from_response(
            project.path(),
            "I could not figure this one out, sorry.",
            RunArtifacts::default(),
        );
        assert_eq!(report.status, RunStatus::SchemaError);
        assert!(report.message.contains("No JSON object"));
    }

    #[test]
    fn path_escape_aborts_apply_and_keeps_partial_log() {
        let base = tempdir().unwrap();
        let project = tempdir().unwrap();
        let mut orchestrator = orchestrator(base.path(), true);

        let response = r#"{
            "version": "1",
            "intent": "apply_fixes",
            "changes": [
                {"action": "write", "path": "ok.txt", "content": "fine"},
                {"action": "write", "path": "../escape.txt", "content": "nope"}
            ],
            "commands": ["echo never"]
        }"#;

        let report = orchestrator.finish_from_response(
            project.path(),
            response,
            RunArtifacts::default(),
        );
        assert_eq!(report.status, RunStatus::ApplyFailed);
        assert_eq!(report.actions, vec!["WRITE ok.txt".to_string()]);
        assert!(report.message.contains("not rolled back"));
        // commands never run after an aborted apply
        assert!(report.commands.is_empty());
    }
}
