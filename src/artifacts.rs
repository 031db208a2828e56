//! Persisted run artifacts: the build log, the model prompt, and the raw
//! model response, written under fixed directories with a
//! timestamp-derived run id so a human can pick up where a failed run
//! stopped.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

const LOGS_DIR: &str = "logs";
const PROMPTS_DIR: &str = "prompts";

/// Timestamp-derived identifier shared by all artifacts of one run.
pub fn run_id() -> String {
    chrono::Local::now().format("%Y%m%d-%H%M%S").to_string()
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    logs_dir: PathBuf,
    prompts_dir: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `base` (normally the process working directory,
    /// matching where operators expect `logs/` and `prompts/` to appear).
    pub fn new(base: &Path) -> Self {
        Self {
            logs_dir: base.join(LOGS_DIR),
            prompts_dir: base.join(PROMPTS_DIR),
        }
    }

    pub fn write_build_log(&self, run_id: &str, content: &str) -> Result<PathBuf> {
        self.write(&self.logs_dir, format!("build_output_{}.log", run_id), content)
    }

    pub fn write_prompt(&self, run_id: &str, content: &str) -> Result<PathBuf> {
        self.write(
            &self.prompts_dir,
            format!("model_prompt_{}.txt", run_id),
            content,
        )
    }

    pub fn write_response(&self, run_id: &str, content: &str) -> Result<PathBuf> {
        self.write(
            &self.prompts_dir,
            format!("model_response_{}.json", run_id),
            content,
        )
    }

    fn write(&self, dir: &Path, file_name: String, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create artifact directory '{}'", dir.display()))?;
        let path = dir.join(file_name);
        fs::write(&path, content)
            .with_context(|| format!("Failed to write artifact '{}'", path.display()))?;
        Ok(path)
    }
}
