//! Prompt construction for the repair request.
//!
//! The prompt carries the full build output (capped) plus a marker-filtered
//! error summary, and pins down the exact JSON contract the model must
//! answer with so the response can be validated mechanically.

use crate::util::truncate_middle;

/// Upper bound on build-output characters embedded in one prompt.
pub const MAX_PROMPT_OUTPUT_CHARS: usize = 300_000;

const REPO_URL_PLACEHOLDER: &str = "<ADD_YOUR_REPOSITORY_URL_HERE>";

const PREAMBLE: &str = "\
You are a senior Gradle/Java build doctor for Minecraft plugins.

Context:
- Stack: Java 21, Gradle, Paper/Velocity
- Goal: Identify primary cause(s) of the failed build and propose the minimal fix.
- Constraints: Prefer the smallest change-set that makes the build pass.";

const RESPONSE_CONTRACT: &str = r#"Respond with ONLY a JSON object in exactly this shape, no markdown fences, no commentary:

{
  "version": "1",
  "intent": "apply_fixes",
  "changes": [
    {"action": "write",  "path": "<relative path>", "content": "<full new file content>", "encoding": "utf-8"},
    {"action": "create", "path": "<relative path>", "content": "<base64 bytes>", "encoding": "base64"},
    {"action": "delete", "path": "<relative path>"},
    {"action": "move",   "from": "<relative path>", "to": "<relative path>"}
  ],
  "commands": ["<optional shell commands to run after the changes>"],
  "notes": "<one-paragraph explanation of the root cause and the fix>"
}

Rules:
- Every path must be relative to the project root. Never use absolute paths or '..'.
- "write" and "create" replace the whole file; always send the complete content.
- Use "encoding": "base64" only for binary content.
- Do not invent keys beyond the ones shown above."#;

/// Build the repair prompt for one failed build.
pub fn build_repair_prompt(
    build_output: &str,
    error_summary: &str,
    repo_url: Option<&str>,
) -> String {
    let output = truncate_middle(build_output, MAX_PROMPT_OUTPUT_CHARS);
    let repo_note = repo_url.unwrap_or(REPO_URL_PLACEHOLDER);

    format!(
        "{preamble}\n\n\
         Repository (read files here): {repo_note}\n\n\
         {contract}\n\n\
         ===== FULL BUILD OUTPUT (verbatim) =====\n\
         {output}\n\n\
         ===== ERROR SUMMARY (tail) =====\n\
         {error_summary}\n",
        preamble = PREAMBLE,
        repo_note = repo_note,
        contract = RESPONSE_CONTRACT,
        output = output,
        error_summary = error_summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_output_summary_and_contract() {
        let prompt = build_repair_prompt(
            "BUILD FAILED in 3s",
            "error: cannot find symbol",
            Some("https://example.com/repo.git"),
        );
        assert!(prompt.contains("BUILD FAILED in 3s"));
        assert!(prompt.contains("error: cannot find symbol"));
        assert!(prompt.contains("\"intent\": \"apply_fixes\""));
        assert!(prompt.contains("https://example.com/repo.git"));
    }

    #[test]
    fn prompt_uses_placeholder_without_repo_url() {
        let prompt = build_repair_prompt("out", "summary", None);
        assert!(prompt.contains(REPO_URL_PLACEHOLDER));
    }

    #[test]
    fn oversized_build_output_is_capped() {
        let huge = "x".repeat(MAX_PROMPT_OUTPUT_CHARS * 2);
        let prompt = build_repair_prompt(&huge, "summary", None);
        assert!(prompt.len() < huge.len());
        assert!(prompt.contains("[truncated]"));
    }
}
