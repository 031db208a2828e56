//! OpenAI Responses API client for the repair request.
//!
//! One call per failed build, no retries: a wedged or flaky model run
//! terminates the cycle and the persisted prompt stays available for
//! manual use.

use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,

    #[error("model request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("model returned HTTP {status}: {details}")]
    Http { status: u16, details: String },

    #[error("failed to parse model response body: {0}")]
    MalformedBody(String),
}

/// Everything the client needs, threaded in from config rather than read
/// from the environment mid-call.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// A successful model reply: the extracted text plus the raw response
/// body, which is persisted verbatim as a run artifact.
#[derive(Debug)]
pub struct ModelReply {
    pub text: String,
    pub raw_body: String,
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Send the repair prompt and return the model's text reply.
pub async fn request_fix(prompt: &str, settings: &ModelSettings) -> Result<ModelReply, ModelError> {
    if settings.api_key.is_empty() {
        return Err(ModelError::MissingApiKey);
    }

    let client = reqwest::Client::builder()
        .timeout(settings.timeout)
        .build()?;

    let response = client
        .post(OPENAI_RESPONSES_URL)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {}", settings.api_key))
        .json(&ResponsesRequest {
            model: &settings.model,
            input: prompt,
        })
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ModelError::Http {
            status: status.as_u16(),
            details: crate::util::truncate(&body, 500),
        });
    }

    let parsed: Value = serde_json::from_str(&body)
        .map_err(|e| ModelError::MalformedBody(e.to_string()))?;

    Ok(ModelReply {
        text: extract_output_text(&parsed),
        raw_body: body,
    })
}

/// Pull the reply text out of a Responses API body: the unified
/// `output_text` field when present, otherwise the concatenated
/// `output[].content[]` entries of type `output_text`. Falls back to the
/// whole body so an unexpected shape is still inspectable downstream.
pub fn extract_output_text(body: &Value) -> String {
    if let Some(text) = body.get("output_text").and_then(Value::as_str) {
        return text.to_string();
    }

    let mut parts = Vec::new();
    if let Some(output) = body.get("output").and_then(Value::as_array) {
        for item in output {
            let Some(content) = item.get("content").and_then(Value::as_array) else {
                continue;
            };
            for entry in content {
                if entry.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(text) = entry.get("text").and_then(Value::as_str) {
                        parts.push(text.to_string());
                    }
                }
            }
        }
    }

    if parts.is_empty() {
        body.to_string()
    } else {
        parts.join("\n")
    }
}
