//! Completion client for the Together inference API.

use crate::config::InferenceConfig;
use crate::conversation::ConversationTurn;
use crate::error::InferenceError;
use crate::llm::postprocess::clean_response;
use crate::redact::redact;
use serde_json::json;
use std::time::Duration;

const COMPLETION_URL: &str = "https://api.together.xyz/inference";

/// Stop sequences terminating a completion at the next speaker change.
const STOP_SEQUENCES: &[&str] = &["Human:", "Assistant:"];

/// Client for the Together completion and image endpoints.
#[derive(Clone)]
pub struct TogetherClient {
    pub(crate) http: reqwest::Client,
    pub(crate) config: InferenceConfig,
}

impl TogetherClient {
    pub fn new(config: InferenceConfig) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn model_config(&self) -> &crate::config::ModelConfig {
        &self.config.model
    }

    /// Generate a reply to `current_message` given the prior conversation.
    ///
    /// Retries transient failures with exponential backoff, then strips the
    /// model's internal reasoning segment and collapses excess blank lines.
    pub async fn generate_reply(
        &self,
        history: &[ConversationTurn],
        current_message: &str,
        system_prompt: &str,
    ) -> Result<String, InferenceError> {
        let prompt = format_prompt(history, current_message, system_prompt);
        let model = &self.config.model;

        let raw = retry_with_backoff(model.max_retries, model.retry_base_delay, || {
            self.complete(&prompt)
        })
        .await?;

        Ok(clean_response(&raw))
    }

    /// One completion attempt, no retry.
    pub(crate) async fn complete(&self, prompt: &str) -> Result<String, InferenceError> {
        let model = &self.config.model;
        let payload = json!({
            "model": model.model,
            "prompt": prompt,
            "temperature": model.temperature,
            "top_p": model.top_p,
            "top_k": model.top_k,
            "repetition_penalty": model.repetition_penalty,
            "max_tokens": model.max_tokens,
            "stop": STOP_SEQUENCES,
        });

        let response = self
            .http
            .post(COMPLETION_URL)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: redact(&body),
            });
        }

        let parsed: serde_json::Value =
            serde_json::from_str(&body).map_err(|error| InferenceError::Malformed(format!(
                "invalid JSON: {error}"
            )))?;

        extract_text(&parsed)
            .map(str::to_owned)
            .ok_or_else(|| InferenceError::Malformed(format!(
                "no completion text in response: {}",
                redact(&body)
            )))
    }
}

/// Pull the completion text out of either response shape: the inference
/// endpoint nests choices under `output`, the v1 endpoint puts them at the
/// top level.
fn extract_text(response: &serde_json::Value) -> Option<&str> {
    response
        .pointer("/output/choices/0/text")
        .or_else(|| response.pointer("/choices/0/text"))
        .and_then(|text| text.as_str())
}

/// Interleave history turns as Human/Assistant segments, terminated by the
/// current message and a trailing assistant cue.
pub(crate) fn format_prompt(
    history: &[ConversationTurn],
    current_message: &str,
    system_prompt: &str,
) -> String {
    let mut segments = Vec::with_capacity(history.len() * 2 + 1);
    for turn in history {
        segments.push(format!("Human: {}", turn.input));
        if let Some(response) = &turn.response {
            segments.push(format!("Assistant: {response}"));
        }
    }
    segments.push(format!("Human: {current_message}"));

    format!("{system_prompt}\n\n{}\n\nAssistant:", segments.join("\n\n"))
}

/// Run `op` up to `max_attempts` times, sleeping between attempts with the
/// delay doubling from `base_delay`. Terminal errors abort immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, InferenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, InferenceError>>,
{
    let mut delay = base_delay;
    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_attempts => {
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "transient inference failure, backing off"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(error) => return Err(error),
        }
    }
    Err(InferenceError::Malformed("retry loop exhausted without an attempt".into()))
}
