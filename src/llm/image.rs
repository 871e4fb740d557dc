//! Best-effort illustration of replies.
//!
//! Failure anywhere in this path is logged and swallowed: the textual reply
//! is the deliverable, an image is decoration.

use crate::conversation::ConversationTurn;
use crate::error::InferenceError;
use crate::llm::TogetherClient;
use crate::llm::client::{format_prompt, retry_with_backoff};
use base64::Engine as _;
use serde_json::json;

const IMAGE_URL: &str = "https://api.together.xyz/v1/images/generations";
const IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-schnell";
const IMAGE_WIDTH: u32 = 1024;
const IMAGE_HEIGHT: u32 = 768;
const IMAGE_STEPS: u32 = 4;

/// Style adapters applied to every generated image.
const STYLE_LORAS: &[(&str, f64)] = &[
    ("https://huggingface.co/XLabs-AI/flux-RealismLora", 0.6),
    ("https://huggingface.co/alvdansen/softserve_anime", 0.4),
];

/// Every image prompt must open with this phrase so generated images share
/// one visual register.
pub const IMAGE_PROMPT_PREFIX: &str = "flat minimalist digital illustration of";

const IMAGE_PROMPT_INSTRUCTION: &str = "Summarize the theme of the conversation below as a short \
image-generation prompt. Answer with one line and nothing else, and begin the line with \
\"flat minimalist digital illustration of\".\n\n\
Example conversation: a question about async runtimes in Rust.\n\
Example answer: flat minimalist digital illustration of gears turning inside a crab shell\n\n\
Example conversation: a debate about database indexing strategies.\n\
Example answer: flat minimalist digital illustration of a librarian sorting glowing cards\n";

impl TogetherClient {
    /// Ask the model for a short thematic image prompt for this conversation.
    pub async fn generate_image_prompt(
        &self,
        history: &[ConversationTurn],
        current_message: &str,
    ) -> Result<String, InferenceError> {
        let model = &self.config.model;
        let prompt = format_prompt(history, current_message, IMAGE_PROMPT_INSTRUCTION);

        let raw = retry_with_backoff(model.max_retries, model.retry_base_delay, || {
            self.complete(&prompt)
        })
        .await?;

        Ok(ensure_prefix(raw.lines().next().unwrap_or_default()))
    }

    /// Generate an illustration. Returns `None` on any failure; illustration
    /// must never fail the reply it decorates.
    pub async fn generate_image(&self, prompt: &str) -> Option<Vec<u8>> {
        let loras: Vec<_> = STYLE_LORAS
            .iter()
            .map(|(path, scale)| json!({ "path": path, "scale": scale }))
            .collect();

        let payload = json!({
            "model": IMAGE_MODEL,
            "prompt": prompt,
            "width": IMAGE_WIDTH,
            "height": IMAGE_HEIGHT,
            "steps": IMAGE_STEPS,
            "n": 1,
            "response_format": "b64_json",
            "image_loras": loras,
        });

        let response = self
            .http
            .post(IMAGE_URL)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "image generation request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "image generation rejected");
            return None;
        }

        let parsed: serde_json::Value = match response.json().await {
            Ok(parsed) => parsed,
            Err(error) => {
                tracing::warn!(%error, "image generation returned unreadable body");
                return None;
            }
        };

        let Some(encoded) = parsed.pointer("/data/0/b64_json").and_then(|v| v.as_str()) else {
            tracing::warn!("image generation response carried no image data");
            return None;
        };
        match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                tracing::warn!(%error, "image payload was not valid base64");
                None
            }
        }
    }
}

/// Prepend the required prefix when the model omitted it.
pub(crate) fn ensure_prefix(prompt: &str) -> String {
    let trimmed = prompt.trim();
    if trimmed.to_lowercase().starts_with(IMAGE_PROMPT_PREFIX) {
        trimmed.to_string()
    } else {
        format!("{IMAGE_PROMPT_PREFIX} {trimmed}")
    }
}
