//! Per-event orchestration: fetch, rebuild context, generate, deliver.

use crate::ProcessingEvent;
use crate::config::BotConfig;
use crate::conversation::{ConversationTurn, build_history};
use crate::error::Result;
use crate::github::{Discussion, DiscussionApi};
use crate::llm::TogetherClient;
use crate::placeholder::PlaceholderFlow;
use base64::Engine as _;
use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between outbound inference calls.
///
/// A single shared "time of last response": callers sleep out the remainder
/// of the window, then the timestamp advances. Processing is strictly
/// sequential, so this is a global rate limiter without a lock.
#[derive(Debug)]
pub struct Cooldown {
    min_interval: Duration,
    last_response: Option<Instant>,
}

impl Cooldown {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_response: None }
    }

    /// Sleep until the cooldown window has passed, then claim the slot.
    pub async fn acquire(&mut self) {
        if let Some(last) = self.last_response {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::info!(wait_secs = wait.as_secs_f64(), "respecting cooldown");
                tokio::time::sleep(wait).await;
            }
        }
        self.last_response = Some(Instant::now());
    }
}

/// Processes one event to completion. Owns the cooldown state.
pub struct EventHandler<A: DiscussionApi> {
    api: A,
    llm: TogetherClient,
    bot: BotConfig,
    cooldown: Cooldown,
}

impl<A: DiscussionApi> EventHandler<A> {
    pub fn new(api: A, llm: TogetherClient, bot: BotConfig) -> Self {
        let cooldown = Cooldown::new(bot.cooldown);
        Self { api, llm, bot, cooldown }
    }

    /// Process one event. Errors propagate to the caller for logging; the
    /// poll loop survives them.
    pub async fn handle(&mut self, event: &ProcessingEvent) -> Result<()> {
        match event {
            ProcessingEvent::NewDiscussion { repo, number, .. } => {
                let discussion = self.api.fetch_discussion(repo, *number).await?;
                tracing::info!(discussion = discussion.number, title = %discussion.title, "processing discussion");
                let current = discussion.body.clone();
                self.respond(&discussion, &current, None).await
            }
            ProcessingEvent::NewComment { repo, discussion_number, comment_id, body, .. } => {
                let discussion = self.api.fetch_discussion(repo, *discussion_number).await?;
                tracing::info!(discussion = discussion.number, comment_id = %comment_id, "processing comment");
                // Prefer the fetched comment body; the event's copy can be a
                // stale webhook snapshot.
                let current = discussion
                    .find_comment(comment_id)
                    .map(|comment| comment.body.clone())
                    .unwrap_or_else(|| body.clone());
                self.respond(&discussion, &current, Some(comment_id.as_str())).await
            }
        }
    }

    async fn respond(
        &mut self,
        discussion: &Discussion,
        current_message: &str,
        reply_to: Option<&str>,
    ) -> Result<()> {
        let history = build_history(discussion, self.bot.bot_login.as_deref());

        let mut flow = PlaceholderFlow::new(&self.api, &discussion.node_id, reply_to);
        flow.create().await;

        self.cooldown.acquire().await;

        let reply = match self
            .llm
            .generate_reply(&history, current_message, &self.bot.system_prompt)
            .await
        {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(%error, discussion = discussion.number, "inference failed");
                flow.deliver_error().await;
                return Err(error.into());
            }
        };

        let image = self.illustrate(&history, current_message).await;
        let body = format_reply(&reply, image.as_deref(), &self.bot.signature, &discussion.url);

        let delivery = flow.deliver(&body).await?;
        tracing::info!(discussion = discussion.number, ?delivery, "reply published");
        Ok(())
    }

    /// Best-effort illustration markdown for the reply. `None` on any
    /// failure or when illustration is disabled.
    async fn illustrate(
        &self,
        history: &[ConversationTurn],
        current_message: &str,
    ) -> Option<String> {
        if !self.bot.illustrate_replies {
            return None;
        }

        let prompt = match self.llm.generate_image_prompt(history, current_message).await {
            Ok(prompt) => prompt,
            Err(error) => {
                tracing::warn!(%error, "image prompt generation failed, skipping illustration");
                return None;
            }
        };

        let bytes = self.llm.generate_image(&prompt).await?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Some(format!("![{prompt}](data:image/png;base64,{encoded})"))
    }
}

/// Assemble the published comment body: answer, optional illustration,
/// signature, and a link back to the conversation.
fn format_reply(
    response: &str,
    image_markdown: Option<&str>,
    signature: &str,
    discussion_url: &str,
) -> String {
    let mut body = response.trim_end().to_string();
    if let Some(image) = image_markdown {
        body.push_str("\n\n");
        body.push_str(image);
    }
    body.push_str(signature);
    body.push_str("\n[View conversation](");
    body.push_str(discussion_url);
    body.push(')');
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn cooldown_spaces_out_consecutive_calls() {
        let mut cooldown = Cooldown::new(Duration::from_secs(5));

        cooldown.acquire().await;
        let first = Instant::now();

        tokio::time::sleep(Duration::from_secs(1)).await;

        cooldown.acquire().await;
        let second_start = Instant::now();

        // The second call may not start sooner than 4s after the first's
        // recorded time (1s already elapsed + 4s of enforced wait).
        assert!(second_start.duration_since(first) >= Duration::from_secs(5) - Duration::from_secs(1));
        assert_eq!(second_start.duration_since(first), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_does_not_wait_when_window_already_passed() {
        let mut cooldown = Cooldown::new(Duration::from_secs(5));

        cooldown.acquire().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        let before = Instant::now();
        cooldown.acquire().await;
        assert_eq!(Instant::now().duration_since(before), Duration::ZERO);
    }

    #[test]
    fn reply_carries_signature_and_conversation_link() {
        let body = format_reply(
            "The answer.",
            None,
            "\n\n---\n*Bot reply*",
            "https://github.com/acme/forum/discussions/12",
        );

        assert_eq!(
            body,
            "The answer.\n\n---\n*Bot reply*\n[View conversation](https://github.com/acme/forum/discussions/12)"
        );
    }

    #[test]
    fn reply_embeds_illustration_before_the_signature() {
        let body = format_reply("Answer.", Some("![p](data:image/png;base64,AAAA)"), "\n\n--sig", "https://example.test");
        let image_at = body.find("![p]").unwrap();
        let sig_at = body.find("--sig").unwrap();
        assert!(image_at < sig_at);
    }
}
