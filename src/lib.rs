//! Threadbot: an AI reply bot for GitHub Discussions.
//!
//! Watches a repository's discussions for new or updated threads and
//! comments, generates a reply through the Together inference API, and
//! publishes it back into the thread via a placeholder-comment lifecycle.

pub mod config;
pub mod conversation;
pub mod error;
pub mod github;
pub mod handler;
pub mod llm;
pub mod monitor;
pub mod placeholder;
pub mod redact;
pub mod terminal;

pub use error::{Error, Result};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Webhook event actions that trigger processing.
const HANDLED_ACTIONS: &[&str] = &["created", "edited"];

/// A unit of work discovered by the poller or delivered as a webhook payload.
///
/// Carries the minimal fields needed to refetch the full discussion and to
/// address the reply. Consumed exactly once, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessingEvent {
    NewDiscussion {
        repo: String,
        number: i64,
        discussion_id: String,
        title: String,
    },
    NewComment {
        repo: String,
        discussion_number: i64,
        discussion_id: String,
        comment_id: String,
        body: String,
    },
}

impl ProcessingEvent {
    /// Canonical dedup key for this event.
    ///
    /// Keys always use the platform's opaque node id, never the numeric
    /// database id, so poller-discovered and webhook-delivered events for the
    /// same item collapse to the same entry.
    pub fn dedup_key(&self) -> String {
        match self {
            ProcessingEvent::NewDiscussion { discussion_id, .. } => {
                format!("discussion-{discussion_id}")
            }
            ProcessingEvent::NewComment { comment_id, .. } => format!("comment-{comment_id}"),
        }
    }

    /// Parse a webhook-style event payload into a processing event.
    ///
    /// Returns `Ok(None)` for actions and event types the bot does not
    /// respond to (deletions, unrecognized event names).
    pub fn from_webhook(event_type: &str, payload: &str, default_repo: &str) -> Result<Option<Self>> {
        let payload: WebhookPayload =
            serde_json::from_str(payload).context("invalid event payload JSON")?;

        if !HANDLED_ACTIONS.contains(&payload.action.as_str()) {
            tracing::debug!(action = %payload.action, "ignoring event action");
            return Ok(None);
        }

        let repo = payload
            .repository
            .map(|r| r.full_name)
            .unwrap_or_else(|| default_repo.to_string());

        let event = match event_type {
            "discussion" => Some(ProcessingEvent::NewDiscussion {
                repo,
                number: payload.discussion.number,
                discussion_id: payload.discussion.node_id,
                title: payload.discussion.title.unwrap_or_default(),
            }),
            "discussion_comment" => {
                let comment = payload
                    .comment
                    .context("discussion_comment payload missing comment object")?;
                Some(ProcessingEvent::NewComment {
                    repo,
                    discussion_number: payload.discussion.number,
                    discussion_id: payload.discussion.node_id,
                    comment_id: comment.node_id,
                    body: comment.body,
                })
            }
            other => {
                tracing::debug!(event_type = other, "ignoring unrecognized event type");
                None
            }
        };

        Ok(event)
    }
}

/// Webhook payload shape shared by `discussion` and `discussion_comment`
/// events. Only the fields the bot consumes are modeled.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub action: String,
    pub discussion: WebhookDiscussion,
    #[serde(default)]
    pub comment: Option<WebhookComment>,
    #[serde(default)]
    pub repository: Option<WebhookRepository>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookDiscussion {
    pub node_id: String,
    pub number: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookComment {
    pub node_id: String,
    /// Numeric database id carried by webhook payloads. Not used for dedup.
    #[serde(default)]
    pub id: Option<i64>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct WebhookRepository {
    pub full_name: String,
}
