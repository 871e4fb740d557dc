//! Discussion gateway: fetch and mutate GitHub discussions.
//!
//! Retrieval goes through the GraphQL query protocol first and falls back to
//! the REST protocol when the query surface signals a missing capability.
//! Mutations (comment create/update) are GraphQL only; retry policy belongs
//! to callers.

pub mod graphql;
pub mod rest;

use crate::error::GatewayError;
use chrono::{DateTime, Utc};

const USER_AGENT: &str = concat!("threadbot/", env!("CARGO_PKG_VERSION"));

/// A discussion thread with its comments, as fetched in one pass.
#[derive(Debug, Clone)]
pub struct Discussion {
    /// Opaque platform-assigned node id.
    pub node_id: String,
    /// Human-readable sequence number.
    pub number: i64,
    pub title: String,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: String,
    /// Chronological, as returned by the platform.
    pub comments: Vec<DiscussionComment>,
}

/// A comment, with one level of reply nesting.
#[derive(Debug, Clone)]
pub struct DiscussionComment {
    pub node_id: String,
    /// Numeric database id; present on webhook payloads, absent on some
    /// fallback responses. Never used as a dedup key.
    pub database_id: Option<i64>,
    pub body: String,
    pub author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: Vec<DiscussionComment>,
}

/// Reference to a created or updated comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRef {
    pub node_id: String,
}

impl Discussion {
    /// Find a comment (or reply) by node id.
    pub fn find_comment(&self, node_id: &str) -> Option<&DiscussionComment> {
        for comment in &self.comments {
            if comment.node_id == node_id {
                return Some(comment);
            }
            if let Some(reply) = comment.replies.iter().find(|r| r.node_id == node_id) {
                return Some(reply);
            }
        }
        None
    }
}

/// Seam between the processing pipeline and the hosting platform.
pub trait DiscussionApi: Send + Sync {
    /// Fetch the most recently updated discussions, newest first.
    fn recent_discussions(
        &self,
        repo: &str,
        page_size: usize,
    ) -> impl Future<Output = Result<Vec<Discussion>, GatewayError>> + Send;

    /// Fetch one discussion with its full comment list.
    fn fetch_discussion(
        &self,
        repo: &str,
        number: i64,
    ) -> impl Future<Output = Result<Discussion, GatewayError>> + Send;

    /// Create a comment, optionally as a reply to an existing comment.
    fn create_comment(
        &self,
        discussion_id: &str,
        body: &str,
        reply_to: Option<&str>,
    ) -> impl Future<Output = Result<CommentRef, GatewayError>> + Send;

    /// Overwrite an existing comment's body.
    fn update_comment(
        &self,
        comment_id: &str,
        body: &str,
    ) -> impl Future<Output = Result<CommentRef, GatewayError>> + Send;
}

/// GitHub-backed gateway. Cheap to clone; the HTTP client is shared.
#[derive(Clone)]
pub struct GithubGateway {
    http: reqwest::Client,
    token: String,
}

impl GithubGateway {
    pub fn new(token: impl Into<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { http, token: token.into() })
    }
}

impl DiscussionApi for GithubGateway {
    async fn recent_discussions(
        &self,
        repo: &str,
        page_size: usize,
    ) -> Result<Vec<Discussion>, GatewayError> {
        match graphql::recent_discussions(&self.http, &self.token, repo, page_size).await {
            Err(GatewayError::Unsupported(reason)) => {
                tracing::warn!(%reason, "query protocol unavailable, retrying over REST");
                rest::recent_discussions(&self.http, &self.token, repo, page_size).await
            }
            other => other,
        }
    }

    async fn fetch_discussion(&self, repo: &str, number: i64) -> Result<Discussion, GatewayError> {
        match graphql::fetch_discussion(&self.http, &self.token, repo, number).await {
            Err(GatewayError::Unsupported(reason)) => {
                tracing::warn!(%reason, "query protocol unavailable, retrying over REST");
                rest::fetch_discussion(&self.http, &self.token, repo, number).await
            }
            other => other,
        }
    }

    async fn create_comment(
        &self,
        discussion_id: &str,
        body: &str,
        reply_to: Option<&str>,
    ) -> Result<CommentRef, GatewayError> {
        graphql::create_comment(&self.http, &self.token, discussion_id, body, reply_to).await
    }

    async fn update_comment(&self, comment_id: &str, body: &str) -> Result<CommentRef, GatewayError> {
        graphql::update_comment(&self.http, &self.token, comment_id, body).await
    }
}
