//! REST fallback retrieval for the discussion gateway.
//!
//! Used only when the GraphQL surface signals a missing capability. Less
//! capable on purpose: reply nesting is not reconstructed and ordering
//! follows whatever the list endpoint returns; the poller filters by
//! timestamp either way.

use crate::error::GatewayError;
use crate::github::{Discussion, DiscussionComment};
use crate::redact::redact;
use chrono::{DateTime, Utc};
use serde::Deserialize;

const REST_ROOT: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct RestUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RestDiscussion {
    node_id: String,
    number: i64,
    title: String,
    body: Option<String>,
    user: Option<RestUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RestComment {
    node_id: String,
    id: i64,
    body: String,
    user: Option<RestUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub(crate) async fn recent_discussions(
    http: &reqwest::Client,
    token: &str,
    repo: &str,
    page_size: usize,
) -> Result<Vec<Discussion>, GatewayError> {
    let url = format!("{REST_ROOT}/repos/{repo}/discussions?per_page={page_size}");
    let listed: Vec<RestDiscussion> = get_json(http, token, &url).await?;

    let mut discussions = Vec::with_capacity(listed.len());
    for item in listed {
        let comments = fetch_comments(http, token, repo, item.number).await?;
        discussions.push(into_discussion(item, comments, repo));
    }
    Ok(discussions)
}

pub(crate) async fn fetch_discussion(
    http: &reqwest::Client,
    token: &str,
    repo: &str,
    number: i64,
) -> Result<Discussion, GatewayError> {
    let url = format!("{REST_ROOT}/repos/{repo}/discussions/{number}");
    let discussion: RestDiscussion = get_json(http, token, &url).await?;
    let comments = fetch_comments(http, token, repo, number).await?;
    Ok(into_discussion(discussion, comments, repo))
}

async fn fetch_comments(
    http: &reqwest::Client,
    token: &str,
    repo: &str,
    number: i64,
) -> Result<Vec<DiscussionComment>, GatewayError> {
    let url = format!("{REST_ROOT}/repos/{repo}/discussions/{number}/comments?per_page=50");
    let comments: Vec<RestComment> = get_json(http, token, &url).await?;
    Ok(comments.into_iter().map(into_comment).collect())
}

fn into_discussion(
    discussion: RestDiscussion,
    comments: Vec<DiscussionComment>,
    repo: &str,
) -> Discussion {
    let url = discussion
        .html_url
        .unwrap_or_else(|| format!("https://github.com/{repo}/discussions/{}", discussion.number));
    Discussion {
        node_id: discussion.node_id,
        number: discussion.number,
        title: discussion.title,
        body: discussion.body.unwrap_or_default(),
        author: discussion.user.map(|u| u.login),
        created_at: discussion.created_at,
        updated_at: discussion.updated_at,
        url,
        comments,
    }
}

fn into_comment(comment: RestComment) -> DiscussionComment {
    DiscussionComment {
        node_id: comment.node_id,
        database_id: Some(comment.id),
        body: comment.body,
        author: comment.user.map(|u| u.login),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        replies: Vec::new(),
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    token: &str,
    url: &str,
) -> Result<T, GatewayError> {
    let response = http
        .get(url)
        .bearer_auth(token)
        .header("Accept", "application/vnd.github+json")
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if status.as_u16() == 404 {
        return Err(GatewayError::NotFound {
            resource: url.to_string(),
        });
    }
    if !status.is_success() {
        return Err(GatewayError::Protocol {
            message: format!("HTTP {status} from {url}"),
            body: redact(&body),
        });
    }

    serde_json::from_str(&body).map_err(|error| GatewayError::Protocol {
        message: format!("invalid JSON from {url}: {error}"),
        body: redact(&body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn maps_rest_discussion_shape() {
        let raw = indoc! {r#"
            {
                "node_id": "D_9",
                "number": 7,
                "title": "Deployment",
                "body": null,
                "user": { "login": "carol" },
                "created_at": "2024-05-01T09:00:00Z",
                "updated_at": "2024-05-01T09:05:00Z",
                "html_url": "https://github.com/acme/forum/discussions/7"
            }
        "#};
        let discussion: RestDiscussion = serde_json::from_str(raw).unwrap();
        let discussion = into_discussion(discussion, Vec::new(), "acme/forum");

        assert_eq!(discussion.node_id, "D_9");
        assert_eq!(discussion.body, "");
        assert_eq!(discussion.author.as_deref(), Some("carol"));
        assert_eq!(discussion.url, "https://github.com/acme/forum/discussions/7");
    }

    #[test]
    fn rest_comments_keep_database_ids() {
        let raw = indoc! {r#"
            {
                "node_id": "DC_9",
                "id": 555,
                "body": "ship it",
                "user": null,
                "created_at": "2024-05-01T09:01:00Z",
                "updated_at": "2024-05-01T09:01:00Z"
            }
        "#};
        let comment: RestComment = serde_json::from_str(raw).unwrap();
        let comment = into_comment(comment);

        assert_eq!(comment.database_id, Some(555));
        assert!(comment.author.is_none());
        assert!(comment.replies.is_empty());
    }
}
