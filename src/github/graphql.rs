//! GraphQL query/mutation plumbing for the discussion gateway.
//!
//! A response with a non-empty `errors` array is a failure even when the
//! HTTP status is 200. Error classification routes missing-capability and
//! unknown-schema responses to the REST fallback; everything else surfaces
//! as a protocol error carrying the (redacted) response body.

use crate::error::GatewayError;
use crate::github::{CommentRef, Discussion, DiscussionComment};
use crate::redact::redact;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

const GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Trailing comments fetched per discussion when polling.
const COMMENT_PAGE: i64 = 5;

const RECENT_DISCUSSIONS_QUERY: &str = r#"
query($owner: String!, $name: String!, $pageSize: Int!, $commentPage: Int!) {
  repository(owner: $owner, name: $name) {
    discussions(first: $pageSize, orderBy: {field: UPDATED_AT, direction: DESC}) {
      nodes {
        id
        number
        title
        body
        url
        createdAt
        updatedAt
        author { login }
        comments(last: $commentPage) {
          nodes {
            id
            databaseId
            body
            createdAt
            updatedAt
            author { login }
            replies(last: 10) {
              nodes {
                id
                databaseId
                body
                createdAt
                updatedAt
                author { login }
              }
            }
          }
        }
      }
    }
  }
}
"#;

const FETCH_DISCUSSION_QUERY: &str = r#"
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    discussion(number: $number) {
      id
      number
      title
      body
      url
      createdAt
      updatedAt
      author { login }
      comments(first: 50) {
        nodes {
          id
          databaseId
          body
          createdAt
          updatedAt
          author { login }
          replies(last: 10) {
            nodes {
              id
              databaseId
              body
              createdAt
              updatedAt
              author { login }
            }
          }
        }
      }
    }
  }
}
"#;

const ADD_COMMENT_MUTATION: &str = r#"
mutation($discussionId: ID!, $body: String!) {
  addDiscussionComment(input: {discussionId: $discussionId, body: $body}) {
    comment { id }
  }
}
"#;

const ADD_REPLY_MUTATION: &str = r#"
mutation($discussionId: ID!, $replyToId: ID!, $body: String!) {
  addDiscussionComment(input: {discussionId: $discussionId, replyToId: $replyToId, body: $body}) {
    comment { id }
  }
}
"#;

const UPDATE_COMMENT_MUTATION: &str = r#"
mutation($commentId: ID!, $body: String!) {
  updateDiscussionComment(input: {commentId: $commentId, body: $body}) {
    comment { id }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<serde_json::Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Actor {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscussionNode {
    id: String,
    number: i64,
    title: String,
    body: Option<String>,
    url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: Option<Actor>,
    comments: Option<Connection<CommentNode>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentNode {
    id: String,
    database_id: Option<i64>,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author: Option<Actor>,
    replies: Option<Connection<CommentNode>>,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    nodes: Vec<T>,
}

fn into_discussion(node: DiscussionNode, repo: &str) -> Discussion {
    let url = node
        .url
        .unwrap_or_else(|| format!("https://github.com/{repo}/discussions/{}", node.number));
    Discussion {
        node_id: node.id,
        number: node.number,
        title: node.title,
        body: node.body.unwrap_or_default(),
        author: node.author.map(|a| a.login),
        created_at: node.created_at,
        updated_at: node.updated_at,
        url,
        comments: node
            .comments
            .map(|c| c.nodes.into_iter().map(into_comment).collect())
            .unwrap_or_default(),
    }
}

fn into_comment(node: CommentNode) -> DiscussionComment {
    DiscussionComment {
        node_id: node.id,
        database_id: node.database_id,
        body: node.body,
        author: node.author.map(|a| a.login),
        created_at: node.created_at,
        updated_at: node.updated_at,
        replies: node
            .replies
            .map(|c| c.nodes.into_iter().map(into_comment).collect())
            .unwrap_or_default(),
    }
}

pub(crate) async fn recent_discussions(
    http: &reqwest::Client,
    token: &str,
    repo: &str,
    page_size: usize,
) -> Result<Vec<Discussion>, GatewayError> {
    let (owner, name) = split_repo(repo)?;
    let data = post(
        http,
        token,
        RECENT_DISCUSSIONS_QUERY,
        json!({
            "owner": owner,
            "name": name,
            "pageSize": page_size as i64,
            "commentPage": COMMENT_PAGE,
        }),
    )
    .await?;

    let nodes = data
        .pointer("/repository/discussions/nodes")
        .cloned()
        .ok_or_else(|| GatewayError::Protocol {
            message: "response missing repository.discussions.nodes".into(),
            body: redact(&data.to_string()),
        })?;

    let nodes: Vec<DiscussionNode> =
        serde_json::from_value(nodes).map_err(|error| GatewayError::Protocol {
            message: format!("malformed discussion list: {error}"),
            body: redact(&data.to_string()),
        })?;

    Ok(nodes.into_iter().map(|n| into_discussion(n, repo)).collect())
}

pub(crate) async fn fetch_discussion(
    http: &reqwest::Client,
    token: &str,
    repo: &str,
    number: i64,
) -> Result<Discussion, GatewayError> {
    let (owner, name) = split_repo(repo)?;
    let data = post(
        http,
        token,
        FETCH_DISCUSSION_QUERY,
        json!({ "owner": owner, "name": name, "number": number }),
    )
    .await?;

    let node = data.pointer("/repository/discussion").cloned();
    let node = match node {
        Some(value) if !value.is_null() => value,
        _ => {
            return Err(GatewayError::NotFound {
                resource: format!("{repo}#{number}"),
            });
        }
    };

    let node: DiscussionNode =
        serde_json::from_value(node).map_err(|error| GatewayError::Protocol {
            message: format!("malformed discussion: {error}"),
            body: redact(&data.to_string()),
        })?;

    Ok(into_discussion(node, repo))
}

pub(crate) async fn create_comment(
    http: &reqwest::Client,
    token: &str,
    discussion_id: &str,
    body: &str,
    reply_to: Option<&str>,
) -> Result<CommentRef, GatewayError> {
    let (query, variables) = match reply_to {
        Some(reply_to_id) => (
            ADD_REPLY_MUTATION,
            json!({ "discussionId": discussion_id, "replyToId": reply_to_id, "body": body }),
        ),
        None => (
            ADD_COMMENT_MUTATION,
            json!({ "discussionId": discussion_id, "body": body }),
        ),
    };

    let data = post(http, token, query, variables).await?;
    comment_ref(&data, "/addDiscussionComment/comment/id")
}

pub(crate) async fn update_comment(
    http: &reqwest::Client,
    token: &str,
    comment_id: &str,
    body: &str,
) -> Result<CommentRef, GatewayError> {
    let data = post(
        http,
        token,
        UPDATE_COMMENT_MUTATION,
        json!({ "commentId": comment_id, "body": body }),
    )
    .await?;
    comment_ref(&data, "/updateDiscussionComment/comment/id")
}

fn comment_ref(data: &serde_json::Value, pointer: &str) -> Result<CommentRef, GatewayError> {
    data.pointer(pointer)
        .and_then(|id| id.as_str())
        .map(|id| CommentRef { node_id: id.to_string() })
        .ok_or_else(|| GatewayError::Protocol {
            message: "mutation response missing comment id".into(),
            body: redact(&data.to_string()),
        })
}

async fn post(
    http: &reqwest::Client,
    token: &str,
    query: &str,
    variables: serde_json::Value,
) -> Result<serde_json::Value, GatewayError> {
    let response = http
        .post(GRAPHQL_URL)
        .bearer_auth(token)
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(GatewayError::Protocol {
            message: format!("HTTP {status}"),
            body: redact(&body),
        });
    }

    let parsed: GraphQlResponse =
        serde_json::from_str(&body).map_err(|error| GatewayError::Protocol {
            message: format!("invalid JSON: {error}"),
            body: redact(&body),
        })?;

    if !parsed.errors.is_empty() {
        return Err(classify_errors(&parsed.errors, &body));
    }

    parsed.data.ok_or_else(|| GatewayError::Protocol {
        message: "response missing data".into(),
        body: redact(&body),
    })
}

/// Classify a GraphQL error array into the gateway taxonomy.
///
/// Classification is by error content, not by transport exception type:
/// NOT_FOUND propagates as such, unknown-schema and disabled-feature errors
/// signal that the query surface cannot serve us and REST should be tried.
pub(crate) fn classify_errors(errors: &[GraphQlError], raw_body: &str) -> GatewayError {
    if let Some(missing) = errors.iter().find(|e| e.kind.as_deref() == Some("NOT_FOUND")) {
        return GatewayError::NotFound {
            resource: missing.message.clone(),
        };
    }

    let unsupported = errors.iter().find(|e| {
        matches!(e.kind.as_deref(), Some("UNSUPPORTED") | Some("FORBIDDEN"))
            || e.message.contains("doesn't exist on type")
            || e.message.contains("Unknown field")
            || e.message.contains("is disabled")
    });
    if let Some(error) = unsupported {
        return GatewayError::Unsupported(error.message.clone());
    }

    let message = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    GatewayError::Protocol {
        message,
        body: redact(raw_body),
    }
}

fn split_repo(repo: &str) -> Result<(&str, &str), GatewayError> {
    repo.split_once('/').ok_or_else(|| GatewayError::Protocol {
        message: format!("repository must be in owner/name form, got '{repo}'"),
        body: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn parse_discussions(raw: &str) -> Vec<Discussion> {
        let data: serde_json::Value = serde_json::from_str(raw).unwrap();
        let nodes = data.pointer("/repository/discussions/nodes").cloned().unwrap();
        let nodes: Vec<DiscussionNode> = serde_json::from_value(nodes).unwrap();
        nodes.into_iter().map(|n| into_discussion(n, "acme/forum")).collect()
    }

    #[test]
    fn parses_discussion_nodes_with_comments_and_replies() {
        let raw = indoc! {r#"
            {
              "repository": {
                "discussions": {
                  "nodes": [
                    {
                      "id": "D_1",
                      "number": 12,
                      "title": "Borrow checker question",
                      "body": "Hello",
                      "url": "https://github.com/acme/forum/discussions/12",
                      "createdAt": "2024-05-01T10:00:00Z",
                      "updatedAt": "2024-05-01T10:30:00Z",
                      "author": { "login": "alice" },
                      "comments": {
                        "nodes": [
                          {
                            "id": "DC_1",
                            "databaseId": 42,
                            "body": "Try cloning less",
                            "createdAt": "2024-05-01T10:10:00Z",
                            "updatedAt": "2024-05-01T10:10:00Z",
                            "author": null,
                            "replies": {
                              "nodes": [
                                {
                                  "id": "DC_2",
                                  "databaseId": 43,
                                  "body": "Or borrow more",
                                  "createdAt": "2024-05-01T10:20:00Z",
                                  "updatedAt": "2024-05-01T10:20:00Z",
                                  "author": { "login": "bob" }
                                }
                              ]
                            }
                          }
                        ]
                      }
                    }
                  ]
                }
              }
            }
        "#};

        let discussions = parse_discussions(raw);
        assert_eq!(discussions.len(), 1);

        let discussion = &discussions[0];
        assert_eq!(discussion.node_id, "D_1");
        assert_eq!(discussion.number, 12);
        assert_eq!(discussion.author.as_deref(), Some("alice"));
        assert_eq!(discussion.comments.len(), 1);

        let comment = &discussion.comments[0];
        assert_eq!(comment.database_id, Some(42));
        assert!(comment.author.is_none());
        assert_eq!(comment.replies.len(), 1);
        assert_eq!(comment.replies[0].author.as_deref(), Some("bob"));
    }

    #[test]
    fn not_found_errors_classify_as_not_found() {
        let errors = vec![GraphQlError {
            message: "Could not resolve to a Discussion".into(),
            kind: Some("NOT_FOUND".into()),
        }];
        let classified = classify_errors(&errors, "{}");
        assert!(matches!(classified, GatewayError::NotFound { .. }));
    }

    #[test]
    fn schema_errors_classify_as_unsupported() {
        let errors = vec![GraphQlError {
            message: "Field 'discussions' doesn't exist on type 'Repository'".into(),
            kind: None,
        }];
        let classified = classify_errors(&errors, "{}");
        assert!(matches!(classified, GatewayError::Unsupported(_)));
    }

    #[test]
    fn other_errors_classify_as_protocol_failures() {
        let errors = vec![GraphQlError {
            message: "Something went wrong".into(),
            kind: Some("INTERNAL".into()),
        }];
        let classified = classify_errors(&errors, r#"{"token=abc123": true}"#);
        match classified {
            GatewayError::Protocol { message, body } => {
                assert_eq!(message, "Something went wrong");
                assert!(body.contains("[REDACTED]"));
            }
            other => panic!("expected Protocol, got {other:?}"),
        }
    }
}
