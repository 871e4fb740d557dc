//! Placeholder comment lifecycle.
//!
//! A placeholder is posted immediately so readers see work in progress,
//! then overwritten with the final answer. Every failure path still ends
//! with exactly one comment carrying the final body: update the placeholder
//! if we have one, otherwise create a fresh comment.

use crate::error::GatewayError;
use crate::github::DiscussionApi;

/// Body of the in-progress marker comment.
pub const PLACEHOLDER_BODY: &str = "⏳ _Generating a response…_";

/// User-safe notice posted when generation fails. Never carries error
/// detail or credentials.
pub const ERROR_BODY: &str =
    "Sorry, something went wrong while generating a response. Please try again later.";

/// Lifecycle states of one event's placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderState {
    /// No placeholder attempted yet.
    None,
    /// Marker comment exists and awaits the final body.
    Created { comment_id: String },
    /// Marker creation failed; delivery will create a plain comment.
    CreateFailed,
    /// Final body landed in the placeholder via update.
    Finalized { comment_id: String },
    /// Update failed; final body landed in a fresh comment instead.
    FallbackCreated { comment_id: String },
}

/// How the final body reached the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Placeholder updated in place.
    Finalized,
    /// Placeholder update failed; a fresh comment was created.
    FallbackCreated,
    /// No placeholder existed; a plain comment was created.
    Created,
}

/// Drives one event's placeholder through its lifecycle.
pub struct PlaceholderFlow<'a, A: DiscussionApi> {
    api: &'a A,
    discussion_id: &'a str,
    reply_to: Option<&'a str>,
    pub state: PlaceholderState,
}

impl<'a, A: DiscussionApi> PlaceholderFlow<'a, A> {
    pub fn new(api: &'a A, discussion_id: &'a str, reply_to: Option<&'a str>) -> Self {
        Self {
            api,
            discussion_id,
            reply_to,
            state: PlaceholderState::None,
        }
    }

    /// Post the in-progress marker. Failure is recorded, not raised —
    /// processing continues and delivery creates a plain comment instead.
    pub async fn create(&mut self) {
        match self
            .api
            .create_comment(self.discussion_id, PLACEHOLDER_BODY, self.reply_to)
            .await
        {
            Ok(comment) => {
                tracing::debug!(comment_id = %comment.node_id, "placeholder created");
                self.state = PlaceholderState::Created { comment_id: comment.node_id };
            }
            Err(error) => {
                tracing::warn!(%error, "placeholder creation failed, will post a plain comment");
                self.state = PlaceholderState::CreateFailed;
            }
        }
    }

    /// Land the final body in the thread, through exactly one of update or
    /// create. The returned outcome says which path succeeded.
    pub async fn deliver(&mut self, body: &str) -> Result<Delivery, GatewayError> {
        match self.state.clone() {
            PlaceholderState::Created { comment_id } => {
                match self.api.update_comment(&comment_id, body).await {
                    Ok(comment) => {
                        self.state = PlaceholderState::Finalized { comment_id: comment.node_id };
                        Ok(Delivery::Finalized)
                    }
                    Err(error) => {
                        tracing::warn!(%error, "placeholder update failed, creating a fresh comment");
                        let comment = self
                            .api
                            .create_comment(self.discussion_id, body, self.reply_to)
                            .await?;
                        self.state =
                            PlaceholderState::FallbackCreated { comment_id: comment.node_id };
                        Ok(Delivery::FallbackCreated)
                    }
                }
            }
            PlaceholderState::None | PlaceholderState::CreateFailed => {
                let comment = self
                    .api
                    .create_comment(self.discussion_id, body, self.reply_to)
                    .await?;
                self.state = PlaceholderState::FallbackCreated { comment_id: comment.node_id };
                Ok(Delivery::Created)
            }
            PlaceholderState::Finalized { .. } | PlaceholderState::FallbackCreated { .. } => {
                tracing::debug!("delivery requested twice, ignoring");
                Ok(Delivery::Finalized)
            }
        }
    }

    /// Best-effort delivery of the fixed error notice. Never raises.
    pub async fn deliver_error(&mut self) {
        if let Err(error) = self.deliver(ERROR_BODY).await {
            tracing::warn!(%error, "failed to post error notice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{CommentRef, Discussion};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every mutation; configurable failure injection.
    #[derive(Default)]
    struct MockApi {
        created: Mutex<Vec<(String, String, Option<String>)>>,
        updated: Mutex<Vec<(String, String)>>,
        /// Number of create calls to reject before succeeding.
        fail_creates: AtomicUsize,
        fail_update: bool,
        counter: AtomicUsize,
    }

    impl MockApi {
        fn created_bodies(&self) -> Vec<String> {
            self.created.lock().unwrap().iter().map(|(_, body, _)| body.clone()).collect()
        }
    }

    impl DiscussionApi for MockApi {
        async fn recent_discussions(
            &self,
            _repo: &str,
            _page_size: usize,
        ) -> Result<Vec<Discussion>, GatewayError> {
            Ok(Vec::new())
        }

        async fn fetch_discussion(
            &self,
            repo: &str,
            number: i64,
        ) -> Result<Discussion, GatewayError> {
            Err(GatewayError::NotFound { resource: format!("{repo}#{number}") })
        }

        async fn create_comment(
            &self,
            discussion_id: &str,
            body: &str,
            reply_to: Option<&str>,
        ) -> Result<CommentRef, GatewayError> {
            if self
                .fail_creates
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(GatewayError::Protocol {
                    message: "create rejected".into(),
                    body: String::new(),
                });
            }
            let id = format!("DC_new_{}", self.counter.fetch_add(1, Ordering::SeqCst));
            self.created.lock().unwrap().push((
                discussion_id.to_string(),
                body.to_string(),
                reply_to.map(String::from),
            ));
            Ok(CommentRef { node_id: id })
        }

        async fn update_comment(
            &self,
            comment_id: &str,
            body: &str,
        ) -> Result<CommentRef, GatewayError> {
            if self.fail_update {
                return Err(GatewayError::Protocol {
                    message: "update rejected".into(),
                    body: String::new(),
                });
            }
            self.updated.lock().unwrap().push((comment_id.to_string(), body.to_string()));
            Ok(CommentRef { node_id: comment_id.to_string() })
        }
    }

    #[tokio::test]
    async fn happy_path_finalizes_the_placeholder() {
        let api = MockApi::default();
        let mut flow = PlaceholderFlow::new(&api, "D_1", None);

        flow.create().await;
        assert!(matches!(flow.state, PlaceholderState::Created { .. }));

        let delivery = flow.deliver("the answer").await.unwrap();
        assert_eq!(delivery, Delivery::Finalized);

        // One marker comment, one update, no extra comments.
        assert_eq!(api.created_bodies(), vec![PLACEHOLDER_BODY.to_string()]);
        let updated = api.updated.lock().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].1, "the answer");
    }

    #[tokio::test]
    async fn update_failure_falls_back_to_a_fresh_comment() {
        let api = MockApi { fail_update: true, ..MockApi::default() };
        let mut flow = PlaceholderFlow::new(&api, "D_1", Some("DC_parent"));

        flow.create().await;
        let delivery = flow.deliver("the answer").await.unwrap();

        assert_eq!(delivery, Delivery::FallbackCreated);
        let bodies = api.created_bodies();
        assert_eq!(bodies, vec![PLACEHOLDER_BODY.to_string(), "the answer".to_string()]);
    }

    #[tokio::test]
    async fn create_failure_still_delivers_exactly_one_comment() {
        let api = MockApi { fail_creates: AtomicUsize::new(1), ..MockApi::default() };
        let mut flow = PlaceholderFlow::new(&api, "D_1", None);

        flow.create().await;
        assert_eq!(flow.state, PlaceholderState::CreateFailed);

        let delivery = flow.deliver("the answer").await.unwrap();

        assert_eq!(delivery, Delivery::Created);
        assert_eq!(api.created_bodies(), vec!["the answer".to_string()]);
    }

    #[tokio::test]
    async fn error_notice_lands_in_the_placeholder() {
        let api = MockApi::default();
        let mut flow = PlaceholderFlow::new(&api, "D_1", None);

        flow.create().await;
        flow.deliver_error().await;

        let updated = api.updated.lock().unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].1, ERROR_BODY);
    }

    #[tokio::test]
    async fn replies_carry_the_parent_comment_id() {
        let api = MockApi::default();
        let mut flow = PlaceholderFlow::new(&api, "D_1", Some("DC_parent"));

        flow.create().await;

        let created = api.created.lock().unwrap();
        assert_eq!(created[0].2.as_deref(), Some("DC_parent"));
    }
}
