//! Polling loop: discover new activity, dedup it, hand events to the handler.

use crate::ProcessingEvent;
use crate::config::Config;
use crate::github::{Discussion, DiscussionApi};
use crate::handler::EventHandler;
use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

/// Bounded memory of already-processed item keys.
///
/// Membership is a set; insertion order matters only for trimming, which
/// drops the oldest entries once the cap is exceeded.
#[derive(Debug)]
pub struct DedupSet {
    seen: HashSet<String>,
    order: VecDeque<String>,
    cap: usize,
    keep: usize,
}

impl DedupSet {
    pub fn new(cap: usize, keep: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(cap),
            order: VecDeque::with_capacity(cap),
            cap,
            keep,
        }
    }

    /// Record a key. Returns false when it was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        self.order.push_back(key.to_string());
        if self.order.len() > self.cap {
            self.trim();
        }
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn trim(&mut self) {
        while self.order.len() > self.keep {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        tracing::debug!(retained = self.order.len(), "trimmed dedup set");
    }
}

/// Select events from a polled snapshot.
///
/// A discussion qualifies when its update time is at or after the cutoff;
/// within a qualifying discussion, each comment qualifies on the same test.
/// Qualifying items already present in the dedup set are skipped; emitted
/// items are recorded.
pub fn select_events(
    repo: &str,
    discussions: &[Discussion],
    cutoff: DateTime<Utc>,
    dedup: &mut DedupSet,
) -> Vec<ProcessingEvent> {
    let mut events = Vec::new();

    for discussion in discussions {
        if discussion.updated_at < cutoff {
            continue;
        }

        let discussion_event = ProcessingEvent::NewDiscussion {
            repo: repo.to_string(),
            number: discussion.number,
            discussion_id: discussion.node_id.clone(),
            title: discussion.title.clone(),
        };
        if dedup.insert(&discussion_event.dedup_key()) {
            events.push(discussion_event);
        }

        for comment in &discussion.comments {
            if comment.updated_at < cutoff {
                continue;
            }
            let comment_event = ProcessingEvent::NewComment {
                repo: repo.to_string(),
                discussion_number: discussion.number,
                discussion_id: discussion.node_id.clone(),
                comment_id: comment.node_id.clone(),
                body: comment.body.clone(),
            };
            if dedup.insert(&comment_event.dedup_key()) {
                events.push(comment_event);
            }
        }
    }

    events
}

/// Continuous poll loop. One synchronous pass per interval; each discovered
/// event is processed to completion before the next is considered.
pub struct Monitor<A: DiscussionApi> {
    api: A,
    handler: EventHandler<A>,
    dedup: DedupSet,
    repository: String,
    interval: std::time::Duration,
    since_minutes: i64,
    page_size: usize,
}

impl<A: DiscussionApi> Monitor<A> {
    pub fn new(api: A, handler: EventHandler<A>, config: &Config) -> Self {
        Self {
            api,
            handler,
            dedup: DedupSet::new(config.poll.dedup_cap, config.poll.dedup_keep),
            repository: config.repository.clone(),
            interval: config.poll.interval,
            since_minutes: config.poll.since_minutes,
            page_size: config.poll.page_size,
        }
    }

    /// Run until interrupted. Nothing inside a tick can end the loop.
    pub async fn run(&mut self) -> crate::error::Result<()> {
        tracing::info!(
            repository = %self.repository,
            interval_secs = self.interval.as_secs(),
            "starting discussion monitor"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("monitoring stopped by user");
                    return Ok(());
                }
            }
        }
    }

    async fn tick(&mut self) {
        let cutoff = Utc::now() - chrono::Duration::minutes(self.since_minutes);

        let discussions = match self.api.recent_discussions(&self.repository, self.page_size).await
        {
            Ok(discussions) => discussions,
            Err(error) => {
                tracing::error!(%error, "failed to fetch recent discussions");
                return;
            }
        };

        let events = select_events(&self.repository, &discussions, cutoff, &mut self.dedup);
        if events.is_empty() {
            return;
        }
        tracing::info!(count = events.len(), "discovered new activity");

        for event in events {
            let key = event.dedup_key();
            if let Err(error) = self.handler.handle(&event).await {
                tracing::error!(%error, %key, "event processing failed");
            }
        }
    }
}
