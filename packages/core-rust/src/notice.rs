//! Transient status banners with a fixed time-to-live.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

/// How long a notice stays visible.
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Banner colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub created: Instant,
}

impl Notice {
    fn visible_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) < NOTICE_TTL
    }
}

/// Queue of recent notices. The newest unexpired one is the banner shown.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    queue: VecDeque<Notice>,
}

impl NoticeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts a notice at `now`, dropping any that have already expired.
    pub fn push(&mut self, kind: NoticeKind, message: impl Into<String>, now: Instant) {
        self.prune(now);
        self.queue.push_back(Notice {
            kind,
            message: message.into(),
            created: now,
        });
    }

    /// The banner to display at `now`, if any.
    #[must_use]
    pub fn current(&self, now: Instant) -> Option<&Notice> {
        self.queue.iter().rev().find(|n| n.visible_at(now))
    }

    /// Drops expired notices.
    pub fn prune(&mut self, now: Instant) {
        self.queue.retain(|n| n.visible_at(now));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
