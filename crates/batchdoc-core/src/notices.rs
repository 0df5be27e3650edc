//! User-visible notice queue
//!
//! Notices are shown one at a time in arrival order. The visible one
//! auto-dismisses after `display_ms`, then the next appears after a short gap.
//! The host drives time through [`NoticeQueue::tick`].

use serde::Serialize;
use std::collections::VecDeque;

/// Pause between one notice hiding and the next showing
pub const NOTICE_GAP_MS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: String,
    pub priority: Priority,
    pub queued_at_ms: u64,
}

/// What the host should display right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoticeView {
    pub message: String,
    pub priority: Priority,
    /// Notices waiting behind the visible one
    pub pending: usize,
}

#[derive(Debug, Clone)]
pub struct NoticeQueue {
    pending: VecDeque<Notice>,
    current: Option<(Notice, u64)>,
    display_ms: u64,
    next_show_at_ms: u64,
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new(4_000)
    }
}

impl NoticeQueue {
    pub fn new(display_ms: u64) -> Self {
        Self {
            pending: VecDeque::new(),
            current: None,
            display_ms,
            next_show_at_ms: 0,
        }
    }

    pub fn push(&mut self, message: impl Into<String>, priority: Priority, now_ms: u64) {
        self.pending.push_back(Notice {
            message: message.into(),
            priority,
            queued_at_ms: now_ms,
        });
        if self.current.is_none() {
            self.advance(now_ms);
        }
    }

    pub fn error(&mut self, message: impl Into<String>, now_ms: u64) {
        self.push(message, Priority::Error, now_ms);
    }

    pub fn warning(&mut self, message: impl Into<String>, now_ms: u64) {
        self.push(message, Priority::Warning, now_ms);
    }

    pub fn info(&mut self, message: impl Into<String>, now_ms: u64) {
        self.push(message, Priority::Info, now_ms);
    }

    pub fn current(&self) -> Option<NoticeView> {
        self.current.as_ref().map(|(notice, _)| NoticeView {
            message: notice.message.clone(),
            priority: notice.priority,
            pending: self.pending.len(),
        })
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Everything not yet dismissed, visible one first
    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance time; returns true when the visible notice changed
    pub fn tick(&mut self, now_ms: u64) -> bool {
        match &self.current {
            Some((_, shown_at)) if now_ms.saturating_sub(*shown_at) >= self.display_ms => {
                self.current = None;
                self.next_show_at_ms = now_ms + NOTICE_GAP_MS;
                self.advance(now_ms);
                true
            }
            Some(_) => false,
            None => self.advance(now_ms),
        }
    }

    /// Hide the visible notice; the next shows after the gap
    pub fn dismiss(&mut self, now_ms: u64) {
        if self.current.take().is_some() {
            self.next_show_at_ms = now_ms + NOTICE_GAP_MS;
        }
    }

    pub fn dismiss_all(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    fn advance(&mut self, now_ms: u64) -> bool {
        if self.current.is_some() || now_ms < self.next_show_at_ms {
            return false;
        }
        match self.pending.pop_front() {
            Some(notice) => {
                self.current = Some((notice, now_ms));
                true
            }
            None => false,
        }
    }
}
