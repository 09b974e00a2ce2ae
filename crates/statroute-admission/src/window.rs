//! Sliding request windows

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Timestamps of recent requests within a fixed span.
///
/// Every read trims first, so stale timestamps are never counted.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    span: Duration,
    stamps: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            stamps: VecDeque::new(),
        }
    }

    pub fn per_minute() -> Self {
        Self::new(Duration::from_secs(60))
    }

    pub fn per_hour() -> Self {
        Self::new(Duration::from_secs(3600))
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    /// Drop timestamps that have left the window
    pub fn trim(&mut self, now: Instant) {
        while let Some(oldest) = self.stamps.front() {
            if now.saturating_duration_since(*oldest) >= self.span {
                self.stamps.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn count(&mut self, now: Instant) -> usize {
        self.trim(now);
        self.stamps.len()
    }

    pub fn record(&mut self, now: Instant) {
        self.trim(now);
        self.stamps.push_back(now);
    }

    /// How long until the window has room for another request under `cap`
    pub fn wait_for_slot(&mut self, now: Instant, cap: u32) -> Duration {
        self.trim(now);
        let cap = cap as usize;
        if self.stamps.len() < cap {
            return Duration::ZERO;
        }
        // The slot frees when the entry that would put us at the cap expires
        let blocking = self.stamps.len() - cap;
        match self.stamps.get(blocking) {
            Some(stamp) => (*stamp + self.span).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }
}
