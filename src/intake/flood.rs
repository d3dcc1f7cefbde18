//! Flood guard: throttles the unsolicited greeting banner per sender.
//!
//! Tracks its own last-interaction timestamps, separate from tickets, and is
//! evaluated against a shorter window. It never gates matched menu replies.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::intake::elapsed;

/// Whether the previous interaction falls inside the flood window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodVerdict {
    /// Sender was seen less than the flood TTL ago.
    Recent,
    /// No interaction inside the window (or never seen).
    Quiet,
}

impl FloodVerdict {
    /// The banner is only suppressed when nothing matched and the sender is recent.
    pub fn suppresses_banner(&self, matched: bool) -> bool {
        !matched && *self == Self::Recent
    }
}

/// Per-sender recency tracker for banner suppression.
#[derive(Debug)]
pub struct FloodGuard {
    ttl: Duration,
    last_seen: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl FloodGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Judge `now` against the previous interaction, then record `now`.
    pub fn check_and_record(&self, sender: &str, now: DateTime<Utc>) -> FloodVerdict {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let verdict = match last_seen.get(sender) {
            Some(&prev) if elapsed(prev, now) < self.ttl => FloodVerdict::Recent,
            _ => FloodVerdict::Quiet,
        };
        let entry = last_seen.entry(sender.to_string()).or_insert(now);
        if now > *entry {
            *entry = now;
        }
        verdict
    }

    /// Last recorded interaction for `sender`.
    pub fn last_interaction(&self, sender: &str) -> Option<DateTime<Utc>> {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sender)
            .copied()
    }

    /// Forget senders whose window has lapsed. Returns how many were removed.
    pub fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let mut last_seen = self.last_seen.lock().unwrap_or_else(PoisonError::into_inner);
        let before = last_seen.len();
        last_seen.retain(|_, &mut prev| elapsed(prev, now) < self.ttl);
        before - last_seen.len()
    }

    pub fn len(&self) -> usize {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
