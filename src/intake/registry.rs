//! Session registry: sender identity → ticket record.
//!
//! All operations are synchronous. Compound read-then-write sequences go
//! through a [`RegistryGuard`], which holds the lock for the whole sequence
//! and cannot be carried across an `.await` in a spawned task.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::intake::elapsed;

/// A time-bounded conversation record for one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub sender: String,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl Ticket {
    /// Open a fresh ticket for `sender` at `now`.
    pub fn open(sender: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: generate_ticket_id(now),
            sender: sender.into(),
            created_at: now,
            last_interaction: now,
        }
    }

    /// Whether more than `ttl` has passed since the last interaction.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        elapsed(self.last_interaction, now) > ttl
    }
}

/// `TK-<UTC timestamp>-<8 hex chars>`. Unique with overwhelming probability.
fn generate_ticket_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("TK-{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}

/// In-memory ticket store keyed by sender.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    tickets: Mutex<HashMap<String, Ticket>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry for a check-then-mutate sequence.
    ///
    /// A poisoned lock is recovered: the map only ever holds whole tickets,
    /// and the last write wins.
    pub fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            tickets: self.tickets.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Snapshot of the sender's ticket, live or not.
    pub fn lookup(&self, sender: &str) -> Option<Ticket> {
        self.lock().lookup(sender).cloned()
    }

    /// Drop every ticket idle for longer than `ttl`. Returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut guard = self.lock();
        let before = guard.tickets.len();
        guard.tickets.retain(|sender, ticket| {
            let keep = !ticket.is_expired(now, ttl);
            if !keep {
                debug!(sender = %sender, ticket_id = %ticket.id, "Evicting expired ticket");
            }
            keep
        });
        before - guard.tickets.len()
    }

    pub fn len(&self) -> usize {
        self.lock().tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().tickets.is_empty()
    }
}

/// Exclusive access to the registry for the duration of one turn's bookkeeping.
pub struct RegistryGuard<'a> {
    tickets: MutexGuard<'a, HashMap<String, Ticket>>,
}

impl RegistryGuard<'_> {
    pub fn lookup(&self, sender: &str) -> Option<&Ticket> {
        self.tickets.get(sender)
    }

    /// Create and store a new ticket, replacing any previous record.
    pub fn create(&mut self, sender: &str, now: DateTime<Utc>) -> Ticket {
        let ticket = Ticket::open(sender, now);
        self.tickets.insert(sender.to_string(), ticket.clone());
        ticket
    }

    /// Refresh `last_interaction`. Returns the updated ticket, or `None` if
    /// the sender has no record.
    pub fn touch(&mut self, sender: &str, now: DateTime<Utc>) -> Option<&Ticket> {
        let ticket = self.tickets.get_mut(sender)?;
        if now > ticket.last_interaction {
            ticket.last_interaction = now;
        }
        Some(ticket)
    }
}
