//! Ticket lifecycle: opens, refreshes and lazily expires per-sender tickets.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::intake::registry::{SessionRegistry, Ticket};

/// Outcome of the lifecycle step for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketEvent {
    /// A new ticket was created. `replaced` holds the stale ticket it
    /// superseded, if the sender had one.
    Opened {
        ticket: Ticket,
        replaced: Option<Ticket>,
    },
    /// The sender's live ticket was refreshed.
    Continued { ticket: Ticket },
}

impl TicketEvent {
    pub fn ticket(&self) -> &Ticket {
        match self {
            Self::Opened { ticket, .. } | Self::Continued { ticket } => ticket,
        }
    }

    pub fn is_opened(&self) -> bool {
        matches!(self, Self::Opened { .. })
    }
}

/// Applies the inactivity-window policy on top of the [`SessionRegistry`].
#[derive(Debug, Clone)]
pub struct TicketLifecycle {
    registry: Arc<SessionRegistry>,
    ttl: Duration,
}

impl TicketLifecycle {
    pub fn new(registry: Arc<SessionRegistry>, ttl: Duration) -> Self {
        Self { registry, ttl }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Record an inbound message from `sender` at `now`.
    ///
    /// Lookup, expiry check and create-or-touch run under one registry lock
    /// with no suspension point in between.
    pub fn observe(&self, sender: &str, now: DateTime<Utc>) -> TicketEvent {
        let mut registry = self.registry.lock();

        let live = registry
            .lookup(sender)
            .filter(|t| !t.is_expired(now, self.ttl))
            .is_some();

        if live {
            if let Some(ticket) = registry.touch(sender, now) {
                return TicketEvent::Continued {
                    ticket: ticket.clone(),
                };
            }
        }

        let replaced = registry.lookup(sender).cloned();
        let ticket = registry.create(sender, now);
        drop(registry);

        match &replaced {
            Some(old) => info!(
                sender = %sender,
                ticket_id = %ticket.id,
                previous_ticket_id = %old.id,
                "Ticket expired; opened a new one"
            ),
            None => info!(sender = %sender, ticket_id = %ticket.id, "Ticket opened"),
        }

        TicketEvent::Opened { ticket, replaced }
    }

    /// Evict tickets idle past the TTL. Lookup-time expiry stays authoritative.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        self.registry.evict_expired(now, self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn lifecycle() -> TicketLifecycle {
        TicketLifecycle::new(
            Arc::new(SessionRegistry::new()),
            Duration::from_secs(2 * 60 * 60),
        )
    }

    #[test]
    fn first_message_opens_ticket() {
        let lc = lifecycle();
        let event = lc.observe("u1", t0());
        assert!(event.is_opened());
        match event {
            TicketEvent::Opened { replaced, .. } => assert!(replaced.is_none()),
            other => panic!("expected Opened, got {other:?}"),
        }
    }

    #[test]
    fn follow_up_within_ttl_continues_same_ticket() {
        let lc = lifecycle();
        let opened = lc.observe("u1", t0()).ticket().clone();
        let later = t0() + TimeDelta::minutes(90);
        let event = lc.observe("u1", later);

        assert!(!event.is_opened());
        assert_eq!(event.ticket().id, opened.id);
        assert_eq!(event.ticket().last_interaction, later);
    }

    #[test]
    fn activity_keeps_ticket_alive_past_creation_ttl() {
        let lc = lifecycle();
        let opened = lc.observe("u1", t0()).ticket().clone();
        lc.observe("u1", t0() + TimeDelta::minutes(100));
        let event = lc.observe("u1", t0() + TimeDelta::minutes(200));
        assert_eq!(event.ticket().id, opened.id);
    }

    #[test]
    fn idle_past_ttl_opens_new_ticket() {
        let lc = lifecycle();
        let first = lc.observe("u1", t0()).ticket().clone();
        let event = lc.observe("u1", t0() + TimeDelta::hours(2) + TimeDelta::seconds(1));

        match event {
            TicketEvent::Opened { ticket, replaced } => {
                assert_ne!(ticket.id, first.id);
                assert_eq!(replaced.map(|t| t.id), Some(first.id));
            }
            other => panic!("expected Opened, got {other:?}"),
        }
        assert_eq!(lc.registry().len(), 1);
    }

    #[test]
    fn senders_are_independent() {
        let lc = lifecycle();
        let a = lc.observe("a", t0()).ticket().clone();
        let b = lc.observe("b", t0()).ticket().clone();
        assert_ne!(a.id, b.id);
        assert!(!lc.observe("a", t0() + TimeDelta::seconds(1)).is_opened());
        assert_eq!(lc.registry().len(), 2);
    }

    #[test]
    fn eviction_does_not_change_outcome() {
        let lc = lifecycle();
        lc.observe("u1", t0());
        let later = t0() + TimeDelta::hours(3);

        assert_eq!(lc.evict_expired(later), 1);
        match lc.observe("u1", later) {
            TicketEvent::Opened { replaced, .. } => assert!(replaced.is_none()),
            other => panic!("expected Opened, got {other:?}"),
        }
    }
}
