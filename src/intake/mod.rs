//! Intake core: per-sender tickets, flood suppression, menu routing and
//! paced scripted replies.
//!
//! - `registry`: sender → ticket map
//! - `lifecycle`: ticket open/refresh/expiry policy
//! - `flood`: greeting banner throttling
//! - `router`: payload → menu option
//! - `script`: customer-facing text
//! - `sender`: ordered, jittered delivery
//! - `dispatcher`: per-message composition and the run loop
//! - `sweep`: optional background eviction

pub mod dispatcher;
pub mod flood;
pub mod lifecycle;
pub mod payload;
pub mod registry;
pub mod router;
pub mod script;
pub mod sender;
pub mod sweep;

use std::time::Duration;

use chrono::{DateTime, Utc};

pub use dispatcher::{Dispatcher, TurnDecision, TurnPlan, TurnReport};
pub use flood::{FloodGuard, FloodVerdict};
pub use lifecycle::{TicketEvent, TicketLifecycle};
pub use payload::InboundPayload;
pub use registry::{SessionRegistry, Ticket};
pub use router::{MenuOption, route};
pub use script::IntakeScript;
pub use sender::{OutboundItem, ScriptedSender, SequenceAborted};
pub use sweep::SweepTask;

/// Time from `since` to `now`, clamped to zero if the clock went backwards.
pub(crate) fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}
