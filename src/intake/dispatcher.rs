//! Dispatch orchestrator: turns each inbound message into an outbound plan
//! and delivers it.
//!
//! Every turn has two halves:
//! - `plan_turn`: synchronous bookkeeping: ticket lifecycle, flood check,
//!   routing. No suspension point, so per-sender read-modify-write is atomic.
//! - `execute`: the paced sends. Runs as its own task in [`Dispatcher::run`],
//!   so one sender's delays never block another sender's turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::channels::{Channel, IncomingMessage};
use crate::config::IntakeConfig;
use crate::error::Error;
use crate::intake::flood::FloodGuard;
use crate::intake::lifecycle::{TicketEvent, TicketLifecycle};
use crate::intake::registry::SessionRegistry;
use crate::intake::router::{self, MenuOption};
use crate::intake::script::IntakeScript;
use crate::intake::sender::{OutboundItem, ScriptedSender, SequenceAborted};
use crate::intake::sweep::SweepTask;

/// What the desk decided to do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDecision {
    /// A ticket was opened; the notice is the whole reply.
    TicketOpened,
    /// A menu option matched; its scripted sequence is sent.
    Scripted(MenuOption),
    /// Unmatched and outside the flood window; the greeting menu is sent.
    Greeting,
    /// Unmatched and inside the flood window; nothing is sent.
    Suppressed,
}

/// Outbound plan for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPlan {
    pub recipient: String,
    pub ticket_id: String,
    pub decision: TurnDecision,
    pub items: Vec<OutboundItem>,
}

/// Plan plus delivery result.
#[derive(Debug)]
pub struct TurnReport {
    pub plan: TurnPlan,
    pub outcome: Result<usize, SequenceAborted>,
}

/// Composes lifecycle, flood guard, router and sender.
pub struct Dispatcher {
    lifecycle: TicketLifecycle,
    flood: Arc<FloodGuard>,
    script: Arc<IntakeScript>,
    sender: ScriptedSender,
    sweep_interval: Option<std::time::Duration>,
}

impl Dispatcher {
    pub fn new(
        lifecycle: TicketLifecycle,
        flood: Arc<FloodGuard>,
        script: Arc<IntakeScript>,
        sender: ScriptedSender,
    ) -> Self {
        Self {
            lifecycle,
            flood,
            script,
            sender,
            sweep_interval: None,
        }
    }

    /// Wire up fresh state from configuration.
    pub fn from_config(
        config: &IntakeConfig,
        script: IntakeScript,
        channel: Arc<dyn Channel>,
    ) -> Self {
        let lifecycle = TicketLifecycle::new(Arc::new(SessionRegistry::new()), config.ticket_ttl);
        let flood = Arc::new(FloodGuard::new(config.flood_ttl));
        let sender = ScriptedSender::new(channel, config.send_delay);
        Self::new(lifecycle, flood, Arc::new(script), sender)
            .with_sweep_interval(config.sweep_interval)
    }

    /// Enable the background eviction sweep while [`run`](Self::run) is active.
    pub fn with_sweep_interval(mut self, interval: Option<std::time::Duration>) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn lifecycle(&self) -> &TicketLifecycle {
        &self.lifecycle
    }

    pub fn flood_guard(&self) -> &Arc<FloodGuard> {
        &self.flood
    }

    /// Decide the reply for `message` received at `now`, updating per-sender state.
    ///
    /// Returns `None` for self-echoes and empty payloads, which leave all
    /// state untouched.
    pub fn plan_turn(&self, message: &IncomingMessage, now: DateTime<Utc>) -> Option<TurnPlan> {
        if message.from_self {
            debug!(sender = %message.sender, "Ignoring self-echo");
            return None;
        }
        let Some(payload) = message.payload() else {
            debug!(sender = %message.sender, "Ignoring empty payload");
            return None;
        };

        let sender = message.sender.as_str();
        let event = self.lifecycle.observe(sender, now);
        let recency = self.flood.check_and_record(sender, now);
        let ticket_id = event.ticket().id.clone();

        let (decision, items) = match &event {
            TicketEvent::Opened { ticket, .. } => (
                TurnDecision::TicketOpened,
                vec![OutboundItem::Menu(self.script.ticket_notice(&ticket.id))],
            ),
            TicketEvent::Continued { .. } => match router::route(&payload) {
                Some(option) => (
                    TurnDecision::Scripted(option),
                    self.script
                        .replies(option)
                        .iter()
                        .map(|line| OutboundItem::Text(line.clone()))
                        .collect(),
                ),
                None if recency.suppresses_banner(false) => (TurnDecision::Suppressed, Vec::new()),
                None => (
                    TurnDecision::Greeting,
                    vec![OutboundItem::Menu(self.script.greeting_menu())],
                ),
            },
        };

        info!(
            sender = %sender,
            ticket_id = %ticket_id,
            channel = %message.channel,
            decision = ?decision,
            items = items.len(),
            "Turn planned"
        );

        Some(TurnPlan {
            recipient: message.sender.clone(),
            ticket_id,
            decision,
            items,
        })
    }

    /// Deliver a plan's items in order.
    pub async fn execute(&self, plan: &TurnPlan) -> Result<usize, SequenceAborted> {
        self.sender.send_sequence(&plan.recipient, &plan.items).await
    }

    /// Plan and deliver one message inline.
    pub async fn handle(&self, message: &IncomingMessage, now: DateTime<Utc>) -> Option<TurnReport> {
        let plan = self.plan_turn(message, now)?;
        let outcome = self.execute(&plan).await;
        Some(TurnReport { plan, outcome })
    }

    /// Consume the sender's channel until Ctrl+C or the inbound stream ends.
    ///
    /// Messages are planned one at a time in arrival order; deliveries run
    /// concurrently. On shutdown, in-flight deliveries are allowed to finish.
    pub async fn run(self: Arc<Self>) -> Result<(), Error> {
        let channel = Arc::clone(self.sender.channel());
        let mut messages = channel.start().await?;

        let sweep = self.sweep_interval.map(|interval| {
            SweepTask::spawn(self.lifecycle.clone(), Arc::clone(&self.flood), interval)
        });

        info!(channel = channel.name(), "Intake desk ready and listening");

        let mut turns: JoinSet<()> = JoinSet::new();

        loop {
            let message = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                Some(joined) = turns.join_next(), if !turns.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Turn task ended abnormally: {}", e);
                    }
                    continue;
                }
                msg = messages.next() => match msg {
                    Some(m) => m,
                    None => {
                        info!("Channel stream ended, shutting down...");
                        break;
                    }
                },
            };

            let Some(plan) = self.plan_turn(&message, Utc::now()) else {
                continue;
            };
            if plan.items.is_empty() {
                continue;
            }

            let dispatcher = Arc::clone(&self);
            turns.spawn(async move {
                // Failures are logged by the sender; the worker keeps going.
                let _ = dispatcher.execute(&plan).await;
            });
        }

        if !turns.is_empty() {
            info!(in_flight = turns.len(), "Waiting for in-flight replies");
        }
        while let Some(joined) = turns.join_next().await {
            if let Err(e) = joined {
                warn!("Turn task ended abnormally: {}", e);
            }
        }

        if let Some(sweep) = sweep {
            sweep.stop().await;
        }
        channel.shutdown().await?;
        info!("Intake desk stopped");
        Ok(())
    }
}
