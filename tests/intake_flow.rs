//! End-to-end tests for the intake flow.
//!
//! Each test drives a `Dispatcher` against a recording channel. Time-sensitive
//! tests run on tokio's paused clock so pacing is asserted without real sleeps.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

use intake_desk::channels::{Channel, IncomingMessage, MenuPrompt, MessageStream};
use intake_desk::config::{IntakeConfig, JitterRange};
use intake_desk::error::ChannelError;
use intake_desk::intake::{Dispatcher, IntakeScript, MenuOption, TurnDecision};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Sent {
    Text(String),
    Menu(MenuPrompt),
}

#[derive(Debug, Clone)]
struct Record {
    recipient: String,
    sent: Sent,
    at: Instant,
}

/// Channel that records every send and replays a fixed inbound script.
struct RecordingChannel {
    inbound: Mutex<Vec<IncomingMessage>>,
    records: Mutex<Vec<Record>>,
    failing_recipient: Option<String>,
}

impl RecordingChannel {
    fn new() -> Arc<Self> {
        Self::with_inbound(Vec::new(), None)
    }

    fn with_inbound(inbound: Vec<IncomingMessage>, failing_recipient: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            inbound: Mutex::new(inbound),
            records: Mutex::new(Vec::new()),
            failing_recipient: failing_recipient.map(str::to_string),
        })
    }

    fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    fn records_for(&self, recipient: &str) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|r| r.recipient == recipient)
            .collect()
    }

    fn record(&self, recipient: &str, sent: Sent) -> Result<(), ChannelError> {
        if self.failing_recipient.as_deref() == Some(recipient) {
            return Err(ChannelError::SendFailed {
                name: "recording".into(),
                reason: "recipient unreachable".into(),
            });
        }
        self.records.lock().unwrap().push(Record {
            recipient: recipient.to_string(),
            sent,
            at: Instant::now(),
        });
        Ok(())
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let inbound = std::mem::take(&mut *self.inbound.lock().unwrap());
        Ok(Box::pin(futures::stream::iter(inbound)))
    }

    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), ChannelError> {
        self.record(recipient, Sent::Text(text.to_string()))
    }

    async fn send_menu(&self, recipient: &str, menu: &MenuPrompt) -> Result<(), ChannelError> {
        self.record(recipient, Sent::Menu(menu.clone()))
    }
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn text(sender: &str, body: &str) -> IncomingMessage {
    IncomingMessage::text("recording", sender, body)
}

fn dispatcher_with(channel: Arc<RecordingChannel>, pacing: JitterRange) -> Dispatcher {
    let config = IntakeConfig {
        send_delay: pacing,
        ..IntakeConfig::default()
    };
    Dispatcher::from_config(&config, IntakeScript::default(), channel)
}

fn texts_of(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| match &r.sent {
            Sent::Text(t) => Some(t.clone()),
            Sent::Menu(_) => None,
        })
        .collect()
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn scenario_a_first_message_only_opens_ticket() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::default());

    let report = desk.handle(&text("U1", "1"), t0()).await.unwrap();

    assert_eq!(report.plan.decision, TurnDecision::TicketOpened);
    assert_eq!(report.outcome.unwrap(), 1);
    let records = channel.records();
    assert_eq!(records.len(), 1);
    match &records[0].sent {
        Sent::Menu(menu) => assert!(menu.banner.contains(&report.plan.ticket_id)),
        other => panic!("expected ticket notice, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_b_open_ticket_gets_air_travel_sequence() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::default());
    let script = IntakeScript::default();

    desk.handle(&text("U1", "oi"), t0()).await.unwrap();
    let start = Instant::now();
    let report = desk
        .handle(&text("U1", "1"), t0() + TimeDelta::seconds(1))
        .await
        .unwrap();

    assert_eq!(report.plan.decision, TurnDecision::Scripted(MenuOption::AirTravel));
    assert_eq!(report.outcome.unwrap(), 5);

    let records = channel.records_for("U1");
    let sequence = &records[1..];
    assert_eq!(texts_of(sequence), script.replies(MenuOption::AirTravel).to_vec());

    let mut prev = start;
    for record in sequence {
        assert!(
            record.at - prev >= Duration::from_millis(1000),
            "sends must be at least 1s apart"
        );
        prev = record.at;
    }
}

#[tokio::test(start_paused = true)]
async fn scenario_c_unmatched_inside_flood_window_is_silent() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    desk.handle(&text("U2", "hello"), t0()).await.unwrap();
    let report = desk
        .handle(&text("U2", "hello"), t0() + TimeDelta::minutes(5))
        .await
        .unwrap();

    assert_eq!(report.plan.decision, TurnDecision::Suppressed);
    assert_eq!(report.outcome.unwrap(), 0);
    assert_eq!(channel.records().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_unmatched_after_flood_window_gets_banner() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    desk.handle(&text("U2", "hello"), t0()).await.unwrap();
    let report = desk
        .handle(&text("U2", "hello"), t0() + TimeDelta::minutes(35))
        .await
        .unwrap();

    assert_eq!(report.plan.decision, TurnDecision::Greeting);
    let records = channel.records();
    assert_eq!(records.len(), 2);
    assert_eq!(
        records[1].sent,
        Sent::Menu(IntakeScript::default().greeting_menu())
    );
}

// ── Properties ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn expired_ticket_reopens_with_new_id_and_notice_only() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    let first = desk.handle(&text("U3", "oi"), t0()).await.unwrap();
    let later = t0() + TimeDelta::hours(2) + TimeDelta::minutes(1);
    let second = desk.handle(&text("U3", "2"), later).await.unwrap();

    assert_eq!(second.plan.decision, TurnDecision::TicketOpened);
    assert_ne!(second.plan.ticket_id, first.plan.ticket_id);
    assert_eq!(channel.records_for("U3").len(), 2);
    assert!(matches!(channel.records()[1].sent, Sent::Menu(_)));
}

#[tokio::test(start_paused = true)]
async fn repeated_selection_is_not_deduplicated() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    desk.handle(&text("U4", "oi"), t0()).await.unwrap();
    desk.handle(&text("U4", "3"), t0() + TimeDelta::seconds(2))
        .await
        .unwrap();
    desk.handle(&text("U4", "3"), t0() + TimeDelta::seconds(4))
        .await
        .unwrap();

    let other = IntakeScript::default().replies(MenuOption::Other).to_vec();
    let expected: Vec<String> = other.iter().chain(other.iter()).cloned().collect();
    assert_eq!(texts_of(&channel.records_for("U4")), expected);
}

#[tokio::test(start_paused = true)]
async fn selection_and_text_produce_the_same_sequence() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    desk.handle(&text("U5", "oi"), t0()).await.unwrap();
    desk.handle(&text("U5", "2"), t0() + TimeDelta::seconds(1))
        .await
        .unwrap();
    desk.handle(
        &IncomingMessage::selection("recording", "U5", "2"),
        t0() + TimeDelta::seconds(2),
    )
    .await
    .unwrap();

    let texts = texts_of(&channel.records_for("U5"));
    let (by_text, by_selection) = texts.split_at(texts.len() / 2);
    assert_eq!(by_text, by_selection);
}

#[tokio::test(start_paused = true)]
async fn dropped_events_produce_nothing() {
    let channel = RecordingChannel::new();
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    assert!(desk
        .handle(&text("U6", "1").with_from_self(true), t0())
        .await
        .is_none());
    assert!(desk.handle(&text("U6", " \n "), t0()).await.is_none());
    assert!(channel.records().is_empty());
    assert!(desk.lifecycle().registry().is_empty());
}

// ── Run loop ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn run_interleaves_senders_and_preserves_per_sender_order() {
    let inbound = vec![text("U1", "1"), text("U2", "3")];
    let channel = RecordingChannel::with_inbound(inbound, None);
    let desk = Arc::new(dispatcher_with(channel.clone(), JitterRange::default()));

    // Open both tickets so the streamed messages are routed.
    desk.plan_turn(&text("U1", "oi"), Utc::now()).unwrap();
    desk.plan_turn(&text("U2", "oi"), Utc::now()).unwrap();

    desk.clone().run().await.unwrap();

    let script = IntakeScript::default();
    let u1 = channel.records_for("U1");
    let u2 = channel.records_for("U2");
    assert_eq!(texts_of(&u1), script.replies(MenuOption::AirTravel).to_vec());
    assert_eq!(texts_of(&u2), script.replies(MenuOption::Other).to_vec());

    // U2's short sequence completes while U1 is still mid-sequence.
    assert!(u2.last().unwrap().at < u1.last().unwrap().at);
}

#[tokio::test(start_paused = true)]
async fn failing_sender_does_not_affect_others() {
    let inbound = vec![text("bad", "2"), text("good", "2")];
    let channel = RecordingChannel::with_inbound(inbound, Some("bad"));
    let desk = Arc::new(dispatcher_with(channel.clone(), JitterRange::none()));

    desk.plan_turn(&text("bad", "oi"), Utc::now()).unwrap();
    desk.plan_turn(&text("good", "oi"), Utc::now()).unwrap();

    desk.clone().run().await.unwrap();

    assert!(channel.records_for("bad").is_empty());
    assert_eq!(
        texts_of(&channel.records_for("good")),
        IntakeScript::default()
            .replies(MenuOption::RealEstate)
            .to_vec()
    );
}

#[tokio::test(start_paused = true)]
async fn send_failure_stops_the_sequence() {
    let channel = RecordingChannel::with_inbound(Vec::new(), Some("bad"));
    let desk = dispatcher_with(channel.clone(), JitterRange::none());

    desk.plan_turn(&text("bad", "oi"), t0()).unwrap();
    let report = desk
        .handle(&text("bad", "1"), t0() + TimeDelta::seconds(1))
        .await
        .unwrap();

    let aborted = report.outcome.unwrap_err();
    assert_eq!(aborted.index, 0);
    assert_eq!(aborted.total, 5);
    assert!(channel.records().is_empty());
}
