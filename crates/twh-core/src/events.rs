//! Typed outbound notifications.
//!
//! Every user-visible outcome (kept tweets, action results, lifecycle changes and
//! failures) is published as one `Event`; nothing is thrown across the stream
//! processing boundary.

use tokio::sync::broadcast;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorEvent {
    TwitterCreds,
    BitlyCreds,
    DuplicateStream,
    StreamInactive,
    Stream,
    SendTweet,
    Follow,
    ReportSpam,
    Block,
    Save,
}

impl ErrorEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorEvent::TwitterCreds => "twitterCreds",
            ErrorEvent::BitlyCreds => "bitlyCreds",
            ErrorEvent::DuplicateStream => "duplicateStream",
            ErrorEvent::StreamInactive => "streamInactive",
            ErrorEvent::Stream => "stream",
            ErrorEvent::SendTweet => "sendTweet",
            ErrorEvent::Follow => "follow",
            ErrorEvent::ReportSpam => "reportSpam",
            ErrorEvent::Block => "block",
            ErrorEvent::Save => "save",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Verified(String),
    Connecting,
    StreamConnected,
    StreamDestroyed,
    KeptTweet(String),
    Tweeted(String),
    Following(String),
    Reported { name: String, to: Option<String> },
    Blocked { name: String, to: Option<String> },
    Saved,
    Error { kind: ErrorEvent, message: String },
}

impl Event {
    pub fn error(kind: ErrorEvent, message: impl Into<String>) -> Self {
        Event::Error {
            kind,
            message: message.into(),
        }
    }

    /// Wire-style event name, e.g. `keptTweet` or `error::follow`.
    pub fn name(&self) -> String {
        match self {
            Event::Verified(_) => "twitVerified".to_string(),
            Event::Connecting => "connecting".to_string(),
            Event::StreamConnected => "streamConnected".to_string(),
            Event::StreamDestroyed => "streamDestroy".to_string(),
            Event::KeptTweet(_) => "keptTweet".to_string(),
            Event::Tweeted(_) => "tweeted".to_string(),
            Event::Following(_) => "following".to_string(),
            Event::Reported { .. } => "reported".to_string(),
            Event::Blocked { .. } => "blocked".to_string(),
            Event::Saved => "saved".to_string(),
            Event::Error { kind, .. } => format!("error::{}", kind.as_str()),
        }
    }
}

/// Fire-and-forget broadcast of events to whoever is listening.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: Event);
}

/// In-process publisher backed by a tokio broadcast channel.
///
/// Slow subscribers lag and lose old events; publishing never blocks.
#[derive(Clone, Debug)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Event>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Publisher for BroadcastPublisher {
    fn publish(&self, event: Event) {
        tracing::debug!(event = %event.name(), "publish");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}
