//! # Event Bus System
//!
//! Broadcasts playback events to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ Coordinator ├──────────────>│           ├─────────────────>│ UI layer   │
//! └─────────────┘               │ EventBus  │                  └────────────┘
//! ┌─────────────┐     emit      │ (broadcast│     subscribe    ┌────────────┐
//! │ Listen Rec. ├──────────────>│  channel) ├─────────────────>│ Analytics  │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! The bus is for observers only. Nothing that feeds back into playback state
//! goes through it; the coordinator's own control channel handles that.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut subscriber = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::BufferingChanged { buffering: true }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Buffering changed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: every sender is gone. Treat as shutdown.

use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback-related events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::SessionStarted { .. })
            | CoreEvent::Playback(PlaybackEvent::ListenRecorded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A new session was loaded into the media handle.
    SessionStarted {
        epoch: u64,
        /// Queue slot being played.
        uid: String,
        /// `None` for collectibles.
        track_id: Option<u64>,
    },
    /// The coordinator's state changed.
    StateChanged {
        /// Lower-case state name (`"playing"`, `"paused"`, ...).
        state: String,
    },
    /// The media handle started or stopped buffering.
    BufferingChanged { buffering: bool },
    /// The current session played to its end.
    Completed { epoch: u64, track_id: Option<u64> },
    /// A unique listen was counted.
    ListenRecorded { track_id: u64, epoch: u64 },
    /// Playback failed.
    Error {
        track_id: Option<u64>,
        /// Human-readable error message.
        message: String,
        /// Diagnostics reported alongside the failure.
        info: Option<String>,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SessionStarted { .. } => "Playback session started",
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::BufferingChanged { .. } => "Buffering changed",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::ListenRecorded { .. } => "Listen recorded",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus. Clone it freely; every clone publishes to the same
/// channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. `CoreConfig::validate` rejects that
    /// before a bus is ever built from configuration.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if nobody is listening. Publishers in the core ignore that error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Shorthand for emitting a [`PlaybackEvent`].
    pub fn emit_playback(&self, event: PlaybackEvent) {
        let _ = self.emit(CoreEvent::Playback(event));
    }

    /// Creates a new subscriber that sees every event emitted from now on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional filter.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaybackEvent};
///
/// let bus = EventBus::new(16);
/// let listens = EventStream::new(bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Playback(PlaybackEvent::ListenRecorded { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
