//! Playback state model.
//!
//! The coordinator owns the only mutable copy of [`PlaybackSnapshot`]; every
//! other task sees clones published through a `watch` channel.

use bridge_traits::TrackId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Callback invoked once the session it was registered with plays to its end.
///
/// Hosts typically advance their queue from here.
pub type OnEnd = Arc<dyn Fn() + Send + Sync>;

/// Coarse player state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    /// Never entered by the coordinator itself; `is_buffering` carries the
    /// buffering signal.
    Buffering,
    Stopped,
    Errored,
}

impl PlayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::Idle => "idle",
            PlayerStatus::Loading => "loading",
            PlayerStatus::Playing => "playing",
            PlayerStatus::Paused => "paused",
            PlayerStatus::Buffering => "buffering",
            PlayerStatus::Stopped => "stopped",
            PlayerStatus::Errored => "errored",
        }
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-catalog media (an owned collectible) played straight from its URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collectible {
    pub id: String,
    pub name: String,
    pub media_url: String,
}

impl Collectible {
    pub fn new(id: impl Into<String>, name: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            media_url: media_url.into(),
        }
    }
}

/// What a session is playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSource {
    Track(TrackId),
    Collectible(Collectible),
}

/// One playback attempt.
#[derive(Clone)]
pub struct PlaybackSession {
    /// Queue slot being played.
    pub uid: String,
    pub epoch: u64,
    pub source: SessionSource,
    on_end: Option<OnEnd>,
}

impl PlaybackSession {
    pub(crate) fn new(uid: String, epoch: u64, source: SessionSource, on_end: Option<OnEnd>) -> Self {
        Self {
            uid,
            epoch,
            source,
            on_end,
        }
    }

    /// Catalog id of the session; `None` for collectibles.
    pub fn track_id(&self) -> Option<TrackId> {
        match &self.source {
            SessionSource::Track(id) => Some(*id),
            SessionSource::Collectible(_) => None,
        }
    }

    pub fn on_end(&self) -> Option<&OnEnd> {
        self.on_end.as_ref()
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("uid", &self.uid)
            .field("epoch", &self.epoch)
            .field("source", &self.source)
            .field("has_on_end", &self.on_end.is_some())
            .finish()
    }
}

/// User-visible error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub error: String,
    pub track_id: Option<TrackId>,
    pub info: Option<String>,
}

/// Read-only view of the player.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSnapshot {
    pub current_state: PlayerStatus,
    pub is_buffering: bool,
    pub last_error: Option<ErrorRecord>,
    /// Last position reported by the media handle.
    pub position: Duration,
    pub session: Option<PlaybackSession>,
}

impl PlaybackSnapshot {
    pub fn track_id(&self) -> Option<TrackId> {
        self.session.as_ref().and_then(PlaybackSession::track_id)
    }

    pub fn epoch(&self) -> Option<u64> {
        self.session.as_ref().map(|session| session.epoch)
    }

    pub fn uid(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.uid.as_str())
    }
}
