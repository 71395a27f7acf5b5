//! Native media primitive contract.
//!
//! A [`MediaHandle`] wraps whatever the host uses to actually make sound (an
//! `AVPlayer`, an `<audio>` element, a cpal pipeline). The playback core owns
//! exactly one handle and drives it through this trait; the handle reports
//! back through the [`MediaEventSink`] it receives with every `load`.
//!
//! Notifications are fire-and-forget callbacks. Hosts may call the sink from
//! any thread, including OS media-key handlers, and must not block on it.

use crate::catalog::{Segment, TrackId};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Where the audio for a session comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamLocator {
    /// Adaptive rendition: ordered segments served by any of `gateways`.
    Segmented {
        segments: Vec<Segment>,
        gateways: Vec<String>,
    },
    /// A single file reachable at `url`.
    Direct { url: String },
}

impl StreamLocator {
    /// Segment list handed to the media primitive. Empty for direct locators.
    pub fn segments(&self) -> &[Segment] {
        match self {
            StreamLocator::Segmented { segments, .. } => segments,
            StreamLocator::Direct { .. } => &[],
        }
    }

    /// URL that overrides segment playback, if any.
    pub fn override_url(&self) -> Option<&str> {
        match self {
            StreamLocator::Direct { url } => Some(url),
            StreamLocator::Segmented { .. } => None,
        }
    }
}

/// Everything a handle needs to start a new session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    /// Play epoch of the session being loaded.
    pub epoch: u64,
    /// Queue slot being played.
    pub uid: String,
    /// `None` for collectibles and other non-catalog media.
    pub track_id: Option<TrackId>,
    pub title: Option<String>,
    pub locator: StreamLocator,
}

/// Broad classification of a media failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFailureKind {
    Network,
    Decode,
    Unsupported,
    Other,
}

/// Failure reported by the native primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFailure {
    pub kind: MediaFailureKind,
    pub message: String,
    /// Free-form diagnostics (player codes, HTTP status, buffered ranges...).
    pub diagnostics: Option<String>,
}

impl MediaFailure {
    pub fn new(kind: MediaFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = Some(diagnostics.into());
        self
    }
}

impl fmt::Display for MediaFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} media failure: {}", self.kind, self.message)
    }
}

/// Callback-level notification emitted by a media handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaNotification {
    BufferingChanged(bool),
    Error(MediaFailure),
    /// The primitive started playing, whoever asked for it.
    Played,
    /// The primitive paused. `at_end` is set when the pause is the natural
    /// stop at end of stream.
    Paused { at_end: bool },
    /// The loaded media finished.
    Ended,
}

type Listener = Arc<dyn Fn(MediaNotification) + Send + Sync>;

/// Callback target a handle reports to for the session it was loaded with.
///
/// Cheap to clone; every clone reports to the same listener.
#[derive(Clone)]
pub struct MediaEventSink {
    listener: Listener,
}

impl MediaEventSink {
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(MediaNotification) + Send + Sync + 'static,
    {
        Self {
            listener: Arc::new(listener),
        }
    }

    /// A sink that drops everything. Useful for hosts probing a handle
    /// outside of a session.
    pub fn detached() -> Self {
        Self::new(|_| {})
    }

    pub fn notify(&self, notification: MediaNotification) {
        (self.listener)(notification);
    }

    pub fn buffering(&self, buffering: bool) {
        self.notify(MediaNotification::BufferingChanged(buffering));
    }

    pub fn error(&self, failure: MediaFailure) {
        self.notify(MediaNotification::Error(failure));
    }

    pub fn played(&self) {
        self.notify(MediaNotification::Played);
    }

    pub fn paused(&self, at_end: bool) {
        self.notify(MediaNotification::Paused { at_end });
    }

    pub fn ended(&self) {
        self.notify(MediaNotification::Ended);
    }
}

impl fmt::Debug for MediaEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaEventSink").finish_non_exhaustive()
    }
}

/// Host-implemented native playback primitive.
///
/// `load` replaces whatever was loaded before; after it returns, the handle
/// must report only to the new `sink`. Control calls on an empty handle
/// should succeed as no-ops.
#[async_trait::async_trait]
pub trait MediaHandle: Send + Sync {
    /// Load a new source. Does not start playback.
    async fn load(&self, request: LoadRequest, sink: MediaEventSink) -> Result<()>;

    /// Start or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause without releasing the source.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Stop playback and release the loaded source.
    async fn stop(&self) -> Result<()>;

    /// Current playback position.
    async fn position(&self) -> Result<Duration>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn direct_locator_has_no_segments() {
        let locator = StreamLocator::Direct {
            url: "https://example.com/a.mp3".into(),
        };
        assert!(locator.segments().is_empty());
        assert_eq!(locator.override_url(), Some("https://example.com/a.mp3"));
    }

    #[test]
    fn segmented_locator_exposes_segments() {
        let locator = StreamLocator::Segmented {
            segments: vec![Segment::new("Qm1", 6.0)],
            gateways: vec!["https://node.one".into()],
        };
        assert_eq!(locator.segments().len(), 1);
        assert_eq!(locator.override_url(), None);
    }

    #[test]
    fn sink_forwards_to_listener() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let store = Arc::clone(&seen);
        let sink = MediaEventSink::new(move |n| store.lock().unwrap().push(n));

        sink.buffering(true);
        sink.clone().paused(false);
        sink.ended();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                MediaNotification::BufferingChanged(true),
                MediaNotification::Paused { at_end: false },
                MediaNotification::Ended,
            ]
        );
    }

    #[test]
    fn locator_serializes_with_kind_tag() {
        let json = serde_json::to_value(StreamLocator::Direct {
            url: "u".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "direct");
    }
}
