//! # Playback Error Types
//!
//! Errors surfaced by the playback coordinator and its helpers.
//!
//! Everything that reaches the user is flattened into a single
//! [`ErrorRecord`](crate::state::ErrorRecord) through [`PlaybackError::to_record`].

use crate::state::ErrorRecord;
use bridge_traits::{BridgeError, MediaFailure, TrackId};
use thiserror::Error;

/// Errors that can occur during playback coordination.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The catalog has no track with this id. Plays of unknown tracks are
    /// declined without touching state.
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    // ========================================================================
    // Media Errors
    // ========================================================================
    /// The native media primitive reported a failure.
    #[error("Media error: {0}")]
    Media(MediaFailure),

    /// One of the bridge observers panicked.
    #[error("Event bridge failure in {observer} observer: {message}")]
    BridgeFailure {
        observer: &'static str,
        message: String,
    },

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// A host bridge call failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The control loop is gone; the player was shut down.
    #[error("Playback coordinator is not running")]
    CoordinatorClosed,

    /// Tuning values failed validation.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` for the "resource unavailable" class of failures, which
    /// are declined silently instead of entering `Errored`.
    pub fn is_resource_unavailable(&self) -> bool {
        matches!(self, PlaybackError::TrackNotFound(_))
    }

    /// Diagnostics attached to the failure, if the source provided any.
    pub fn info(&self) -> Option<String> {
        match self {
            PlaybackError::Media(failure) => failure.diagnostics.clone(),
            _ => None,
        }
    }

    /// Flattens the error into the user-visible record.
    pub fn to_record(&self, track_id: Option<TrackId>) -> ErrorRecord {
        ErrorRecord {
            error: self.to_string(),
            track_id,
            info: self.info(),
        }
    }
}

impl From<MediaFailure> for PlaybackError {
    fn from(failure: MediaFailure) -> Self {
        PlaybackError::Media(failure)
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::MediaFailureKind;

    #[test]
    fn test_resource_unavailable_classification() {
        assert!(PlaybackError::TrackNotFound(TrackId::new(7)).is_resource_unavailable());
        assert!(!PlaybackError::CoordinatorClosed.is_resource_unavailable());
        assert!(!PlaybackError::Bridge(BridgeError::NotAvailable("catalog".into()))
            .is_resource_unavailable());
    }

    #[test]
    fn test_media_error_record_carries_diagnostics() {
        let failure = MediaFailure::new(MediaFailureKind::Network, "segment fetch failed")
            .with_diagnostics("status=503");
        let record = PlaybackError::from(failure).to_record(Some(TrackId::new(12)));

        assert_eq!(record.track_id, Some(TrackId::new(12)));
        assert_eq!(record.info.as_deref(), Some("status=503"));
        assert!(record.error.contains("segment fetch failed"));
    }

    #[test]
    fn test_bridge_failure_message_names_observer() {
        let error = PlaybackError::BridgeFailure {
            observer: "buffering",
            message: "boom".into(),
        };
        let record = error.to_record(None);
        assert_eq!(
            record.error,
            "Event bridge failure in buffering observer: boom"
        );
        assert!(record.info.is_none());
    }
}
