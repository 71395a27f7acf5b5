//! # Playback Tuning
//!
//! Knobs for the listen recorder and stream resolution.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning values for a player instance.
///
/// Every field has a serde default, so hosts can deserialize a partial
/// document and only override what they care about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackTuning {
    /// How often the listen recorder samples the playback position.
    ///
    /// Default: 1 second.
    #[serde(default = "default_listen_poll_interval")]
    pub listen_poll_interval: Duration,

    /// Position a session must pass before it counts as a listen.
    ///
    /// Default: 1 second.
    #[serde(default = "default_listen_threshold")]
    pub listen_threshold: Duration,

    /// Remote variable holding the comma-separated ids of tracks that must be
    /// streamed as a single file.
    #[serde(default = "default_forced_stream_key")]
    pub forced_stream_key: String,

    /// Base URL of the single-file stream endpoint.
    #[serde(default = "default_stream_endpoint")]
    pub stream_endpoint: String,
}

impl Default for PlaybackTuning {
    fn default() -> Self {
        Self {
            listen_poll_interval: default_listen_poll_interval(),
            listen_threshold: default_listen_threshold(),
            forced_stream_key: default_forced_stream_key(),
            stream_endpoint: default_stream_endpoint(),
        }
    }
}

impl PlaybackTuning {
    pub fn with_listen_poll_interval(mut self, interval: Duration) -> Self {
        self.listen_poll_interval = interval;
        self
    }

    pub fn with_listen_threshold(mut self, threshold: Duration) -> Self {
        self.listen_threshold = threshold;
        self
    }

    pub fn with_stream_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.stream_endpoint = endpoint.into();
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.listen_poll_interval.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "listen_poll_interval must be > 0".to_string(),
            ));
        }

        if self.forced_stream_key.trim().is_empty() {
            return Err(PlaybackError::InvalidConfig(
                "forced_stream_key must not be empty".to_string(),
            ));
        }

        let endpoint = self.stream_endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(PlaybackError::InvalidConfig(format!(
                "stream_endpoint must be an http(s) URL, got {:?}",
                self.stream_endpoint
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_listen_poll_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_listen_threshold() -> Duration {
    Duration::from_secs(1)
}

fn default_forced_stream_key() -> String {
    "FORCE_MP3_STREAM_TRACK_IDS".to_string()
}

fn default_stream_endpoint() -> String {
    "https://discoveryprovider.audius.co".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tuning = PlaybackTuning::default();
        assert_eq!(tuning.listen_poll_interval, Duration::from_millis(1000));
        assert_eq!(tuning.listen_threshold, Duration::from_secs(1));
        assert_eq!(tuning.forced_stream_key, "FORCE_MP3_STREAM_TRACK_IDS");
        assert!(tuning.validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let tuning: PlaybackTuning =
            serde_json::from_str(r#"{"stream_endpoint":"https://dn.example"}"#).unwrap();
        assert_eq!(tuning.stream_endpoint, "https://dn.example");
        assert_eq!(tuning.listen_threshold, Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let tuning = PlaybackTuning::default().with_listen_poll_interval(Duration::ZERO);
        assert!(matches!(
            tuning.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_http_endpoint() {
        let tuning = PlaybackTuning::default().with_stream_endpoint("ftp://nope");
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_key() {
        let tuning = PlaybackTuning {
            forced_stream_key: "  ".into(),
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }
}
