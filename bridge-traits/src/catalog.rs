//! Track catalog contract.
//!
//! The playback core never talks to a catalog backend directly. Hosts hand it a
//! [`TrackRepository`] that answers "what is track N and who owns it", which is
//! all the coordinator needs to work out where the audio lives.

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog identifier of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(u64);

impl TrackId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TrackId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TrackId {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|e| BridgeError::OperationFailed(format!("invalid track id {s:?}: {e}")))
    }
}

/// One piece of a segmented (adaptive) track rendition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Content address of the segment on the owner's gateways.
    pub multihash: String,
    /// Segment length in seconds.
    pub duration: f64,
}

impl Segment {
    pub fn new(multihash: impl Into<String>, duration: f64) -> Self {
        Self {
            multihash: multihash.into(),
            duration,
        }
    }
}

/// Catalog metadata for a playable track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub track_id: TrackId,
    /// Owning user; used to look up the content gateways.
    pub owner_id: u64,
    pub title: String,
    /// Segment list of the adaptive rendition, in playback order.
    pub segments: Vec<Segment>,
}

/// Metadata about the user that owns a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMetadata {
    pub user_id: u64,
    pub handle: String,
    /// Comma-separated list of the content nodes serving this user's files.
    pub endpoint_config: Option<String>,
}

/// Read access to the track catalog.
///
/// Both lookups return `Ok(None)` for unknown ids. Errors are reserved for
/// transport or backend failures.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{TrackId, TrackRepository};
///
/// async fn title_of(repo: &dyn TrackRepository, id: TrackId) -> Option<String> {
///     repo.get_track(id).await.ok().flatten().map(|track| track.title)
/// }
/// ```
#[async_trait::async_trait]
pub trait TrackRepository: Send + Sync {
    /// Fetch a track by id.
    async fn get_track(&self, id: TrackId) -> Result<Option<TrackMetadata>>;

    /// Fetch the owner of a track.
    async fn get_user(&self, owner_id: u64) -> Result<Option<OwnerMetadata>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_id_parses_and_displays() {
        let id: TrackId = " 42 ".parse().unwrap();
        assert_eq!(id, TrackId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("forty-two".parse::<TrackId>().is_err());
    }

    #[test]
    fn track_id_serializes_transparently() {
        let json = serde_json::to_string(&TrackId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
