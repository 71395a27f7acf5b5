//! Remote configuration and listen reporting contracts.

use crate::catalog::TrackId;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remotely managed string variables (feature switches, deny lists).
#[async_trait::async_trait]
pub trait RemoteConfig: Send + Sync {
    /// Value of `key`, or `None` when the variable is not set.
    async fn get_remote_var(&self, key: &str) -> Result<Option<String>>;
}

/// One counted listen of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenRecord {
    pub track_id: TrackId,
    /// Play epoch the listen belongs to. At most one record exists per epoch.
    pub epoch: u64,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for listen records (analytics, play counts).
#[async_trait::async_trait]
pub trait ListenReporter: Send + Sync {
    async fn record_listen(&self, record: ListenRecord) -> Result<()>;
}
