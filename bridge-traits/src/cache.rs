//! Cache pinning contract.
//!
//! Host caches evict entities nobody is looking at. While a track is the
//! active playback target the player holds a subscription on it so the cached
//! entry survives until playback moves on.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Subscriber id the player uses for every pin it holds.
pub const PLAYER_SUBSCRIBER_ID: &str = "player";

/// Kind of cached entity being pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Track,
}

/// A single pin: `subscriber_id` keeps entity `id` alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub subscriber_id: String,
    pub id: u64,
}

impl Subscription {
    /// Pin held by the player.
    pub fn player(id: u64) -> Self {
        Self {
            subscriber_id: PLAYER_SUBSCRIBER_ID.to_string(),
            id,
        }
    }
}

/// Subscription service of the host cache.
#[async_trait::async_trait]
pub trait CacheSubscriptions: Send + Sync {
    async fn subscribe(&self, kind: CacheKind, subscriptions: &[Subscription]) -> Result<()>;

    async fn unsubscribe(&self, kind: CacheKind, subscriptions: &[Subscription]) -> Result<()>;
}
