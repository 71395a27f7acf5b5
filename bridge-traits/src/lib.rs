//! # Host Bridge Traits
//!
//! Contracts between the playback core and the host application.
//!
//! ## Overview
//!
//! The core coordinates playback but owns none of the pieces that differ per
//! platform: the audio primitive, the catalog, the cache, remote config. Each
//! of those is a trait here, implemented once per host (desktop, mobile, web)
//! and injected through `core_runtime::config::CoreConfig`.
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaHandle`](media::MediaHandle) - Native playable resource (load/play/pause/seek/stop)
//! - [`MediaEventSink`](media::MediaEventSink) - Callback target the handle reports into
//!
//! ### Catalog & Cache
//! - [`TrackRepository`](catalog::TrackRepository) - Track and owner lookup
//! - [`CacheSubscriptions`](cache::CacheSubscriptions) - Pin entities against eviction
//!
//! ### Remote Services
//! - [`RemoteConfig`](remote::RemoteConfig) - Remotely managed string variables
//! - [`ListenReporter`](remote::ListenReporter) - Destination for counted listens
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Every bridge returns [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors into it with enough context to act on.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the core shares them across tasks
//! behind `Arc`.
//!
//! ## Example
//!
//! ```ignore
//! use bridge_traits::remote::RemoteConfig;
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//!
//! struct StaticConfig;
//!
//! #[async_trait]
//! impl RemoteConfig for StaticConfig {
//!     async fn get_remote_var(&self, key: &str) -> Result<Option<String>> {
//!         Ok((key == "FORCE_MP3_STREAM_TRACK_IDS").then(|| "12,40".to_string()))
//!     }
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod error;
pub mod media;
pub mod remote;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cache::{CacheKind, CacheSubscriptions, Subscription, PLAYER_SUBSCRIBER_ID};
pub use catalog::{OwnerMetadata, Segment, TrackId, TrackMetadata, TrackRepository};
pub use media::{
    LoadRequest, MediaEventSink, MediaFailure, MediaFailureKind, MediaHandle, MediaNotification,
    StreamLocator,
};
pub use remote::{ListenRecord, ListenReporter, RemoteConfig};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
