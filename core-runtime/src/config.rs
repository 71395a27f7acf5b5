//! # Core Configuration Module
//!
//! Collects the host bridges and runtime settings the playback core needs.
//!
//! ## Overview
//!
//! `CoreConfig` is built through [`CoreConfigBuilder`], which fails fast when a
//! required bridge is missing so hosts learn about wiring mistakes at startup
//! rather than on the first `play`.
//!
//! ## Required Dependencies
//!
//! - `TrackRepository` - track and owner lookup
//! - `CacheSubscriptions` - pins the playing track in the host cache
//! - `RemoteConfig` - source of the forced-stream track list
//!
//! ## Optional Dependencies
//!
//! - `ListenReporter` - destination for counted listens (events only if absent)
//! - `Clock` - defaults to `SystemClock`
//!
//! The `MediaHandle` is not part of the configuration: hosts attach it to the
//! running player once their audio stack is ready.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .track_repository(Arc::new(MyCatalog))
//!     .cache_subscriptions(Arc::new(MyCache))
//!     .remote_config(Arc::new(MyRemoteConfig))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Panics with an actionable message naming the missing bridge.
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    CacheSubscriptions, Clock, ListenReporter, RemoteConfig, SystemClock, TrackRepository,
};
use std::sync::Arc;

/// Upper bound on the event bus buffer.
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;

/// Bridges and runtime settings for the playback core.
#[derive(Clone)]
pub struct CoreConfig {
    /// Track and owner lookup (required)
    pub track_repository: Arc<dyn TrackRepository>,

    /// Cache pinning service (required)
    pub cache_subscriptions: Arc<dyn CacheSubscriptions>,

    /// Remote configuration variables (required)
    pub remote_config: Arc<dyn RemoteConfig>,

    /// Listen destination (optional)
    pub listen_reporter: Option<Arc<dyn ListenReporter>>,

    /// Time source for listen timestamps
    pub clock: Arc<dyn Clock>,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("track_repository", &"TrackRepository { ... }")
            .field("cache_subscriptions", &"CacheSubscriptions { ... }")
            .field("remote_config", &"RemoteConfig { ... }")
            .field(
                "listen_reporter",
                &self
                    .listen_reporter
                    .as_ref()
                    .map(|_| "ListenReporter { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates settings that the builder cannot check by construction.
    pub fn validate(&self) -> Result<()> {
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "event_buffer_size must not exceed {MAX_EVENT_BUFFER_SIZE}"
            )));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    track_repository: Option<Arc<dyn TrackRepository>>,
    cache_subscriptions: Option<Arc<dyn CacheSubscriptions>>,
    remote_config: Option<Arc<dyn RemoteConfig>>,
    listen_reporter: Option<Arc<dyn ListenReporter>>,
    clock: Option<Arc<dyn Clock>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the track repository (required).
    pub fn track_repository(mut self, repository: Arc<dyn TrackRepository>) -> Self {
        self.track_repository = Some(repository);
        self
    }

    /// Sets the cache subscription service (required).
    pub fn cache_subscriptions(mut self, cache: Arc<dyn CacheSubscriptions>) -> Self {
        self.cache_subscriptions = Some(cache);
        self
    }

    /// Sets the remote configuration source (required).
    pub fn remote_config(mut self, remote: Arc<dyn RemoteConfig>) -> Self {
        self.remote_config = Some(remote);
        self
    }

    /// Sets the listen reporter.
    pub fn listen_reporter(mut self, reporter: Arc<dyn ListenReporter>) -> Self {
        self.listen_reporter = Some(reporter);
        self
    }

    /// Overrides the clock used for listen timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the event bus buffer size (default: 100).
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::CapabilityMissing` for a missing required bridge and
    /// `Error::Config` for invalid settings.
    pub fn build(self) -> Result<CoreConfig> {
        let track_repository = self.track_repository.ok_or_else(|| {
            capability_missing(
                "TrackRepository",
                "No track repository provided. Inject the host catalog client with \
                 CoreConfig::builder().track_repository(...).",
            )
        })?;

        let cache_subscriptions = self.cache_subscriptions.ok_or_else(|| {
            capability_missing(
                "CacheSubscriptions",
                "No cache subscription service provided. The player pins the active \
                 track through it; pass a no-op implementation if the host has no cache.",
            )
        })?;

        let remote_config = self.remote_config.ok_or_else(|| {
            capability_missing(
                "RemoteConfig",
                "No remote configuration source provided. It supplies the forced-stream \
                 track list; return Ok(None) from get_remote_var to disable it.",
            )
        })?;

        let config = CoreConfig {
            track_repository,
            cache_subscriptions,
            remote_config,
            listen_reporter: self.listen_reporter,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        CacheKind, ListenRecord, OwnerMetadata, Subscription, TrackId, TrackMetadata,
    };

    struct NullCatalog;

    #[async_trait]
    impl TrackRepository for NullCatalog {
        async fn get_track(&self, _id: TrackId) -> BridgeResult<Option<TrackMetadata>> {
            Ok(None)
        }

        async fn get_user(&self, _owner_id: u64) -> BridgeResult<Option<OwnerMetadata>> {
            Ok(None)
        }
    }

    struct NullCache;

    #[async_trait]
    impl CacheSubscriptions for NullCache {
        async fn subscribe(&self, _kind: CacheKind, _subs: &[Subscription]) -> BridgeResult<()> {
            Ok(())
        }

        async fn unsubscribe(&self, _kind: CacheKind, _subs: &[Subscription]) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct NullRemote;

    #[async_trait]
    impl RemoteConfig for NullRemote {
        async fn get_remote_var(&self, _key: &str) -> BridgeResult<Option<String>> {
            Ok(None)
        }
    }

    struct NullReporter;

    #[async_trait]
    impl ListenReporter for NullReporter {
        async fn record_listen(&self, _record: ListenRecord) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn complete_builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .track_repository(Arc::new(NullCatalog))
            .cache_subscriptions(Arc::new(NullCache))
            .remote_config(Arc::new(NullRemote))
    }

    fn missing_capability(result: Result<CoreConfig>) -> String {
        match result {
            Err(Error::CapabilityMissing { capability, .. }) => capability,
            other => panic!("expected CapabilityMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_builder_with_required_bridges() {
        let config = complete_builder().build().unwrap();
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert!(config.listen_reporter.is_none());
    }

    #[test]
    fn test_builder_requires_track_repository() {
        let result = CoreConfig::builder()
            .cache_subscriptions(Arc::new(NullCache))
            .remote_config(Arc::new(NullRemote))
            .build();
        assert_eq!(missing_capability(result), "TrackRepository");
    }

    #[test]
    fn test_builder_requires_cache_subscriptions() {
        let result = CoreConfig::builder()
            .track_repository(Arc::new(NullCatalog))
            .remote_config(Arc::new(NullRemote))
            .build();
        assert_eq!(missing_capability(result), "CacheSubscriptions");
    }

    #[test]
    fn test_builder_requires_remote_config() {
        let result = CoreConfig::builder()
            .track_repository(Arc::new(NullCatalog))
            .cache_subscriptions(Arc::new(NullCache))
            .build();
        assert_eq!(missing_capability(result), "RemoteConfig");
    }

    #[test]
    fn test_optional_bridges_and_buffer_size() {
        let config = complete_builder()
            .listen_reporter(Arc::new(NullReporter))
            .event_buffer_size(32)
            .build()
            .unwrap();
        assert!(config.listen_reporter.is_some());
        assert_eq!(config.event_buffer_size, 32);
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let result = complete_builder().event_buffer_size(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_excessive_buffer() {
        let result = complete_builder()
            .event_buffer_size(MAX_EVENT_BUFFER_SIZE + 1)
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_bridges() {
        let config = complete_builder().build().unwrap();
        let rendered = format!("{config:?}");
        assert!(rendered.contains("TrackRepository { ... }"));
        assert!(rendered.contains("event_buffer_size: 100"));
    }
}
