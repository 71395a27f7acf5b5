//! # Stream Resolution
//!
//! Decides where the audio for a catalog track comes from.
//!
//! Tracks normally play from their segmented rendition on the owner's
//! gateways. A remotely managed list of track ids opts individual tracks out
//! of that and onto a single-file stream; [`resolve_locator`] applies the list
//! and [`ForcedStreamPolicy`] loads it.
//!
//! [`StreamResolver`] strings the catalog lookups and the policy together for
//! the coordinator.

use crate::error::Result;
use crate::gateway::resolve_gateways;
use bridge_traits::{RemoteConfig, Segment, StreamLocator, TrackId, TrackRepository};
use core_async::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// URL of the single-file stream for `track_id`.
pub fn forced_stream_url(stream_endpoint: &str, track_id: TrackId) -> String {
    format!(
        "{}/v1/tracks/{}/stream",
        stream_endpoint.trim_end_matches('/'),
        track_id
    )
}

/// Picks the locator for a track.
///
/// Ids in `forced` get a [`StreamLocator::Direct`] pointing at the stream
/// endpoint whatever their segments look like. Everything else keeps its
/// segmented rendition untouched.
pub fn resolve_locator(
    track_id: TrackId,
    segments: Vec<Segment>,
    gateways: Vec<String>,
    forced: &HashSet<TrackId>,
    stream_endpoint: &str,
) -> StreamLocator {
    if forced.contains(&track_id) {
        StreamLocator::Direct {
            url: forced_stream_url(stream_endpoint, track_id),
        }
    } else {
        StreamLocator::Segmented { segments, gateways }
    }
}

/// Parses a comma-separated id list. Invalid entries are skipped.
pub fn parse_forced_ids(raw: &str) -> HashSet<TrackId> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<TrackId>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(entry, error = %e, "Skipping invalid forced-stream track id");
                None
            }
        })
        .collect()
}

/// Lazily loaded set of tracks that must stream as a single file.
///
/// The set is fetched on first use and kept for the life of the policy. A
/// failed fetch is not remembered: that call sees an empty set and the next
/// one tries again.
pub struct ForcedStreamPolicy {
    remote: Arc<dyn RemoteConfig>,
    key: String,
    ids: OnceCell<HashSet<TrackId>>,
}

impl ForcedStreamPolicy {
    pub fn new(remote: Arc<dyn RemoteConfig>, key: impl Into<String>) -> Self {
        Self {
            remote,
            key: key.into(),
            ids: OnceCell::new(),
        }
    }

    async fn load(&self) -> Option<&HashSet<TrackId>> {
        let loaded = self
            .ids
            .get_or_try_init(|| async {
                let raw = self.remote.get_remote_var(&self.key).await?;
                let ids = raw.as_deref().map(parse_forced_ids).unwrap_or_default();
                debug!(key = %self.key, count = ids.len(), "Loaded forced-stream track ids");
                Ok::<_, bridge_traits::BridgeError>(ids)
            })
            .await;

        match loaded {
            Ok(ids) => Some(ids),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Failed to load forced-stream track ids");
                None
            }
        }
    }

    /// Returns `true` if `track_id` must use the single-file stream.
    pub async fn is_forced(&self, track_id: TrackId) -> bool {
        self.load()
            .await
            .is_some_and(|ids| ids.contains(&track_id))
    }

    /// [`resolve_locator`] with the remotely managed set.
    pub async fn locate(
        &self,
        track_id: TrackId,
        segments: Vec<Segment>,
        gateways: Vec<String>,
        stream_endpoint: &str,
    ) -> StreamLocator {
        match self.load().await {
            Some(ids) => resolve_locator(track_id, segments, gateways, ids, stream_endpoint),
            None => resolve_locator(
                track_id,
                segments,
                gateways,
                &HashSet::new(),
                stream_endpoint,
            ),
        }
    }
}

/// Everything the coordinator needs to load a catalog track.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTrack {
    pub track_id: TrackId,
    pub title: String,
    pub locator: StreamLocator,
}

/// Catalog lookups plus locator selection.
pub struct StreamResolver {
    repository: Arc<dyn TrackRepository>,
    policy: ForcedStreamPolicy,
    stream_endpoint: String,
}

impl StreamResolver {
    pub fn new(
        repository: Arc<dyn TrackRepository>,
        policy: ForcedStreamPolicy,
        stream_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            policy,
            stream_endpoint: stream_endpoint.into(),
        }
    }

    /// Resolves `track_id` to a loadable locator.
    ///
    /// Returns `Ok(None)` when the catalog does not know the track. A missing
    /// owner is not fatal; the track resolves with no gateways.
    #[instrument(skip(self))]
    pub async fn resolve(&self, track_id: TrackId) -> Result<Option<ResolvedTrack>> {
        let Some(track) = self.repository.get_track(track_id).await? else {
            debug!("Track not in catalog");
            return Ok(None);
        };

        let gateways = match self.repository.get_user(track.owner_id).await? {
            Some(owner) => owner
                .endpoint_config
                .as_deref()
                .map(resolve_gateways)
                .unwrap_or_default(),
            None => {
                warn!(owner_id = track.owner_id, "Track owner not found, no gateways");
                Vec::new()
            }
        };

        let locator = self
            .policy
            .locate(track_id, track.segments, gateways, &self.stream_endpoint)
            .await;

        Ok(Some(ResolvedTrack {
            track_id,
            title: track.title,
            locator,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, OwnerMetadata, TrackMetadata};
    use mockall::mock;

    mock! {
        pub Remote {}

        #[async_trait]
        impl RemoteConfig for Remote {
            async fn get_remote_var(&self, key: &str) -> BridgeResult<Option<String>>;
        }
    }

    mock! {
        pub Catalog {}

        #[async_trait]
        impl TrackRepository for Catalog {
            async fn get_track(&self, track_id: TrackId) -> BridgeResult<Option<TrackMetadata>>;
            async fn get_user(&self, owner_id: u64) -> BridgeResult<Option<OwnerMetadata>>;
        }
    }

    const ENDPOINT: &str = "https://dn.example";

    fn segments() -> Vec<Segment> {
        vec![Segment::new("QmA", 6.0), Segment::new("QmB", 4.5)]
    }

    fn forced(ids: &[u64]) -> HashSet<TrackId> {
        ids.iter().copied().map(TrackId::new).collect()
    }

    #[test]
    fn test_forced_track_gets_direct_locator() {
        let locator = resolve_locator(
            TrackId::new(40),
            segments(),
            vec!["https://a.node".into()],
            &forced(&[12, 40]),
            ENDPOINT,
        );
        assert_eq!(
            locator,
            StreamLocator::Direct {
                url: "https://dn.example/v1/tracks/40/stream".into()
            }
        );
    }

    #[test]
    fn test_forced_track_without_segments_still_direct() {
        let locator = resolve_locator(TrackId::new(12), Vec::new(), Vec::new(), &forced(&[12]), ENDPOINT);
        assert!(matches!(locator, StreamLocator::Direct { .. }));
    }

    #[test]
    fn test_other_track_keeps_segments() {
        let gateways = vec!["https://a.node".to_string()];
        let locator = resolve_locator(
            TrackId::new(7),
            segments(),
            gateways.clone(),
            &forced(&[12]),
            ENDPOINT,
        );
        assert_eq!(
            locator,
            StreamLocator::Segmented {
                segments: segments(),
                gateways
            }
        );
    }

    #[test]
    fn test_stream_url_tolerates_trailing_slash() {
        assert_eq!(
            forced_stream_url("https://dn.example/", TrackId::new(5)),
            "https://dn.example/v1/tracks/5/stream"
        );
    }

    #[test]
    fn test_parse_forced_ids_skips_garbage() {
        assert_eq!(parse_forced_ids(" 12, abc,,40 ,-3"), forced(&[12, 40]));
        assert!(parse_forced_ids("").is_empty());
    }

    #[tokio::test]
    async fn test_policy_fetches_once() {
        let mut remote = MockRemote::new();
        remote
            .expect_get_remote_var()
            .withf(|key| key == "FORCE_MP3_STREAM_TRACK_IDS")
            .times(1)
            .returning(|_| Ok(Some("12,40".to_string())));

        let policy = ForcedStreamPolicy::new(Arc::new(remote), "FORCE_MP3_STREAM_TRACK_IDS");
        assert!(policy.is_forced(TrackId::new(12)).await);
        assert!(!policy.is_forced(TrackId::new(13)).await);
        assert!(policy.is_forced(TrackId::new(40)).await);
    }

    #[tokio::test]
    async fn test_policy_missing_variable_is_empty_and_memoised() {
        let mut remote = MockRemote::new();
        remote.expect_get_remote_var().times(1).returning(|_| Ok(None));

        let policy = ForcedStreamPolicy::new(Arc::new(remote), "KEY");
        assert!(!policy.is_forced(TrackId::new(1)).await);
        assert!(!policy.is_forced(TrackId::new(2)).await);
    }

    #[tokio::test]
    async fn test_policy_retries_after_failed_fetch() {
        let mut remote = MockRemote::new();
        let mut seq = mockall::Sequence::new();
        remote
            .expect_get_remote_var()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(BridgeError::NotAvailable("offline".into())));
        remote
            .expect_get_remote_var()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some("9".to_string())));

        let policy = ForcedStreamPolicy::new(Arc::new(remote), "KEY");
        let first = policy
            .locate(TrackId::new(9), segments(), Vec::new(), ENDPOINT)
            .await;
        assert!(matches!(first, StreamLocator::Segmented { .. }));

        let second = policy
            .locate(TrackId::new(9), segments(), Vec::new(), ENDPOINT)
            .await;
        assert!(matches!(second, StreamLocator::Direct { .. }));
    }

    fn track(id: u64, owner_id: u64) -> TrackMetadata {
        TrackMetadata {
            track_id: TrackId::new(id),
            owner_id,
            title: format!("Track {id}"),
            segments: segments(),
        }
    }

    fn empty_policy() -> ForcedStreamPolicy {
        let mut remote = MockRemote::new();
        remote.expect_get_remote_var().returning(|_| Ok(None));
        ForcedStreamPolicy::new(Arc::new(remote), "KEY")
    }

    #[tokio::test]
    async fn test_resolver_builds_gateways_from_owner() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_track()
            .returning(|id| Ok(Some(track(id.get(), 77))));
        catalog.expect_get_user().withf(|id| *id == 77).returning(|id| {
            Ok(Some(OwnerMetadata {
                user_id: id,
                handle: "artist".into(),
                endpoint_config: Some("https://a.node/,https://b.node".into()),
            }))
        });

        let resolver = StreamResolver::new(Arc::new(catalog), empty_policy(), ENDPOINT);
        let resolved = resolver.resolve(TrackId::new(3)).await.unwrap().unwrap();

        assert_eq!(resolved.title, "Track 3");
        assert_eq!(
            resolved.locator,
            StreamLocator::Segmented {
                segments: segments(),
                gateways: vec!["https://a.node".into(), "https://b.node".into()],
            }
        );
    }

    #[tokio::test]
    async fn test_resolver_unknown_track() {
        let mut catalog = MockCatalog::new();
        catalog.expect_get_track().returning(|_| Ok(None));
        catalog.expect_get_user().never();

        let resolver = StreamResolver::new(Arc::new(catalog), empty_policy(), ENDPOINT);
        assert!(resolver.resolve(TrackId::new(3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolver_missing_owner_has_no_gateways() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_track()
            .returning(|id| Ok(Some(track(id.get(), 5))));
        catalog.expect_get_user().returning(|_| Ok(None));

        let resolver = StreamResolver::new(Arc::new(catalog), empty_policy(), ENDPOINT);
        let resolved = resolver.resolve(TrackId::new(3)).await.unwrap().unwrap();
        assert_eq!(
            resolved.locator,
            StreamLocator::Segmented {
                segments: segments(),
                gateways: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn test_resolver_propagates_catalog_failure() {
        let mut catalog = MockCatalog::new();
        catalog
            .expect_get_track()
            .returning(|_| Err(BridgeError::OperationFailed("timeout".into())));

        let resolver = StreamResolver::new(Arc::new(catalog), empty_policy(), ENDPOINT);
        assert!(resolver.resolve(TrackId::new(3)).await.is_err());
    }
}
