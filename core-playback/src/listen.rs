//! # Listen Recorder
//!
//! Counts a listen once a session has played past a threshold.
//!
//! The decision itself lives in [`ListenTracker`], which is pure and
//! remembers the last epoch it counted. [`ListenRecorder`] is the task that
//! feeds it: it samples the player on an interval and reports each counted
//! listen to the event bus and, when the host provides one, the
//! `ListenReporter`.

use crate::config::PlaybackTuning;
use crate::error::Result;
use crate::player::PlayerHandle;
use bridge_traits::{Clock, ListenRecord, ListenReporter, TrackId};
use core_async::select;
use core_async::sync::CancellationToken;
use core_async::task::{self, JoinHandle};
use core_async::time::{interval, MissedTickBehavior};
use core_runtime::events::{EventBus, PlaybackEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// At-most-once-per-epoch listen counter.
#[derive(Debug, Clone)]
pub struct ListenTracker {
    threshold: Duration,
    last_recorded_epoch: Option<u64>,
}

impl ListenTracker {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            last_recorded_epoch: None,
        }
    }

    /// Returns `true` if `epoch` has already been counted.
    pub fn is_recorded(&self, epoch: u64) -> bool {
        self.last_recorded_epoch == Some(epoch)
    }

    /// Feeds one sample. Returns the listen to record, if this sample is the
    /// one that crosses the threshold for a not yet counted epoch.
    pub fn observe(
        &mut self,
        track_id: Option<TrackId>,
        epoch: Option<u64>,
        position: Duration,
    ) -> Option<(TrackId, u64)> {
        let (track_id, epoch) = (track_id?, epoch?);
        if self.is_recorded(epoch) || position <= self.threshold {
            return None;
        }

        self.last_recorded_epoch = Some(epoch);
        Some((track_id, epoch))
    }
}

pub(crate) struct ListenRecorder {
    player: PlayerHandle,
    tracker: ListenTracker,
    poll_interval: Duration,
    reporter: Option<Arc<dyn ListenReporter>>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl ListenRecorder {
    pub(crate) fn new(
        player: PlayerHandle,
        tuning: &PlaybackTuning,
        reporter: Option<Arc<dyn ListenReporter>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let events = player.event_bus();
        Self {
            player,
            tracker: ListenTracker::new(tuning.listen_threshold),
            poll_interval: tuning.listen_poll_interval,
            reporter,
            clock,
            events,
        }
    }

    pub(crate) fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        task::spawn_guarded(self.run(shutdown), |message| {
            error!(%message, "Listen recorder panicked");
        })
    }

    async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if self.poll().await.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Listen recorder stopped");
    }

    async fn poll(&mut self) -> Result<()> {
        let snapshot = self.player.snapshot();
        let (Some(track_id), Some(epoch)) = (snapshot.track_id(), snapshot.epoch()) else {
            return Ok(());
        };
        if self.tracker.is_recorded(epoch) {
            return Ok(());
        }

        let position = self.player.position().await?;
        // The session may have moved on while the position was in flight.
        if self.player.snapshot().epoch() != Some(epoch) {
            return Ok(());
        }

        if let Some((track_id, epoch)) = self.tracker.observe(Some(track_id), Some(epoch), position)
        {
            self.record(track_id, epoch).await;
        }
        Ok(())
    }

    async fn record(&self, track_id: TrackId, epoch: u64) {
        info!(%track_id, epoch, "Listen recorded");
        self.events.emit_playback(PlaybackEvent::ListenRecorded {
            track_id: track_id.get(),
            epoch,
        });

        let Some(reporter) = &self.reporter else {
            return;
        };
        let record = ListenRecord {
            track_id,
            epoch,
            recorded_at: self.clock.now(),
        };
        if let Err(e) = reporter.record_listen(record).await {
            warn!(%track_id, epoch, error = %e, "Failed to report listen");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(1);

    #[test]
    fn test_records_once_per_epoch() {
        let mut tracker = ListenTracker::new(THRESHOLD);
        let track = Some(TrackId::new(8));

        assert_eq!(tracker.observe(track, Some(1), Duration::from_millis(500)), None);
        assert_eq!(
            tracker.observe(track, Some(1), Duration::from_millis(1500)),
            Some((TrackId::new(8), 1))
        );
        for secs in 2..10 {
            assert_eq!(tracker.observe(track, Some(1), Duration::from_secs(secs)), None);
        }
        assert!(tracker.is_recorded(1));
    }

    #[test]
    fn test_new_epoch_allows_one_more() {
        let mut tracker = ListenTracker::new(THRESHOLD);
        let track = Some(TrackId::new(8));

        assert!(tracker.observe(track, Some(1), Duration::from_secs(2)).is_some());
        assert_eq!(
            tracker.observe(track, Some(2), Duration::from_secs(2)),
            Some((TrackId::new(8), 2))
        );
        assert!(tracker.observe(track, Some(2), Duration::from_secs(3)).is_none());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let mut tracker = ListenTracker::new(THRESHOLD);
        assert!(tracker
            .observe(Some(TrackId::new(1)), Some(1), THRESHOLD)
            .is_none());
        assert!(!tracker.is_recorded(1));
    }

    #[test]
    fn test_requires_track_and_epoch() {
        let mut tracker = ListenTracker::new(THRESHOLD);
        assert!(tracker.observe(None, Some(1), Duration::from_secs(5)).is_none());
        assert!(tracker
            .observe(Some(TrackId::new(1)), None, Duration::from_secs(5))
            .is_none());
        assert!(!tracker.is_recorded(1));
    }
}
