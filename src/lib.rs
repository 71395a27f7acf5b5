//! Workspace facade crate.
//!
//! Host applications depend on `playback-workspace` to get the playback
//! coordinator, the runtime plumbing (configuration, events, logging) and the
//! bridge contracts they must implement, without wiring each crate by hand.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use core_playback::{
    spawn_player, Collectible, ErrorRecord, PlaybackError, PlaybackSession, PlaybackSnapshot,
    PlaybackTuning, PlayerHandle, PlayerStatus,
};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
