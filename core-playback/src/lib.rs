//! # Playback Coordination
//!
//! Drives a host-provided media primitive from a single serial control loop.
//!
//! ## Overview
//!
//! This crate handles:
//! - Track resolution: catalog lookup, owner gateways, forced single-file streams
//! - Session management: one current session, superseded by epoch
//! - Native event bridging: media callbacks become ordered control messages
//! - Listen counting: at most one listen per session
//!
//! Audio decoding and output are the host's business; the crate only talks to
//! them through [`bridge_traits::MediaHandle`].
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{spawn_player, PlaybackTuning};
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .track_repository(catalog)
//!     .cache_subscriptions(cache)
//!     .remote_config(remote)
//!     .build()?;
//!
//! let player = spawn_player(&config, PlaybackTuning::default())?;
//! player.attach_media(media);
//! player.play("slot-1", TrackId::new(42), None)?;
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod listen;
pub mod locator;
pub mod player;
pub mod state;

mod bridge;
mod coordinator;

pub use config::PlaybackTuning;
pub use coordinator::PlayerCommand;
pub use error::{PlaybackError, Result};
pub use gateway::resolve_gateways;
pub use listen::ListenTracker;
pub use locator::{resolve_locator, ForcedStreamPolicy, ResolvedTrack, StreamResolver};
pub use player::{spawn_player, PlayerHandle};
pub use state::{
    Collectible, ErrorRecord, OnEnd, PlaybackSession, PlaybackSnapshot, PlayerStatus,
    SessionSource,
};
