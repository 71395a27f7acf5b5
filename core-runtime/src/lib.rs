//! # Core Runtime Module
//!
//! Runtime infrastructure shared by the playback core:
//! - Logging and tracing setup
//! - Configuration and bridge injection
//! - Event bus for broadcasting playback events
//!
//! Nothing in here knows how playback works; `core-playback` builds on top of
//! these pieces and hosts consume them to wire the core into their app.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
