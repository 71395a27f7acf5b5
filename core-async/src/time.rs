//! Time-related abstractions backed by `tokio::time`.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{interval, Duration, MissedTickBehavior};
//!
//! # async fn example() {
//! let mut ticker = interval(Duration::from_millis(250));
//! ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
//! ticker.tick().await;
//! # }
//! ```

pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep, Timeout,
};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
