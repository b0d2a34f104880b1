//! Shared value types used across the saga crates.

mod types;

pub use types::{RecentEvent, Timestamp, UNKNOWN, excerpt, now};
