//! Queue admission and removal
//!
//! The queue manager runs the fixed admission check sequence, inserts and
//! removes queue entries (whole parties at a time), and fires the
//! lobby-full transition synchronously when a queue reaches capacity.

pub mod cooldown;
pub mod locks;
pub mod manager;

pub use cooldown::RequeueCooldowns;
pub use locks::LobbyLocks;
pub use manager::{JoinOutcome, LeaveOutcome, QueueManager};
