//! Scoring and the durable point-delta ledger
//!
//! Every decision writes one ScoreUpdate row per participant recording the
//! effective applied delta, which makes reversal (recompute, cancellation)
//! exact even when the zero floor clamped a loss.

pub mod engine;

pub use engine::{formatted_name, RegistrationOutcome, ScoreEngine};
pub(crate) use engine::reversed_players;
