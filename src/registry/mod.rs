//! Supporting registries consulted by the queue and score engines

pub mod bans;
pub mod party;
pub mod ranks;

pub use bans::BanRegistry;
pub use party::{DisbandOutcome, PartyOutcome, PartyRegistry};
pub use ranks::RankTable;
