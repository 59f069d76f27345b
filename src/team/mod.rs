//! Team assembly for full queues
//!
//! One assembler per pick mode behind a common trait, plus the persisted
//! draft state machine used by the captain modes.

pub mod assembler;
pub mod draft;

pub use assembler::{assembler_for, Assembly, RosterEntry, TeamAssembler};
pub use draft::DraftState;
