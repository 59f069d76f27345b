//! Game lifecycle: creation, captain drafts, cancellation
//!
//! One game per lobby is live at a time. Games are created by the
//! lobby-full transition, move through the captain draft when the pick
//! mode calls for one, and end Decided (scored) or Canceled.

pub mod lifecycle;

pub use lifecycle::{DraftProgress, GameManager};
