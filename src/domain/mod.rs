//! Domain types shared across the crate.
//!
//! Keep this module free of heavy logic; it's primarily data structures and
//! small helpers.

pub mod epoch;
pub mod types;

pub use epoch::*;
pub use types::*;
