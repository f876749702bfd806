//! Series store: parsing, validation and spacing statistics.

pub mod store;

pub use store::*;
