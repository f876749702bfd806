//! Input/output helpers.
//!
//! - series text ingest (`ingest`)
//! - CSV and series-text exports (`export`)
//! - AR spectrum JSON read/write (`spectrum`)

pub mod export;
pub mod ingest;
pub mod spectrum;

pub use export::*;
pub use ingest::*;
pub use spectrum::*;
