//! Data sources.
//!
//! Only seeded synthetic generators live here; real series come from files
//! through `io::ingest`.

pub mod synthetic;
