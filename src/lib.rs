//! `geo-tsa` library crate.
//!
//! The binary (`tsa`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the engines (`mem`, `models`, `filter`) are usable without the CLI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod filter;
pub mod io;
pub mod math;
pub mod mem;
pub mod models;
pub mod report;
pub mod series;
