//! Mathematical utilities: regression basis functions and the Householder
//! least-squares accumulator.

pub mod basis;
pub mod householder;

pub use basis::*;
pub use householder::*;
