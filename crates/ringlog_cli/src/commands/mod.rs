//! CLI command implementations.

pub mod dump;
pub mod serve;
pub mod write;
