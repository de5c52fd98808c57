//! CLI command implementations.

pub mod example;
pub mod run;
pub mod smoke;
