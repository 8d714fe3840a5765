//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod check;
pub mod load;
pub mod reset;
pub mod scan;
pub mod status;
