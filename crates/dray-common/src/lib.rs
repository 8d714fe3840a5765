//! Dray Common Library
//!
//! Shared infrastructure for the dray workspace. Currently this is the
//! logging setup used by every binary; domain logic lives in `dray-core`.

pub mod logging;
