//! Sync engine for opnsync
//!
//! The engine orchestrates:
//! 1. Refreshing - Re-read tracked objects, dropping the ones that vanished
//! 2. Planning - Compare declared objects with tracked state
//! 3. Executing - Apply changes one object at a time, saving state as it goes

pub mod differ;
pub mod executor;
pub mod planner;
pub mod refresh;

pub use executor::{ExecuteOptions, execute};
pub use planner::{Target, parse_target};
pub use refresh::refresh;
