//! Types library for the notification services
//!
//! Identifier and time types shared by every crate that handles account
//! notifications.
//!
//! # Modules
//! - `ids`: Account and block identifiers
//! - `time`: Unix millisecond clock helpers

pub mod ids;
pub mod time;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::time::*;
}
