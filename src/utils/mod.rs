//! Utility functions and types for the broker.

pub mod error;
pub mod extremum;
mod logging;

pub use error::{Error, Result};
pub use extremum::find_next_extremum;
pub use logging::init_logging;
