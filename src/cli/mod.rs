//! Command-line interface for dkinject.

mod commands;
pub mod progress;

pub use commands::{is_verbose, run};
