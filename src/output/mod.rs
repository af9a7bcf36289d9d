//! Output module for operator-facing reporting
//!
//! This module handles:
//! - Per-item progress lines while a crawl runs
//! - Statistics over an existing comment document

mod console;
pub mod stats;

pub use console::ConsoleReporter;
pub use stats::{load_statistics, print_statistics, DocumentStatistics};
