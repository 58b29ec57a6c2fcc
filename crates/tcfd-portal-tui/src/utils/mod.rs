//! Utility functions for string formatting.

pub mod format;

pub use format::{format_score, format_timestamp, truncate_string};
