//! Utility functions for formatting command output.

pub mod format;

pub use format::{format_expiry, format_project_row, truncate_string};
