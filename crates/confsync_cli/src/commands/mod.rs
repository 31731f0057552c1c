//! Command implementations.

pub mod attach;
pub mod backup;
pub mod delete;
pub mod detach;
pub mod migrate;
pub mod restore;

use regex::Regex;

/// Compiles an optional name pattern.
pub fn compile_pattern(
    pattern: Option<&str>,
) -> Result<Option<Regex>, Box<dyn std::error::Error>> {
    match pattern {
        None => Ok(None),
        Some(pattern) => Ok(Some(Regex::new(pattern)?)),
    }
}
