//! Input validation utilities
//!
//! Common checks for command-line parameters and file paths, reported through
//! [`DedupError`](crate::errors::DedupError) so messages are consistent across commands.

use std::fmt::Display;
use std::path::Path;

use crate::errors::{DedupError, Result};
use crate::sam_io::is_stdio_path;

/// Validate that an input file exists
///
/// Standard input (`-`, `/dev/stdin`) always passes.
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use cfdedup_lib::validation::validate_file_exists;
///
/// assert!(validate_file_exists("/nonexistent/reads.sam", "Input SAM").is_err());
/// assert!(validate_file_exists("-", "Input SAM").is_ok());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !is_stdio_path(path_ref) && !path_ref.exists() {
        return Err(DedupError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate a two-character SAM tag name and return its bytes
///
/// # Errors
/// Returns an error if the tag is not exactly two alphanumeric ASCII characters
///
/// # Example
/// ```
/// use cfdedup_lib::validation::validate_tag;
///
/// assert_eq!(validate_tag("RX", "umi-tag").unwrap(), *b"RX");
/// assert!(validate_tag("RXX", "umi-tag").is_err());
/// ```
pub fn validate_tag(tag: &str, name: &str) -> Result<[u8; 2]> {
    let bytes = tag.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphanumeric) {
        return Err(DedupError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Tag must be exactly 2 alphanumeric characters, got: '{tag}'"),
        });
    }
    Ok([bytes[0], bytes[1]])
}

/// Validate that a value is at least `min`
///
/// # Errors
/// Returns an error if `value < min`
pub fn validate_at_least<T: PartialOrd + Display>(value: T, min: T, name: &str) -> Result<()> {
    if value < min {
        return Err(DedupError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be at least {min}, got: {value}"),
        });
    }
    Ok(())
}
