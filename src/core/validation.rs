//! Validation for fragment identifiers and fragment directory names
//!
//! A fragment lives in a directory named after its identifier:
//!
//! ```text
//! <array_dir>/__0f3a9c1e2b4d46a88c7e5f0a1b2c3d4e/
//! ```
//!
//! The `__` prefix keeps fragment directories apart from array-level files.

use crate::error::{FragmentError, Result};
use crate::uuid::FragmentId;
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Prefix of every fragment directory name
pub const FRAGMENT_DIR_PREFIX: &str = "__";

/// Pattern for the canonical identifier text form
const FRAGMENT_ID_PATTERN: &str = r"^[0-9a-f]{32}$";

fn fragment_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FRAGMENT_ID_PATTERN).expect("fragment id pattern is valid"))
}

/// Validate the 32-character lowercase hex form of a fragment id
///
/// # Errors
///
/// Returns `InvalidFragmentName` for uppercase hex, hyphenated UUIDs, or the
/// wrong length.
///
/// # Examples
///
/// ```
/// use fragment_catalog::validation::validate_fragment_id;
///
/// assert!(validate_fragment_id("0123456789abcdef0123456789abcdef").is_ok());
/// assert!(validate_fragment_id("0123456789ABCDEF0123456789ABCDEF").is_err());
/// ```
pub fn validate_fragment_id(text: &str) -> Result<()> {
    if !fragment_id_regex().is_match(text) {
        return Err(FragmentError::InvalidFragmentName(format!(
            "'{}' must be 32 lowercase hexadecimal characters",
            text
        )));
    }
    Ok(())
}

/// Directory name for a fragment id (`__<id>`)
pub fn fragment_dir_name(id: &FragmentId) -> String {
    format!("{}{}", FRAGMENT_DIR_PREFIX, id)
}

/// Parse a fragment directory name back into its id
///
/// # Examples
///
/// ```
/// use fragment_catalog::validation::parse_fragment_dir_name;
///
/// let id = parse_fragment_dir_name("__0123456789abcdef0123456789abcdef").unwrap();
/// assert_eq!(id.to_string(), "0123456789abcdef0123456789abcdef");
///
/// assert!(parse_fragment_dir_name("0123456789abcdef0123456789abcdef").is_err());
/// ```
pub fn parse_fragment_dir_name(name: &str) -> Result<FragmentId> {
    let id = name.strip_prefix(FRAGMENT_DIR_PREFIX).ok_or_else(|| {
        FragmentError::InvalidFragmentName(format!(
            "'{}' is missing the '{}' prefix",
            name, FRAGMENT_DIR_PREFIX
        ))
    })?;
    id.parse()
}

/// Extract the fragment id from a fragment directory path
pub fn extract_fragment_id(path: &Path) -> Result<FragmentId> {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| FragmentError::InvalidFragmentName(path.display().to_string()))?;

    parse_fragment_dir_name(name)
}
