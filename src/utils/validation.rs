//! Centralized validation and helper functions.

/// Maximum number of reference sequences accepted from a single header
pub const MAX_REFERENCES: usize = 1_000_000;

/// Characters allowed anywhere in a reference name
fn is_reference_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&*+./:;=?@^_|~-".contains(c)
}

/// Validate a reference sequence name against the SAM `@SQ SN` grammar:
/// `[0-9A-Za-z!#$%&+./:;?@^_|~-][0-9A-Za-z!#$%&*+./:;=?@^_|~-]*`.
///
/// # Examples
///
/// ```
/// use bam_transform::utils::validation::is_valid_reference_name;
///
/// assert!(is_valid_reference_name("chr1"));
/// assert!(is_valid_reference_name("HLA-A*01:01:01:01"));
/// assert!(!is_valid_reference_name("*chr1"));
/// assert!(!is_valid_reference_name("chr 1"));
/// assert!(!is_valid_reference_name(""));
/// ```
#[must_use]
pub fn is_valid_reference_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first != '*' && first != '=' && is_reference_name_char(first) => {
            chars.all(is_reference_name_char)
        }
        _ => false,
    }
}

/// Check if adding another reference would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new reference.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_reference_limit(count: usize) -> Option<String> {
    if count >= MAX_REFERENCES {
        Some(format!(
            "Too many references: adding another would exceed maximum of {MAX_REFERENCES}"
        ))
    } else {
        None
    }
}
