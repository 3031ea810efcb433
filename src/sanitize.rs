//! Mapping arbitrary item names into filesystem-safe names.

/// Characters that are rejected by at least one mainstream filesystem.
const INVALID_FILE_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Like [`INVALID_FILE_CHARS`] but keeping path separators, since a
/// directory argument may legitimately contain them.
const INVALID_DIR_CHARS: &[char] = &['*', '?', '"', '<', '>', '|'];

/// Replaces characters that cannot appear in a single path component with `_`.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_control() || INVALID_FILE_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Replaces characters that cannot appear in a directory path with `_`.
#[must_use]
pub fn sanitize_dir_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_control() || INVALID_DIR_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}
