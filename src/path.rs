//! Path validation and conversions between filesystem paths and object keys
//!
//! A path is `/` followed by zero or more `component/` groups and an optional
//! trailing component. A trailing delimiter marks a folder, its absence a file.

use crate::error::PathError;

pub const DELIMITER: char = '/';
pub const ROOT_PATH: &str = "/";

/// True iff the path ends with the delimiter.
pub fn is_folder_path(path: &str) -> bool {
    path.ends_with(DELIMITER)
}

/// True iff the path matches the canonical grammar.
pub fn is_well_formed(path: &str) -> bool {
    let Some(rest) = path.strip_prefix(DELIMITER) else {
        return false;
    };
    if rest.is_empty() {
        return true;
    }

    let components: Vec<&str> = rest.split(DELIMITER).collect();
    let (last, leading) = match components.split_last() {
        Some(split) => split,
        None => return true,
    };
    leading.iter().all(|c| is_valid_component(c)) && (last.is_empty() || is_valid_component(last))
}

fn is_valid_component(component: &str) -> bool {
    !component.is_empty() && !component.chars().any(char::is_whitespace)
}

/// Check the grammar, then check that folder-ness agrees with `expect_folder`.
pub fn validate(path: &str, expect_folder: bool) -> Result<(), PathError> {
    if !is_well_formed(path) {
        return Err(PathError::InvalidPath(path.to_string()));
    }
    match (is_folder_path(path), expect_folder) {
        (false, true) => Err(PathError::InvalidFolder(path.to_string())),
        (true, false) => Err(PathError::InvalidFile(path.to_string())),
        _ => Ok(()),
    }
}

/// Folder path containing `path`. The root is its own parent.
pub fn parent_path(path: &str) -> String {
    let trimmed = path.trim_end_matches(DELIMITER);
    match trimmed.rfind(DELIMITER) {
        Some(idx) => trimmed[..=idx].to_string(),
        None => ROOT_PATH.to_string(),
    }
}

/// Final non-empty component of `path`, empty for the root.
pub fn name(path: &str) -> &str {
    let trimmed = path.trim_end_matches(DELIMITER);
    match trimmed.rfind(DELIMITER) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Object key for a path: the path without its leading delimiter.
pub fn object_key(path: &str) -> &str {
    path.strip_prefix(DELIMITER).unwrap_or(path)
}

/// Path for an object key or listing prefix returned by the store.
pub fn path_from_key(key: &str) -> String {
    format!("{}{}", DELIMITER, key)
}

/// Append a child component to a folder path.
pub fn join(folder_path: &str, child: &str) -> String {
    if is_folder_path(folder_path) {
        format!("{}{}", folder_path, child)
    } else {
        format!("{}{}{}", folder_path, DELIMITER, child)
    }
}
