//! Ownership claims derived from filenames

use datadock_core::{AppError, User};
use datadock_db::UserRegistry;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Fallback patterns for stems without an underscore, tried in order
static USERNAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r"^([a-zA-Z0-9_.-]+)[\W_].*$", r"^([a-zA-Z0-9_.-]+)$"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

/// Username claimed by a filename.
///
/// `alice_q3.csv` claims `alice`: everything before the first underscore
/// of the stem. Stems without an underscore go through the fallback
/// patterns (`alice-q3 final` claims `alice-q3`, `alice` claims `alice`).
pub fn extract_username(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;

    let username = match stem.split_once('_') {
        Some((head, _)) => head.to_string(),
        None => USERNAME_PATTERNS
            .iter()
            .find_map(|rx| rx.captures(stem))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())?,
    };

    if username.is_empty() {
        None
    } else {
        Some(username)
    }
}

/// Resolve a claimed username against the registry (case-insensitive).
/// An unknown user is `Ok(None)`.
pub async fn resolve_owner(
    registry: &dyn UserRegistry,
    username: &str,
) -> Result<Option<User>, AppError> {
    registry.find_by_username(username).await
}
