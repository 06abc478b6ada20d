//! Shared key generation for storage backends.
//!
//! Key format: `user_{owner_id}/{filename}`.

use uuid::Uuid;

/// Storage key for an owner's file.
pub fn owner_key(owner_id: Uuid, filename: &str) -> String {
    format!("user_{}/{}", owner_id, filename)
}

/// `key` with `_{suffix}` inserted before the extension of its last component.
pub fn with_suffix(key: &str, suffix: &str) -> String {
    let (dir, name) = match key.rfind('/') {
        Some(idx) => key.split_at(idx + 1),
        None => ("", key),
    };
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}_{}{}", dir, &name[..dot], suffix, &name[dot..]),
        _ => format!("{}{}_{}", dir, name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_key() {
        let id = Uuid::nil();
        assert_eq!(
            owner_key(id, "bob_report.csv"),
            "user_00000000-0000-0000-0000-000000000000/bob_report.csv"
        );
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("user_1/a.csv", "x1Y2z3Q"), "user_1/a_x1Y2z3Q.csv");
        assert_eq!(with_suffix("user_1/archive.tar.gz", "k"), "user_1/archive.tar_k.gz");
        assert_eq!(with_suffix("user_1/noext", "k"), "user_1/noext_k");
        assert_eq!(with_suffix(".hidden", "k"), ".hidden_k");
    }
}
