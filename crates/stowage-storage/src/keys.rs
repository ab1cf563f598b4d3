//! Shared key generation for storage backends.
//!
//! Local keys are deterministic: `{base_path}{md5(file_name)}.{extension}`.
//! Remote keys get a random name: `{prefix}/{uuid}.{extension}`.

use uuid::Uuid;

/// Hex md5 digest of the client-supplied file name.
pub fn hashed_name(original_file_name: &str) -> String {
    format!("{:x}", md5::compute(original_file_name.as_bytes()))
}

/// Key for a local upload. The base path is concatenated without adding a separator.
pub fn local_key(base_path: &str, original_file_name: &str, extension: &str) -> String {
    format!(
        "{}{}.{}",
        base_path,
        hashed_name(original_file_name),
        extension
    )
}

/// Prefix for a remote upload: the base path without trailing slashes.
pub fn remote_prefix(base_path: &str) -> &str {
    base_path.trim_end_matches('/')
}

/// Key with a backend-chosen name under `prefix`.
pub fn generated_key(prefix: &str, extension: &str) -> String {
    let name = Uuid::new_v4().simple().to_string();
    let file_name = if extension.is_empty() {
        name
    } else {
        format!("{}.{}", name, extension)
    };
    let prefix = remote_prefix(prefix);
    if prefix.is_empty() {
        file_name
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_key_hashes_the_file_name() {
        assert_eq!(
            local_key("uploads/", "a.txt", "txt"),
            format!("uploads/{:x}.txt", md5::compute(b"a.txt"))
        );
        assert_eq!(hashed_name("a.txt").len(), 32);
    }

    #[test]
    fn local_key_does_not_insert_a_separator() {
        let key = local_key("avatars", "me.png", "png");
        assert!(key.starts_with("avatars"));
        assert!(!key.starts_with("avatars/"));
    }

    #[test]
    fn empty_parts_give_a_degenerate_key() {
        assert_eq!(local_key("", "", ""), format!("{}.", hashed_name("")));
    }

    #[test]
    fn generated_key_lives_under_trimmed_prefix() {
        let key = generated_key("docs//", "pdf");
        assert!(key.starts_with("docs/"));
        assert!(!key.starts_with("docs//"));
        assert!(key.ends_with(".pdf"));
        assert_ne!(key, generated_key("docs", "pdf"));
    }

    #[test]
    fn generated_key_without_prefix_or_extension() {
        let key = generated_key("", "");
        assert_eq!(key.len(), 32);
        assert!(!key.contains('/'));
        assert!(!key.contains('.'));
    }
}
