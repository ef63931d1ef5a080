use uuid::Uuid;

/// Extensions an object key may carry. Keep in sync with the sniffed-type
/// whitelist in the upload pipeline.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".webp"];

const KEY_PREFIX: &str = "user-assets";
const MAX_KEY_LENGTH: usize = 200;

/// Generates a fresh object key under the caller's namespace. Stored keys
/// come only from here, so they satisfy `owns_object_key` by construction.
pub fn new_object_key(user_id: Uuid, ext: &str) -> String {
    format!("{KEY_PREFIX}/{user_id}/{}{ext}", Uuid::new_v4())
}

/// Checks that a caller-supplied object key is well-formed and namespaced to
/// the caller. One pure check covering path traversal, cross-tenant access
/// and extension-based content confusion; callers turn `false` into a
/// uniform access-denied response.
pub fn owns_object_key(user_id: Uuid, key: &str) -> bool {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return false;
    }
    if key.contains("..") || key.contains('\\') || key.contains("//") {
        return false;
    }
    if !key.starts_with(&format!("{KEY_PREFIX}/{user_id}/")) {
        return false;
    }

    let lower = key.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_validate() {
        let user = Uuid::new_v4();
        for ext in ALLOWED_EXTENSIONS {
            assert!(owns_object_key(user, &new_object_key(user, ext)));
        }
    }

    #[test]
    fn rejects_foreign_namespace() {
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();
        let key = new_object_key(other, ".png");
        assert!(!owns_object_key(user, &key));
    }

    #[test]
    fn rejects_traversal_and_separator_tricks() {
        let user = Uuid::new_v4();
        assert!(!owns_object_key(user, &format!("user-assets/{user}/../{user}/x.png")));
        assert!(!owns_object_key(user, &format!("user-assets/{user}/a\\b.png")));
        assert!(!owns_object_key(user, &format!("user-assets/{user}//x.png")));
    }

    #[test]
    fn rejects_missing_or_unknown_extension() {
        let user = Uuid::new_v4();
        assert!(!owns_object_key(user, &format!("user-assets/{user}/file")));
        assert!(!owns_object_key(user, &format!("user-assets/{user}/file.svg")));
        assert!(!owns_object_key(user, &format!("user-assets/{user}/file.png.exe")));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let user = Uuid::new_v4();
        assert!(owns_object_key(user, &format!("user-assets/{user}/file.PNG")));
        assert!(owns_object_key(user, &format!("user-assets/{user}/file.Jpeg")));
    }

    #[test]
    fn rejects_empty_and_overlong_keys() {
        let user = Uuid::new_v4();
        assert!(!owns_object_key(user, ""));

        let long = format!("user-assets/{user}/{}{}", "a".repeat(200), ".png");
        assert!(!owns_object_key(user, &long));
    }
}
