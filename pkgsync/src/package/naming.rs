//! Centralized package naming conventions.
//!
//! This module is the single source of truth for package file names:
//! - Local storage names (e.g., `0cc175b9c0f1b6a831c399e269772661`)
//! - Remote names relative to the index (e.g., `posts_1_500.json.xz`)

use super::PackageDescriptor;

/// Generate the local storage file name for a digest.
///
/// Storage is content-addressed: the name is the lower-cased digest, so
/// descriptors sharing a digest share one file.
///
/// # Examples
///
/// ```
/// use pkgsync::package::storage_file_name;
///
/// assert_eq!(storage_file_name("AA11"), "aa11");
/// ```
pub fn storage_file_name(hash_digest: &str) -> String {
    hash_digest.to_ascii_lowercase()
}

/// Generate the remote file name derived from descriptor fields.
///
/// # Format
///
/// `{content_type}_{min_id}_{max_id}.json.xz`
///
/// # Examples
///
/// ```
/// use pkgsync::package::{derived_file_name, PackageDescriptor};
///
/// let descriptor = PackageDescriptor::new("posts", 1, 500, "aa11", true);
/// assert_eq!(derived_file_name(&descriptor), "posts_1_500.json.xz");
/// ```
pub fn derived_file_name(descriptor: &PackageDescriptor) -> String {
    format!(
        "{}_{}_{}.json.xz",
        descriptor.content_type, descriptor.min_id, descriptor.max_id
    )
}

/// Remote file name for a descriptor.
///
/// Uses the index's explicit `file` entry when present, otherwise
/// [`derived_file_name`].
pub fn remote_file_name(descriptor: &PackageDescriptor) -> String {
    match descriptor.file_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => derived_file_name(descriptor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_remote_name_prefers_explicit_file() {
        let descriptor =
            PackageDescriptor::new("posts", 1, 500, "aa11", true).with_file_name("p/001.xz");
        assert_eq!(remote_file_name(&descriptor), "p/001.xz");
    }

    #[test]
    fn test_remote_name_ignores_blank_file() {
        let descriptor = PackageDescriptor::new("tags", 3, 4, "aa11", true).with_file_name("  ");
        assert_eq!(remote_file_name(&descriptor), "tags_3_4.json.xz");
    }

    #[test]
    fn test_storage_name_ignores_other_fields() {
        let a = PackageDescriptor::new("posts", 1, 2, "AA11", true);
        let b = PackageDescriptor::new("tags", 9, 9, "aa11", false);
        assert_eq!(a.storage_file_name(), b.storage_file_name());
    }

    proptest! {
        #[test]
        fn prop_derived_name_is_deterministic(
            content_type in "[a-z]{1,12}",
            min_id in 0i64..1_000_000,
            span in 0i64..1_000_000,
        ) {
            let a = PackageDescriptor::new(content_type.clone(), min_id, min_id + span, "aa11", true);
            let b = PackageDescriptor::new(content_type, min_id, min_id + span, "bb22", false);
            prop_assert_eq!(derived_file_name(&a), derived_file_name(&b));
            prop_assert!(derived_file_name(&a).ends_with(".json.xz"));
        }
    }
}
