//! Package descriptor and its persisted record.

use serde::{Deserialize, Serialize};

use super::naming;

/// One entry of the remote package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageDescriptor {
    /// Kind of content held by the package.
    #[serde(rename = "type")]
    pub content_type: String,

    /// Lowest item id covered by the package.
    pub min_id: i64,

    /// Highest item id covered by the package.
    pub max_id: i64,

    /// Hex content digest; the package identity.
    #[serde(rename = "md5", alias = "digest")]
    pub hash_digest: String,

    /// Whether the package carries tag data.
    #[serde(rename = "tags")]
    pub has_tags: bool,

    /// Remote file name relative to the index location.
    #[serde(rename = "file", default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl PackageDescriptor {
    /// Create a descriptor without an explicit remote file name.
    pub fn new(
        content_type: impl Into<String>,
        min_id: i64,
        max_id: i64,
        hash_digest: impl Into<String>,
        has_tags: bool,
    ) -> Self {
        Self {
            content_type: content_type.into(),
            min_id,
            max_id,
            hash_digest: hash_digest.into(),
            has_tags,
            file_name: None,
        }
    }

    /// Set the remote file name.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Normalized identity key (lower-cased digest).
    pub fn key(&self) -> String {
        self.hash_digest.to_ascii_lowercase()
    }

    /// Whether the digest is a non-empty hex string.
    pub fn has_valid_digest(&self) -> bool {
        !self.hash_digest.is_empty() && self.hash_digest.chars().all(|c| c.is_ascii_hexdigit())
    }

    /// File name used in the local content directory.
    pub fn storage_file_name(&self) -> String {
        naming::storage_file_name(&self.hash_digest)
    }

    /// File name relative to the index base URL.
    pub fn remote_file_name(&self) -> String {
        naming::remote_file_name(self)
    }
}

/// Persisted package metadata.
///
/// Keyed by digest; an upsert replaces any existing record with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Descriptor fields as fetched.
    #[serde(flatten)]
    pub descriptor: PackageDescriptor,

    /// Whether the latest fetched index references this package.
    pub referenced_in_index: bool,
}

impl PackageRecord {
    /// Digest key for this record.
    pub fn key(&self) -> String {
        self.descriptor.key()
    }
}

impl From<&PackageDescriptor> for PackageRecord {
    fn from(descriptor: &PackageDescriptor) -> Self {
        Self {
            descriptor: descriptor.clone(),
            referenced_in_index: true,
        }
    }
}
