//! Package catalog types.
//!
//! This module provides the data structures shared by the index fetcher, the
//! metadata store and the synchronization engine:
//!
//! - **PackageDescriptor**: one immutable entry of the remote index
//! - **PackageRecord**: the persisted form of a descriptor, keyed by digest
//!
//! # Identity
//!
//! Packages are content-addressed. Two descriptors with the same digest
//! describe the same content regardless of their other fields, and they map to
//! the same local file.
//!
//! # Wire Format
//!
//! The index is a JSON array; each element looks like:
//!
//! ```text
//! {"md5": "0cc175b9c0f1b6a831c399e269772661", "type": "posts",
//!  "min_id": 1, "max_id": 500, "tags": true, "file": "posts_1_500.json.xz"}
//! ```
//!
//! `file` is optional; see [`remote_file_name`].

mod descriptor;
mod naming;

pub use descriptor::{PackageDescriptor, PackageRecord};
pub use naming::{derived_file_name, remote_file_name, storage_file_name};
