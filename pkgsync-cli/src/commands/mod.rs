//! CLI command implementations.

pub mod common;
pub mod status;
pub mod sync;
pub mod verify;

pub use status::StatusArgs;
pub use sync::SyncArgs;
pub use verify::VerifyArgs;
