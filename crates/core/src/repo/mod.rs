//! Read-only repository access for git-mediate.

pub mod client;
pub mod history;
pub mod snapshot;

pub use client::{CommitMeta, RepoClient};
pub use snapshot::{read_snapshot, FileSnapshot};
