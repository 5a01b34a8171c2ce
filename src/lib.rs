//! gitsave - path-addressed working tree over git
//!
//! Many independent writers edit files in a shared store and publish their
//! edits to one mainline branch. Each writer stages edits against a snapshot,
//! builds a commit, and then advances the mainline while holding a lock token
//! reference, merging or rebasing as needed and optionally publishing to a
//! remote with rollback and retry.
//!
//! # Module Organization
//!
//! - `entry`: file and directory entries, path normalization
//! - `catalog`: lookups and traversals against snapshots
//! - `staging`: the mutable per-session staging index
//! - `commit`: commit construction from a staging index
//! - `lock`: reference-based mutual exclusion
//! - `merge`: three-way merge into the mainline and conflict reports
//! - `remote`: fetch/push transport
//! - `push`: local and remote save coordination
//! - `workspace`: the session value tying repository, config, and identity
//! - `actor`, `config`, `error`, `output`, `refs`: supporting plumbing
//! - `cli`: command-line interface using clap

pub mod actor;
pub mod catalog;
pub mod cli;
pub mod commit;
pub mod config;
pub mod entry;
pub mod error;
pub mod lock;
pub mod merge;
pub mod output;
pub mod push;
pub mod refs;
pub mod remote;
pub mod staging;
pub mod workspace;

pub use entry::{Entry, EntryKind, EntryMetadata};
pub use error::{Error, Result};
pub use merge::ConflictReport;
pub use push::SaveReport;
pub use staging::StagingIndex;
pub use workspace::Workspace;
