//! nxtransfer core library.
//!
//! This crate moves artifacts between a repository manager and the local
//! filesystem: paginated asset enumeration, per-format path mapping and
//! upload rules, an authenticated HTTP transport, and the bounded worker
//! pipeline that drives both export and import runs.

pub mod assets;
pub mod config;
pub mod errors;
pub mod export;
pub mod formats;
pub mod import;
pub mod pipeline;
pub mod transport;

// Re-exports for convenience.
pub use config::{Credentials, Profile, RunConfig};
pub use export::export_repository;
pub use formats::{FormatRegistry, RepoType};
pub use import::import_repository;
pub use pipeline::{NoProgress, ProgressObserver, TransferReport};
