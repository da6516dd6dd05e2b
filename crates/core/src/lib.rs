//! specweave core library.
//!
//! This crate provides the two engines behind specweave's plain-text record
//! store: an identity index that resolves `@alias` / `@ULID` / `@ULID-prefix`
//! references across task and spec-item records, and a three-way semantic
//! merge engine that git invokes as a merge driver for those YAML records.

pub mod config;
pub mod errors;
pub mod identity;
pub mod merge;
pub mod value;

// Re-exports for convenience.
pub use config::AppConfig;
pub use errors::CoreError;
pub use identity::{Record, RecordId, RecordKind, ReferenceIndex};
pub use merge::{MergeDriver, MergeOptions, Merger};
pub use value::{Fields, Value};
