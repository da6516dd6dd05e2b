//! Record identity and reference resolution.
//!
//! Every record carries an immutable ULID and zero or more aliases. The
//! [`ReferenceIndex`] maps both to records so that `@alias`, `@ULID`, and
//! `@ULID-prefix` references can be resolved, and surfaces alias collisions
//! instead of silently picking a winner.

pub mod index;
pub mod record;
pub mod references;

pub use index::{MatchKind, ReferenceIndex, Resolution, DEFAULT_MIN_PREFIX_LEN};
pub use record::{load_records, records_from_document, Record, RecordId, RecordKind};
pub use references::{reference_fields, ReferenceField, ResolveFailureKind, ValidationError};
