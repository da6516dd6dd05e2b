//! Three-way semantic merging of YAML record documents.
//!
//! The merge subsystem is responsible for:
//! 1. **Loading** -- parsing base, ours and theirs into [`Value`](crate::value::Value) trees.
//! 2. **Merging** -- combining them field by field and element by element.
//! 3. **Resolution** -- applying human choices or annotating what is left.
//! 4. **Orchestration** -- the git merge-driver contract.

pub mod annotate;
pub mod array;
pub mod conflict;
pub mod document;
pub mod driver;
pub mod merger;
pub mod path;
pub mod resolver;
pub mod schema;

pub use conflict::{Choice, ChoiceOption, Conflict, ConflictKind, ConflictPolicy};
pub use document::{load_document, load_three, parse_document, DocumentPaths, Side, ThreeVersions};
pub use driver::{DriverOutcome, DriverReport, MergeDriver};
pub use merger::{MergeOptions, MergeResult, Merger};
pub use path::{FieldPath, Segment};
pub use resolver::{ConflictPrompt, ConflictResolver};
pub use schema::{ArrayKind, ArraySchema};
