//! Records and their identifiers.
//!
//! A record is one addressable unit of the corpus (a task, a spec item, or a
//! meta entity). Its identity is a ULID stored in the `_ulid` field; its
//! human aliases live in `slugs`.

use std::path::Path;
use std::sync::OnceLock;

use chrono::Utc;
use rand::Rng;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{CoreError, IdentifierError};
use crate::merge::document::load_document;
use crate::value::{Fields, Value};

/// Field holding a record's identifier.
pub const ID_FIELD: &str = "_ulid";

/// Field holding a record's aliases.
pub const ALIAS_FIELD: &str = "slugs";

/// Length of an identifier in characters.
pub const ID_LEN: usize = 26;

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new("^[0-7][0-9A-HJKMNP-TV-Z]{25}$").expect("valid identifier regex")
    })
}

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Globally unique, lexically sortable record identifier.
///
/// Always stored upper-case, so ordering and equality are case-insensitive
/// with respect to the text the identifier was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId(String);

impl RecordId {
    /// Parse an identifier, accepting any letter case.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let upper = value.trim().to_ascii_uppercase();
        if upper.len() != ID_LEN {
            return Err(IdentifierError::Invalid {
                value: value.to_string(),
                detail: format!("expected {ID_LEN} characters, got {}", upper.len()),
            });
        }
        if !id_pattern().is_match(&upper) {
            return Err(IdentifierError::Invalid {
                value: value.to_string(),
                detail: "not a Crockford base32 ULID".into(),
            });
        }
        Ok(Self(upper))
    }

    /// Generate a fresh identifier from the current time and 80 random bits.
    pub fn generate() -> Self {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0) & 0xFFFF_FFFF_FFFF;
        let random = rand::thread_rng().gen::<u128>() & ((1u128 << 80) - 1);
        let mut bits = (u128::from(millis) << 80) | random;

        let mut out = [0u8; ID_LEN];
        for slot in out.iter_mut().rev() {
            *slot = CROCKFORD[(bits & 0x1F) as usize];
            bits >>= 5;
        }
        let id = Self(out.iter().map(|&b| char::from(b)).collect());
        debug!(id = %id, "generated record identifier");
        id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RecordId {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Kind of record; decides which fields carry references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Task,
    Item,
    Meta,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Item => write!(f, "item"),
            Self::Meta => write!(f, "meta"),
        }
    }
}

/// One loaded record: identity, aliases, and its raw fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub kind: RecordKind,
    pub aliases: Vec<String>,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: RecordId, kind: RecordKind) -> Self {
        Self {
            id,
            kind,
            aliases: Vec::new(),
            fields: Fields::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// Build a record from a parsed map carrying `_ulid` and optional `slugs`.
    pub fn from_fields(kind: RecordKind, fields: &Fields) -> Result<Self, IdentifierError> {
        let raw_id = fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| IdentifierError::MissingField {
                field: ID_FIELD.into(),
            })?;
        let id = RecordId::parse(raw_id)?;

        let aliases = match fields.get(ALIAS_FIELD) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        };

        Ok(Self {
            id,
            kind,
            aliases,
            fields: fields.clone(),
        })
    }
}

/// List fields whose elements are records in their own right. Other lists
/// of maps (`notes`, `todos`, ...) hold sub-objects, even when those carry
/// an `_ulid` of their own.
pub const RECORD_LISTS: &[&str] = &["tasks", "items", "requirements", "features", "children"];

/// Collect the records of a document.
///
/// The root (a record map, or a sequence of them) holds records, and so does
/// every [`RECORD_LISTS`] field of a record, recursively. Sub-object lists are
/// never searched.
pub fn records_from_document(
    kind: RecordKind,
    document: &Value,
) -> Result<Vec<Record>, IdentifierError> {
    let mut records = Vec::new();
    match document {
        Value::Sequence(items) => {
            for fields in items.iter().filter_map(Value::as_map) {
                collect_records(kind, fields, &mut records)?;
            }
        }
        Value::Map(fields) => collect_records(kind, fields, &mut records)?,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
    debug!(kind = %kind, count = records.len(), "extracted records from document");
    Ok(records)
}

/// Load a record file from disk and extract its records.
pub fn load_records(kind: RecordKind, path: &Path) -> Result<Vec<Record>, CoreError> {
    let document = load_document(path)?;
    Ok(records_from_document(kind, &document)?)
}

fn collect_records(
    kind: RecordKind,
    fields: &Fields,
    out: &mut Vec<Record>,
) -> Result<(), IdentifierError> {
    if fields.contains_key(ID_FIELD) {
        out.push(Record::from_fields(kind, fields)?);
    }
    for list in RECORD_LISTS {
        if let Some(items) = fields.get(list).and_then(Value::as_sequence) {
            for child in items.iter().filter_map(Value::as_map) {
                collect_records(kind, child, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::document::{parse_document, Side};

    #[test]
    fn test_parse_uppercases() {
        let id = RecordId::parse("01hq3k5v8n2m4p6r8t0w2y4a6c").unwrap();
        assert_eq!(id.as_str(), "01HQ3K5V8N2M4P6R8T0W2Y4A6C");
    }

    #[test]
    fn test_parse_rejects_bad_alphabet_and_length() {
        assert!(RecordId::parse("01HQ3K5V8N2M4P6R8T0W2Y4A6").is_err());
        // 'U' is not in the Crockford alphabet.
        assert!(RecordId::parse("01HQ3K5V8N2M4P6R8T0W2Y4A6U").is_err());
        // First character above '7' would overflow the timestamp.
        assert!(RecordId::parse("81HQ3K5V8N2M4P6R8T0W2Y4A6C").is_err());
    }

    #[test]
    fn test_generate_is_valid_and_unique() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_eq!(a.as_str().len(), ID_LEN);
        assert!(RecordId::parse(a.as_str()).is_ok());
        assert_ne!(a, b);
    }

    #[test]
    fn test_records_from_document_nested() {
        let doc = parse_document(
            Side::Base,
            "items.yaml",
            r#"
_ulid: 01HQ0000000000000000000001
slugs: [auth]
title: Auth
requirements:
  - _ulid: 01HQ0000000000000000000002
    slugs: [login-flow]
    title: Login
"#,
        )
        .unwrap();
        let records = records_from_document(RecordKind::Item, &doc).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].aliases, vec!["auth"]);
        assert_eq!(records[1].id.as_str(), "01HQ0000000000000000000002");
        assert_eq!(records[1].aliases, vec!["login-flow"]);
    }

    #[test]
    fn test_sub_objects_are_not_records() {
        let doc = parse_document(
            Side::Base,
            "task.yaml",
            r#"
_ulid: 01HQ0000000000000000000001
title: Login
notes:
  - _ulid: 01HQ0000000000000000000009
    content: looks fine
todos:
  - id: T1
    _ulid: 01HQ000000000000000000000A
"#,
        )
        .unwrap();
        let records = records_from_document(RecordKind::Task, &doc).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id.as_str(), "01HQ0000000000000000000001");
    }

    #[test]
    fn test_container_document_lists_records() {
        let doc = parse_document(
            Side::Base,
            "tasks.yaml",
            r#"
version: 2
tasks:
  - _ulid: 01HQ0000000000000000000001
  - _ulid: 01HQ0000000000000000000002
    notes:
      - _ulid: 01HQ0000000000000000000003
"#,
        )
        .unwrap();
        let records = records_from_document(RecordKind::Task, &doc).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["01HQ0000000000000000000001", "01HQ0000000000000000000002"]);
    }

    #[test]
    fn test_load_records_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.yaml");
        std::fs::write(
            &path,
            "- _ulid: 01HQ0000000000000000000001\n  slugs: fix-login\n- _ulid: 01HQ0000000000000000000002\n",
        )
        .unwrap();
        let records = load_records(RecordKind::Task, &path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].aliases, vec!["fix-login"]);
        assert!(records.iter().all(|r| r.kind == RecordKind::Task));
    }

    #[test]
    fn test_load_records_bad_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.yaml");
        std::fs::write(&path, "_ulid: not-an-id\n").unwrap();
        let err = load_records(RecordKind::Task, &path).unwrap_err();
        assert!(matches!(err, CoreError::Identifier(_)));
    }

    #[test]
    fn test_from_fields_requires_id() {
        let fields = Fields::new();
        let err = Record::from_fields(RecordKind::Task, &fields).unwrap_err();
        assert!(matches!(err, IdentifierError::MissingField { .. }));
    }
}
