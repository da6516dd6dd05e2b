//! End-to-end tests for loading record files and resolving references.

use tempfile::TempDir;

use specweave_core::errors::{AliasError, ResolveError};
use specweave_core::identity::{load_records, MatchKind, ResolveFailureKind};
use specweave_core::{RecordId, RecordKind, ReferenceIndex};

// ===========================================================================
// Fixtures
// ===========================================================================

const LOGIN_A: &str = "01HQ3K5V7X9Z2B4D6F8G0J2K4M";
const LOGIN_B: &str = "01HQ3K5V7X9Z2B4D6F8G0J2K4N";
const AUTH_ITEM: &str = "01HQ9ZZZZZZZZZZZZZZZZZZZZZ";
const LOGIN_NOTE: &str = "01HQ5NNNNNNNNNNNNNNNNNNNNN";

fn tasks_yaml() -> String {
    format!(
        "\
- _ulid: {LOGIN_A}
  slugs: [login-flow, login]
  title: Login page
  spec_ref: '@auth-item'
  depends_on: ['@{prefix}']
  notes:
    - _ulid: {LOGIN_NOTE}
      author: '@nobody'
      content: who wrote this?
- _ulid: {LOGIN_B}
  slugs: [login-flow]
  title: Login API
",
        prefix = &AUTH_ITEM[..10]
    )
}

fn items_yaml() -> String {
    format!(
        "\
_ulid: {AUTH_ITEM}
slugs: [auth-item]
title: Authentication
implements: ['@login-flow']
"
    )
}

fn load_index(dir: &TempDir) -> (ReferenceIndex, Vec<specweave_core::Record>) {
    let tasks = dir.path().join("tasks.yaml");
    let items = dir.path().join("items.yaml");
    std::fs::write(&tasks, tasks_yaml()).unwrap();
    std::fs::write(&items, items_yaml()).unwrap();

    let mut records = load_records(RecordKind::Task, &tasks).expect("failed to load tasks");
    records.extend(load_records(RecordKind::Item, &items).expect("failed to load items"));
    (ReferenceIndex::build(&records), records)
}

fn id(s: &str) -> RecordId {
    RecordId::parse(s).unwrap()
}

// ===========================================================================
// Resolution
// ===========================================================================

#[test]
fn test_duplicate_alias_lists_both_candidates() {
    let dir = TempDir::new().unwrap();
    let (index, _) = load_index(&dir);

    let err = index.resolve("@login-flow").unwrap_err();
    assert_eq!(err.kind(), ResolveFailureKind::DuplicateAlias);
    assert_eq!(err.candidates(), &[id(LOGIN_A), id(LOGIN_B)]);
}

#[test]
fn test_note_identifier_is_not_a_record() {
    let dir = TempDir::new().unwrap();
    let (index, records) = load_index(&dir);

    assert_eq!(records.len(), 3);
    assert_eq!(index.len(), 3);
    let err = index.resolve(&format!("@{LOGIN_NOTE}")).unwrap_err();
    assert_eq!(err.kind(), ResolveFailureKind::NotFound);
}

#[test]
fn test_unique_alias_and_exact_id() {
    let dir = TempDir::new().unwrap();
    let (index, _) = load_index(&dir);

    let by_alias = index.resolve("@login").unwrap();
    assert_eq!(by_alias.id, id(LOGIN_A));
    assert_eq!(by_alias.matched_by, MatchKind::Alias);

    let by_id = index.resolve(&format!("@{}", LOGIN_B.to_lowercase())).unwrap();
    assert_eq!(by_id.id, id(LOGIN_B));
    assert_eq!(by_id.matched_by, MatchKind::ExactId);
}

#[test]
fn test_prefix_resolution() {
    let dir = TempDir::new().unwrap();
    let (index, _) = load_index(&dir);

    let hit = index.resolve("@01hq9").unwrap();
    assert_eq!(hit.id, id(AUTH_ITEM));
    assert_eq!(hit.matched_by, MatchKind::IdPrefix);

    match index.resolve("@01HQ3K") {
        Err(ResolveError::Ambiguous { candidates, .. }) => {
            assert_eq!(candidates, vec![id(LOGIN_A), id(LOGIN_B)]);
        }
        other => panic!("expected ambiguous, got {:?}", other),
    }

    assert!(matches!(
        index.resolve("@7ZZZ"),
        Err(ResolveError::NotFound { .. })
    ));
}

#[test]
fn test_shortest_unique_prefix_grows_past_shared_head() {
    let dir = TempDir::new().unwrap();
    let (index, _) = load_index(&dir);

    // LOGIN_A and LOGIN_B differ only in their last character.
    assert_eq!(index.shortest_unique_prefix(LOGIN_A, 8), LOGIN_A);
    assert_eq!(index.shortest_unique_prefix(AUTH_ITEM, 8), &AUTH_ITEM[..8]);
    assert_eq!(index.shortest_unique_prefix(AUTH_ITEM, 4), &AUTH_ITEM[..5]);
}

// ===========================================================================
// Validation
// ===========================================================================

#[test]
fn test_validation_reports_each_unresolved_reference() {
    let dir = TempDir::new().unwrap();
    let (index, records) = load_index(&dir);

    let errors = index.validate_references(&records);
    let summary: Vec<(&str, &str, ResolveFailureKind)> = errors
        .iter()
        .map(|e| (e.field.as_str(), e.reference.as_str(), e.kind))
        .collect();

    assert_eq!(
        summary,
        vec![
            ("notes.author", "@nobody", ResolveFailureKind::NotFound),
            ("implements", "@login-flow", ResolveFailureKind::DuplicateAlias),
        ]
    );
    assert_eq!(errors[0].record, id(LOGIN_A));
    assert_eq!(errors[1].record, id(AUTH_ITEM));
}

#[test]
fn test_alias_uniqueness_excludes_own_record() {
    let dir = TempDir::new().unwrap();
    let (index, _) = load_index(&dir);

    assert!(index
        .check_alias_uniqueness(["login"], Some(&id(LOGIN_A)))
        .is_ok());
    assert_eq!(
        index.check_alias_uniqueness(["fresh", "login"], Some(&id(LOGIN_B))),
        Err(AliasError::Taken {
            alias: "login".into(),
            existing: id(LOGIN_A),
        })
    );
}
