//! Reference resolution index.
//!
//! [`ReferenceIndex`] is built once from a snapshot of loaded records and is
//! never mutated afterwards: the canonical pattern is load records, build the
//! index, resolve as many references as needed, and discard it when the
//! corpus changes.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::record::{Record, RecordId};
use crate::errors::{AliasError, ResolveError};

/// Default minimum length for shortened identifiers.
pub const DEFAULT_MIN_PREFIX_LEN: usize = 8;

/// How a reference was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchKind {
    Alias,
    ExactId,
    IdPrefix,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alias => write!(f, "alias"),
            Self::ExactId => write!(f, "exact-id"),
            Self::IdPrefix => write!(f, "id-prefix"),
        }
    }
}

/// A successfully resolved reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub id: RecordId,
    pub matched_by: MatchKind,
}

/// Immutable alias and identifier index over a batch of records.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    /// alias -> identifiers claiming it, in insertion order.
    aliases: HashMap<String, Vec<RecordId>>,
    /// identifier -> record.
    records: HashMap<RecordId, Record>,
    /// All identifiers, sorted, for prefix search.
    sorted_ids: Vec<RecordId>,
}

impl ReferenceIndex {
    /// Build an index from a flat list of records.
    pub fn build(records: &[Record]) -> Self {
        Self::from_records(records.iter().cloned())
    }

    /// Build an index, taking ownership of the records.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut aliases: HashMap<String, Vec<RecordId>> = HashMap::new();
        let mut by_id: HashMap<RecordId, Record> = HashMap::new();

        for record in records {
            for alias in &record.aliases {
                let claimants = aliases.entry(alias.clone()).or_default();
                if !claimants.contains(&record.id) {
                    claimants.push(record.id.clone());
                }
            }
            if let Some(previous) = by_id.insert(record.id.clone(), record) {
                warn!(id = %previous.id, "record identifier appears twice; keeping the later record");
            }
        }

        let mut sorted_ids: Vec<RecordId> = by_id.keys().cloned().collect();
        sorted_ids.sort();

        let duplicates = aliases.values().filter(|ids| ids.len() > 1).count();
        info!(
            records = sorted_ids.len(),
            aliases = aliases.len(),
            duplicate_aliases = duplicates,
            "built reference index"
        );

        Self {
            aliases,
            records: by_id,
            sorted_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.sorted_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_ids.is_empty()
    }

    /// All indexed identifiers in sorted order.
    pub fn ids(&self) -> &[RecordId] {
        &self.sorted_ids
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    /// Identifiers claiming an alias, in insertion order.
    pub fn alias_claimants(&self, alias: &str) -> &[RecordId] {
        self.aliases.get(alias).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Aliases claimed by more than one record, sorted by alias.
    pub fn duplicate_aliases(&self) -> Vec<(&str, &[RecordId])> {
        let mut dups: Vec<(&str, &[RecordId])> = self
            .aliases
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(alias, ids)| (alias.as_str(), ids.as_slice()))
            .collect();
        dups.sort_by(|a, b| a.0.cmp(b.0));
        dups
    }

    /// Resolve an `@alias`, `@identifier`, or `@identifier-prefix`.
    ///
    /// Lookup order:
    /// 1. Alias map (exactly one claimant, else `DuplicateAlias`)
    /// 2. Exact identifier, case-insensitively
    /// 3. Unique identifier prefix, case-insensitively
    pub fn resolve(&self, reference: &str) -> Result<Resolution, ResolveError> {
        let bare = reference.strip_prefix('@').unwrap_or(reference);

        // 1. Alias.
        if let Some(ids) = self.aliases.get(bare) {
            return match ids.as_slice() {
                [only] => {
                    debug!(reference = bare, id = %only, "resolved by alias");
                    Ok(Resolution {
                        id: only.clone(),
                        matched_by: MatchKind::Alias,
                    })
                }
                _ => Err(ResolveError::DuplicateAlias {
                    alias: bare.to_string(),
                    candidates: ids.clone(),
                }),
            };
        }

        // 2. Exact identifier.
        if let Ok(id) = RecordId::parse(bare) {
            if self.records.contains_key(&id) {
                debug!(reference = bare, "resolved by exact id");
                return Ok(Resolution {
                    id,
                    matched_by: MatchKind::ExactId,
                });
            }
        }

        // 3. Identifier prefix.
        let upper = bare.to_ascii_uppercase();
        let matches = self.prefix_matches(&upper);
        match matches {
            [] => Err(ResolveError::NotFound {
                reference: bare.to_string(),
            }),
            [only] => {
                debug!(reference = bare, id = %only, "resolved by id prefix");
                Ok(Resolution {
                    id: only.clone(),
                    matched_by: MatchKind::IdPrefix,
                })
            }
            many => Err(ResolveError::Ambiguous {
                reference: bare.to_string(),
                candidates: many.to_vec(),
            }),
        }
    }

    /// Resolve a reference straight to its record.
    pub fn lookup(&self, reference: &str) -> Result<&Record, ResolveError> {
        let resolution = self.resolve(reference)?;
        self.records
            .get(&resolution.id)
            .ok_or_else(|| ResolveError::NotFound {
                reference: reference.trim_start_matches('@').to_string(),
            })
    }

    /// Shortest prefix of `id`, at least `min_length` long, that matches
    /// exactly one indexed identifier. Falls back to the full identifier.
    pub fn shortest_unique_prefix(&self, id: &str, min_length: usize) -> String {
        let upper = id.to_ascii_uppercase();
        for len in min_length..upper.len() {
            let Some(prefix) = upper.get(..len) else {
                break;
            };
            if self.prefix_matches(prefix).len() == 1 {
                return prefix.to_string();
            }
        }
        upper
    }

    /// Check that none of `proposed` is already claimed by a record other
    /// than `exclude`. Fails on the first alias in iteration order.
    pub fn check_alias_uniqueness<'a>(
        &self,
        proposed: impl IntoIterator<Item = &'a str>,
        exclude: Option<&RecordId>,
    ) -> Result<(), AliasError> {
        for alias in proposed {
            let conflicting = self
                .alias_claimants(alias)
                .iter()
                .find(|id| Some(*id) != exclude);
            if let Some(existing) = conflicting {
                return Err(AliasError::Taken {
                    alias: alias.to_string(),
                    existing: existing.clone(),
                });
            }
        }
        Ok(())
    }

    /// Sorted identifiers starting with an upper-cased prefix.
    fn prefix_matches(&self, upper_prefix: &str) -> &[RecordId] {
        let start = self
            .sorted_ids
            .partition_point(|id| id.as_str() < upper_prefix);
        let len = self.sorted_ids[start..]
            .iter()
            .take_while(|id| id.as_str().starts_with(upper_prefix))
            .count();
        &self.sorted_ids[start..start + len]
    }
}
