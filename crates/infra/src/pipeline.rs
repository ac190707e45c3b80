//! Aggregation pipelines.
//!
//! A [`Pipeline`] is a list of [`Stage`]s run over the rows of a source
//! collection. Joins (`Lookup`) need a store round-trip and are executed by
//! [`crate::ScopedStore::aggregate`]; every other stage is a pure row transform
//! implemented here.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::{Filter, SortOrder, document::sort_rows};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Match(Filter),
    /// Attach matching rows of `from` (where `foreign_field == row[local_field]`)
    /// as an array under `as_field`.
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },
    Sort(Vec<(String, SortOrder)>),
    Skip(u64),
    Limit(u64),
    /// Keep only the listed fields (plus `id`).
    Project(Vec<String>),
    /// Collapse the rows into a single `{field: <count>}` row.
    Count(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn matching(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    pub fn lookup(
        self,
        from: impl Into<String>,
        local_field: impl Into<String>,
        foreign_field: impl Into<String>,
        as_field: impl Into<String>,
    ) -> Self {
        self.stage(Stage::Lookup {
            from: from.into(),
            local_field: local_field.into(),
            foreign_field: foreign_field.into(),
            as_field: as_field.into(),
        })
    }

    /// Leading `Match` stages, folded into one filter so they can be pushed into
    /// the source scan, and the index of the first remaining stage.
    pub fn source_filter(&self) -> (Filter, usize) {
        let mut filter = Filter::All;
        let mut idx = 0;
        while let Some(Stage::Match(f)) = self.stages.get(idx) {
            filter = filter.and(f.clone());
            idx += 1;
        }
        (filter, idx)
    }
}

/// Apply a non-join stage.
///
/// Returns `None` for `Lookup`, which the caller must execute.
pub fn apply_local(stage: &Stage, mut rows: Vec<Row>) -> Option<Vec<Row>> {
    let out = match stage {
        Stage::Match(filter) => rows.into_iter().filter(|r| filter.matches_map(r)).collect(),
        Stage::Sort(keys) => {
            sort_rows(&mut rows, keys, |r, f| r.get(f).cloned());
            rows
        }
        Stage::Skip(n) => rows.into_iter().skip(*n as usize).collect(),
        Stage::Limit(n) => rows.into_iter().take(*n as usize).collect(),
        Stage::Project(fields) => rows
            .into_iter()
            .map(|r| {
                r.into_iter()
                    .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
                    .collect()
            })
            .collect(),
        Stage::Count(field) => {
            let mut row = Map::new();
            row.insert(field.clone(), Value::from(rows.len() as u64));
            vec![row]
        }
        Stage::Lookup { .. } => return None,
    };
    Some(out)
}

/// Distinct non-null values of `field` across `rows`, for the join fetch.
pub fn join_keys(rows: &[Row], field: &str) -> Vec<Value> {
    let mut keys: Vec<Value> = Vec::new();
    for row in rows {
        match row.get(field) {
            None | Some(Value::Null) => {}
            Some(Value::Array(items)) => {
                for item in items {
                    if !keys.contains(item) {
                        keys.push(item.clone());
                    }
                }
            }
            Some(v) => {
                if !keys.contains(v) {
                    keys.push(v.clone());
                }
            }
        }
    }
    keys
}

/// Attach `foreign` rows to each row under `as_field`.
pub fn attach(
    rows: Vec<Row>,
    local_field: &str,
    foreign_field: &str,
    as_field: &str,
    foreign: &[Row],
) -> Vec<Row> {
    rows.into_iter()
        .map(|mut row| {
            let matched: Vec<Value> = match row.get(local_field) {
                None | Some(Value::Null) => Vec::new(),
                Some(local) => foreign
                    .iter()
                    .filter(|f| {
                        let key = f.get(foreign_field);
                        match local {
                            Value::Array(items) => key.is_some_and(|k| items.contains(k)),
                            v => key == Some(v),
                        }
                    })
                    .cloned()
                    .map(Value::Object)
                    .collect(),
            };
            row.insert(as_field.to_string(), Value::Array(matched));
            row
        })
        .collect()
}
