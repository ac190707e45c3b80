//! Document model and the filter language understood by every store.

use std::cmp::Ordering;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use pentrack_core::{RecordId, TenantId};

use super::StoreError;

/// Field name addressing [`Document::id`] in filters.
pub const ID_FIELD: &str = "id";

/// Field name addressing [`Document::tenant_id`] in filters.
pub const TENANT_FIELD: &str = "tenant_id";

/// A stored record.
///
/// `id` and `tenant_id` live outside the body so the store can index them;
/// filters still address them as ordinary fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: RecordId,
    pub tenant_id: Option<TenantId>,
    pub body: Map<String, Value>,
}

impl Document {
    pub fn new(tenant_id: Option<TenantId>, body: Map<String, Value>) -> Self {
        Self {
            id: RecordId::new(),
            tenant_id,
            body,
        }
    }

    /// Build a document from a typed record whose serialized form carries `id` and
    /// `tenant_id` at the top level.
    pub fn encode<T: Serialize>(record: &T) -> Result<Self, StoreError> {
        let Value::Object(mut body) = serde_json::to_value(record).map_err(StoreError::corrupt)?
        else {
            return Err(StoreError::Corrupt("record did not serialize to an object".to_string()));
        };

        let id = match body.remove(ID_FIELD) {
            Some(v) => serde_json::from_value(v).map_err(StoreError::corrupt)?,
            None => RecordId::new(),
        };
        let tenant_id = match body.remove(TENANT_FIELD) {
            Some(v) => serde_json::from_value(v).map_err(StoreError::corrupt)?,
            None => None,
        };

        Ok(Self { id, tenant_id, body })
    }

    /// Decode into a typed record (inverse of [`Document::encode`]).
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.to_map())).map_err(StoreError::corrupt)
    }

    /// Value of a field, with `id` and `tenant_id` synthesized.
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            ID_FIELD => Some(Value::String(self.id.to_string())),
            TENANT_FIELD => Some(
                self.tenant_id
                    .map(|t| Value::String(t.to_string()))
                    .unwrap_or(Value::Null),
            ),
            other => self.body.get(other).cloned(),
        }
    }

    /// Flat JSON view: body plus `id` and `tenant_id`.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.body.clone();
        map.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        map.insert(
            TENANT_FIELD.to_string(),
            self.field(TENANT_FIELD).unwrap_or(Value::Null),
        );
        map
    }

    pub fn matches(&self, filter: &Filter) -> bool {
        filter.matches(&|name| self.field(name))
    }

    /// Merge `patch` into the document. `tenant_id` moves the record, `id` is
    /// immutable.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), StoreError> {
        for (key, value) in patch {
            match key.as_str() {
                ID_FIELD => return Err(StoreError::Invalid("id is immutable".to_string())),
                TENANT_FIELD => {
                    self.tenant_id =
                        serde_json::from_value(value.clone()).map_err(StoreError::corrupt)?;
                }
                _ => {
                    self.body.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

/// JSON value for a tenant id as it appears in filters.
pub fn tenant_value(tenant_id: TenantId) -> Value {
    Value::String(tenant_id.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Filters
// ─────────────────────────────────────────────────────────────────────────────

/// Predicate over documents.
///
/// Equality against an array field matches when the array contains the value,
/// so `In("area_ids", set)` selects documents whose list intersects `set`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(field.into(), value.into())
    }

    pub fn id(id: RecordId) -> Self {
        Filter::Eq(ID_FIELD.to_string(), Value::String(id.to_string()))
    }

    pub fn tenant(tenant_id: TenantId) -> Self {
        Filter::Eq(TENANT_FIELD.to_string(), tenant_value(tenant_id))
    }

    pub fn any_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    /// Conjoin two filters, flattening nested `And`s and dropping `All`.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = Vec::new();
        for f in [self, other] {
            match f {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                f => parts.push(f),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    /// True when the filter requires `field == value` on every match, i.e. the
    /// equality appears at the top level or in a top-level conjunction.
    pub fn pins(&self, field: &str, value: &Value) -> bool {
        match self {
            Filter::Eq(f, v) => f == field && v == value,
            Filter::And(parts) => parts.iter().any(|p| p.pins(field, value)),
            _ => false,
        }
    }

    /// True when `field` is referenced anywhere in the filter.
    pub fn mentions(&self, field: &str) -> bool {
        match self {
            Filter::All => false,
            Filter::Eq(f, _) | Filter::In(f, _) => f == field,
            Filter::And(parts) | Filter::Or(parts) => parts.iter().any(|p| p.mentions(field)),
        }
    }

    pub fn matches(&self, get: &dyn Fn(&str) -> Option<Value>) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(field, target) => value_matches(get(field).as_ref(), target),
            Filter::In(field, targets) => {
                let actual = get(field);
                targets.iter().any(|t| value_matches(actual.as_ref(), t))
            }
            Filter::And(parts) => parts.iter().all(|p| p.matches(get)),
            Filter::Or(parts) => parts.iter().any(|p| p.matches(get)),
        }
    }

    pub fn matches_map(&self, row: &Map<String, Value>) -> bool {
        self.matches(&|name| row.get(name).cloned())
    }
}

fn value_matches(actual: Option<&Value>, target: &Value) -> bool {
    match (actual, target) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Array(items)), t) if !t.is_array() => items.contains(t),
        (Some(a), t) => a == t,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

/// Total order over JSON scalars used for sorting: null < bool < number < string,
/// arrays and objects last.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Sort rows in place by the given keys.
pub fn sort_rows<R>(rows: &mut [R], keys: &[(String, SortOrder)], get: impl Fn(&R, &str) -> Option<Value>) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (field, order) in keys {
            let ord = compare_values(get(a, field).as_ref(), get(b, field).as_ref());
            let ord = match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(body: Value) -> Document {
        let Value::Object(map) = body else { panic!("object") };
        Document::new(Some(TenantId::new()), map)
    }

    #[test]
    fn synthesized_fields_are_filterable() {
        let d = doc(json!({"name": "alpha"}));
        assert!(d.matches(&Filter::id(d.id)));
        assert!(d.matches(&Filter::tenant(d.tenant_id.unwrap())));
        assert!(!d.matches(&Filter::tenant(TenantId::new())));
    }

    #[test]
    fn in_intersects_array_fields() {
        let d = doc(json!({"area_ids": ["a", "b"]}));
        assert!(d.matches(&Filter::any_of("area_ids", ["b", "z"])));
        assert!(!d.matches(&Filter::any_of("area_ids", ["z"])));
        assert!(!d.matches(&Filter::In("area_ids".into(), vec![])));
    }

    #[test]
    fn null_matches_missing() {
        let d = doc(json!({}));
        assert!(d.matches(&Filter::equals("area_id", Value::Null)));
    }

    #[test]
    fn and_flattens_and_drops_all() {
        let a = Filter::equals("x", 1);
        let b = Filter::equals("y", 2);
        assert_eq!(Filter::All.and(a.clone()), a);
        let combined = a.clone().and(b.clone()).and(Filter::equals("z", 3));
        assert!(matches!(&combined, Filter::And(parts) if parts.len() == 3));
    }

    #[test]
    fn pins_only_top_level_conjunctions() {
        let t = TenantId::new();
        let v = tenant_value(t);
        assert!(Filter::tenant(t).pins(TENANT_FIELD, &v));
        assert!(Filter::equals("x", 1).and(Filter::tenant(t)).pins(TENANT_FIELD, &v));
        let either = Filter::Or(vec![Filter::tenant(t), Filter::equals("x", 1)]);
        assert!(!either.pins(TENANT_FIELD, &v));
        assert!(either.mentions(TENANT_FIELD));
    }

    #[test]
    fn encode_decode_lifts_id_and_tenant() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Rec {
            id: RecordId,
            tenant_id: Option<TenantId>,
            name: String,
        }

        let rec = Rec {
            id: RecordId::new(),
            tenant_id: Some(TenantId::new()),
            name: "n".into(),
        };
        let d = Document::encode(&rec).unwrap();
        assert_eq!(d.id, rec.id);
        assert_eq!(d.tenant_id, rec.tenant_id);
        assert!(!d.body.contains_key("id"));
        assert_eq!(d.decode::<Rec>().unwrap(), rec);
    }

    #[test]
    fn patch_rejects_id_change() {
        let mut d = doc(json!({"name": "a"}));
        let mut patch = Map::new();
        patch.insert("id".into(), json!(RecordId::new()));
        assert!(matches!(d.apply_patch(&patch), Err(StoreError::Invalid(_))));
    }
}
