//! Plain key-value document model shared by the store adapters.
//!
//! Records travel between the access layer and the durable store as JSON
//! objects. [`Filter`] and [`Update`] carry the small subset of document-store
//! semantics the access layer relies on: equality lookups, "array does not
//! contain" guards, and `$set` / `$setOnInsert` / `$addToSet` / `$pull`
//! modifications. Adapters translate them to their native query language;
//! [`Filter::matches`] and [`Update::apply`] are the reference semantics used
//! by the in-memory adapter.

use serde_json::Value;

/// A stored document.
pub type Document = serde_json::Map<String, Value>;

// ============================================================================
// LOOKUPS
// ============================================================================

/// A natural-key lookup: one unique field and its value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lookup {
    field: &'static str,
    value: String,
}

impl Lookup {
    pub fn new(field: &'static str, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Equality filter selecting the record this lookup names.
    pub fn to_filter(&self) -> Filter {
        Filter::by(self.field, Value::String(self.value.clone()))
    }
}

impl std::fmt::Display for Lookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.field, self.value)
    }
}

// ============================================================================
// FILTERS
// ============================================================================

/// A single filter condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals value. A `null` value also matches a missing field.
    Eq { field: String, value: Value },
    /// Array field does not contain value (missing field matches).
    NotContains { field: String, value: Value },
}

/// Conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter with a single equality condition.
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::all().eq(field, value)
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn not_contains(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::NotContains {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Equality conditions, which seed a document inserted by an upsert.
    pub fn equalities(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.conditions.iter().filter_map(|c| match c {
            Condition::Eq { field, value } => Some((field.as_str(), value)),
            Condition::NotContains { .. } => None,
        })
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions.iter().all(|condition| match condition {
            Condition::Eq { field, value } => match doc.get(field) {
                Some(stored) => stored == value,
                None => value.is_null(),
            },
            Condition::NotContains { field, value } => match doc.get(field) {
                Some(Value::Array(items)) => !items.contains(value),
                Some(other) => other != value,
                None => true,
            },
        })
    }
}

// ============================================================================
// UPDATES
// ============================================================================

/// A set of field modifications applied atomically by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Update {
    set: Document,
    set_on_insert: Document,
    add_to_set: Document,
    pull: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Merge every field of `fields` into the `$set` part.
    pub fn set_all(mut self, fields: Document) -> Self {
        self.set.extend(fields);
        self
    }

    /// Field written only when the update inserts a new document.
    pub fn set_on_insert(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_on_insert.insert(field.into(), value.into());
        self
    }

    /// Insert-only defaults for every field this update does not already set.
    pub fn set_on_insert_missing(mut self, defaults: Document) -> Self {
        for (field, value) in defaults {
            if !self.set.contains_key(&field) {
                self.set_on_insert.entry(field).or_insert(value);
            }
        }
        self
    }

    pub fn add_to_set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_to_set.insert(field.into(), value.into());
        self
    }

    pub fn pull(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pull.insert(field.into(), value.into());
        self
    }

    pub fn set_fields(&self) -> &Document {
        &self.set
    }

    pub fn set_on_insert_fields(&self) -> &Document {
        &self.set_on_insert
    }

    pub fn add_to_set_fields(&self) -> &Document {
        &self.add_to_set
    }

    pub fn pull_fields(&self) -> &Document {
        &self.pull
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.set_on_insert.is_empty()
            && self.add_to_set.is_empty()
            && self.pull.is_empty()
    }

    /// Apply the modifications to `doc`. `inserted` is true when the document
    /// is being created by this update.
    pub fn apply(&self, doc: &mut Document, inserted: bool) {
        for (field, value) in &self.set {
            doc.insert(field.clone(), value.clone());
        }
        if inserted {
            for (field, value) in &self.set_on_insert {
                doc.insert(field.clone(), value.clone());
            }
        }
        for (field, value) in &self.add_to_set {
            let entry = doc
                .entry(field.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = entry {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }
        for (field, value) in &self.pull {
            if let Some(Value::Array(items)) = doc.get_mut(field) {
                items.retain(|item| item != value);
            }
        }
    }
}
