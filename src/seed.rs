//! Seed normalization.
//!
//! Callers describe the basis for recommendations loosely: a product id, a
//! `{ "category": .. }` object, an array mixing both, or the marker `all`.
//! [`Seed::from_input`] turns that into an ordered list of tagged references
//! and [`Seed::encode`] renders it the way each backend generation expects.

use serde_json::{json, Value};

use crate::transport::Protocol;

/// Marker meaning "no seed filter".
pub const ALL_SEED: &str = "all";

/// A single tagged seed reference.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedRef {
    /// Product id, kept as supplied
    Product(Value),
    /// Category reference
    Category(Value),
}

impl SeedRef {
    fn from_element(element: &Value) -> Self {
        match element.get("category") {
            Some(category) if is_truthy(category) => Self::Category(category.clone()),
            _ => Self::Product(element.clone()),
        }
    }

    fn encode(&self, protocol: Protocol) -> Value {
        match (protocol, self) {
            (Protocol::Rest, Self::Product(id)) => id.clone(),
            (Protocol::Rest, Self::Category(id)) => json!({ "type": "c", "id": id }),
            (Protocol::Graphql, Self::Product(id)) => json!({ "type": "PRODUCT", "value": id }),
            (Protocol::Graphql, Self::Category(id)) => {
                json!({ "type": "CATEGORY", "value": id })
            }
        }
    }
}

/// Normalized seed.
#[derive(Debug, Clone, PartialEq)]
pub enum Seed {
    /// No seed constraint
    All,
    /// Ordered references; order affects backend tie-breaking
    Refs(Vec<SeedRef>),
}

impl Seed {
    /// Normalize raw caller input for `protocol`.
    ///
    /// Only the GraphQL backend understands the `all` marker; REST backends
    /// receive it as an ordinary product id.
    pub fn from_input(input: &Value, protocol: Protocol) -> Self {
        if protocol == Protocol::Graphql && input.as_str() == Some(ALL_SEED) {
            return Self::All;
        }
        let refs = match input {
            Value::Array(elements) => elements.iter().map(SeedRef::from_element).collect(),
            other => vec![SeedRef::from_element(other)],
        };
        Self::Refs(refs)
    }

    /// Wire representation for `protocol`.
    pub fn encode(&self, protocol: Protocol) -> Value {
        match self {
            Self::All => Value::Null,
            Self::Refs(refs) => Value::Array(refs.iter().map(|r| r.encode(protocol)).collect()),
        }
    }
}

/// Normalize and encode in one step.
pub fn normalize(input: &Value, protocol: Protocol) -> Value {
    Seed::from_input(input, protocol).encode(protocol)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
