//! Interaction reporting.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::bus::EventBus;
use crate::response::coerce_weight;

pub const SHOWN_EVENT: &str = "qubit.recommendationItemShown";
pub const CLICKED_EVENT: &str = "qubit.recommendationItemClicked";
pub const SHOWN_METRIC: &str = "recommendation.shown";
pub const CLICKED_METRIC: &str = "recommendation.clicked";

const SHOWN_FIELDS: &[&str] = &["id", "weight", "strategy"];
const CLICKED_FIELDS: &[&str] = &["id", "weight", "strategy", "position"];

/// Receiver for metric events.
pub trait MetricSink: Send + Sync {
    fn emit_metric(&self, name: &str, id: &Value, payload: &Value);
}

impl<F> MetricSink for F
where
    F: Fn(&str, &Value, &Value) + Send + Sync,
{
    fn emit_metric(&self, name: &str, id: &Value, payload: &Value) {
        self(name, id, payload)
    }
}

/// Reports impressions and clicks on the event bus and the metric sink.
#[derive(Clone)]
pub struct InteractionReporter {
    bus: Arc<dyn EventBus>,
    metrics: Arc<dyn MetricSink>,
}

impl InteractionReporter {
    pub fn new(bus: Arc<dyn EventBus>, metrics: Arc<dyn MetricSink>) -> Self {
        Self { bus, metrics }
    }

    /// Report that `item` was displayed.
    pub fn shown<T: Serialize + ?Sized>(&self, item: &T) {
        self.report(item, SHOWN_FIELDS, SHOWN_EVENT, SHOWN_METRIC);
    }

    /// Report that `item` was clicked. The item may carry a `position`.
    pub fn clicked<T: Serialize + ?Sized>(&self, item: &T) {
        self.report(item, CLICKED_FIELDS, CLICKED_EVENT, CLICKED_METRIC);
    }

    fn report<T: Serialize + ?Sized>(&self, item: &T, fields: &[&str], event: &str, metric: &str) {
        let payload = match serde_json::to_value(item) {
            Ok(value) => sanitize(&value, fields),
            Err(err) => {
                tracing::warn!(error = %err, event, "could not serialize recommendation item");
                Value::Object(Map::new())
            }
        };
        let id = payload.get("id").cloned().unwrap_or(Value::Null);
        self.bus.emit(event, payload.clone());
        self.metrics.emit_metric(metric, &id, &payload);
    }
}

/// Keep only `fields`, with `weight` coerced to a number.
fn sanitize(item: &Value, fields: &[&str]) -> Value {
    let mut picked = Map::new();
    for field in fields {
        if let Some(value) = item.get(*field) {
            picked.insert((*field).to_string(), value.clone());
        }
    }
    if let Some(weight) = picked.get_mut("weight") {
        *weight = coerce_weight(weight)
            .and_then(|w| serde_json::Number::from_f64(w).map(Value::Number))
            .unwrap_or(Value::Null);
    }
    Value::Object(picked)
}
