//! Response normalization.
//!
//! Both backend generations are reduced to the same flat [`Item`] list. A
//! response that yields no items fails with
//! [`RecommendationsError::NoRecommendations`]; partial results are never
//! returned. REST items are otherwise passed through as delivered, whatever
//! the shape of their fields.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{RecommendationsError, Result};

/// A single recommendation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub id: Value,
    #[serde(
        default,
        deserialize_with = "lenient_weight",
        skip_serializing_if = "Option::is_none"
    )]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub strategy: Value,
    /// Every product field the backend returned
    #[serde(default, deserialize_with = "lenient_details")]
    pub details: Map<String, Value>,
    /// Any other top-level keys, kept as delivered
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_weight<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_weight(&value))
}

fn lenient_details<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(details) => Ok(details),
        _ => Ok(Map::new()),
    }
}

impl Item {
    /// Item for a REST element that is not an object.
    fn bare(id: Value) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

/// Raw backend response.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Response body text, if the backend sent one
    Rest(Option<String>),
    /// Decoded GraphQL result
    Graphql(Value),
}

/// Validate and reshape a backend response.
pub fn normalize(response: Response) -> Result<Vec<Item>> {
    let items = match response {
        Response::Rest(body) => normalize_rest(body.as_deref()),
        Response::Graphql(value) => normalize_graphql(value),
    };
    match items {
        Some(items) if !items.is_empty() => Ok(items),
        _ => {
            tracing::debug!("backend response carried no usable recommendations");
            Err(RecommendationsError::NoRecommendations)
        }
    }
}

fn normalize_rest(body: Option<&str>) -> Option<Vec<Item>> {
    let body = body.filter(|b| !b.trim().is_empty())?;
    let mut value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "unparsable recommendations response");
            return None;
        }
    };
    let items = value.pointer_mut("/result/items")?.as_array_mut()?;
    let items = items
        .drain(..)
        .map(|item| serde_json::from_value(item.clone()).unwrap_or_else(|_| Item::bare(item)))
        .collect();
    Some(items)
}

fn normalize_graphql(mut value: Value) -> Option<Vec<Item>> {
    let recs = value
        .pointer_mut("/data/property/visitor/productRecommendations")?
        .as_array_mut()?;
    recs.drain(..).map(flatten_recommendation).collect()
}

fn flatten_recommendation(entry: Value) -> Option<Item> {
    let Value::Object(mut entry) = entry else {
        return None;
    };
    let Some(Value::Object(mut details)) = entry.remove("product") else {
        return None;
    };

    pluck_each(&mut details, "images", "url");
    pluck_each(&mut details, "categories", "name");
    if let Some(Value::Object(additional)) = details.remove("additionalFields") {
        details.extend(additional);
    }

    let weight = entry.remove("weight").and_then(|w| coerce_weight(&w));
    let strategy = entry.remove("strategy").unwrap_or(Value::Null);
    entry.remove("id");

    Some(Item {
        id: details.get("product_id").cloned().unwrap_or(Value::Null),
        weight,
        strategy,
        details,
        extra: entry,
    })
}

/// Replace `[{ key: x }, ..]` under `field` with `[x, ..]`.
fn pluck_each(details: &mut Map<String, Value>, field: &str, key: &str) {
    if let Some(Value::Array(entries)) = details.get_mut(field) {
        for entry in entries.iter_mut() {
            if let Some(inner) = entry.get_mut(key).map(Value::take) {
                *entry = inner;
            }
        }
    }
}

/// Coerce a weight to a number.
///
/// Accepts numbers and numeric strings in either `1,234.56` or `1.234,56`
/// form. Returns `None` for anything else.
pub fn coerce_weight(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_localized_number(s),
        _ => None,
    }
}

fn parse_localized_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if dot > comma => s.replace(',', ""),
        (Some(_), Some(_)) => s.replace('.', "").replace(',', "."),
        (None, Some(comma)) => {
            let integer = s[..comma].trim_start_matches(['-', '+']);
            let decimals = s.len() - comma - 1;
            if s.matches(',').count() == 1 && (decimals != 3 || integer == "0") {
                s.replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (Some(_), None) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.to_string(),
    };
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn graphql(recs: Value) -> Response {
        Response::Graphql(json!({
            "data": { "property": { "visitor": { "productRecommendations": recs } } }
        }))
    }

    #[test]
    fn test_coerce_weight() {
        assert_eq!(coerce_weight(&json!(0.5)), Some(0.5));
        assert_eq!(coerce_weight(&json!("0.9")), Some(0.9));
        assert_eq!(coerce_weight(&json!("1,234.56")), Some(1234.56));
        assert_eq!(coerce_weight(&json!("1.234,56")), Some(1234.56));
        assert_eq!(coerce_weight(&json!("0,75")), Some(0.75));
        assert_eq!(coerce_weight(&json!("0,750")), Some(0.75));
        assert_eq!(coerce_weight(&json!("1,234")), Some(1234.0));
        assert_eq!(coerce_weight(&json!("1.234.567")), Some(1234567.0));
        assert_eq!(coerce_weight(&json!(" 12 ")), Some(12.0));
        assert_eq!(coerce_weight(&json!("heavy")), None);
        assert_eq!(coerce_weight(&json!("")), None);
        assert_eq!(coerce_weight(&json!(null)), None);
    }

    #[test]
    fn test_rest_items_returned_as_delivered() {
        let body = json!({
            "result": {
                "items": [
                    { "id": "A", "weight": "0.9", "strategy": "pop", "details": { "name": "Shoe" } },
                    { "id": "B", "weight": 0.4, "strategy": "pop", "details": {}, "rank": 2 }
                ]
            }
        })
        .to_string();

        let items = normalize(Response::Rest(Some(body))).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, json!("A"));
        assert_eq!(items[0].weight, Some(0.9));
        assert_eq!(items[0].details["name"], json!("Shoe"));
        assert_eq!(items[1].extra["rank"], json!(2));
    }

    #[test]
    fn test_rest_items_with_odd_fields_pass_through() {
        let body = json!({
            "result": {
                "items": [
                    { "id": "A", "details": null },
                    { "id": "B", "strategy": 7, "weight": "n/a" },
                    { "id": "C", "details": [] },
                    "D",
                    42
                ]
            }
        })
        .to_string();

        let items = normalize(Response::Rest(Some(body))).unwrap();
        assert_eq!(items.len(), 5);
        assert_eq!(items[0].id, json!("A"));
        assert!(items[0].details.is_empty());
        assert_eq!(items[1].strategy, json!(7));
        assert_eq!(items[1].weight, None);
        assert!(items[2].details.is_empty());
        assert_eq!(items[3].id, json!("D"));
        assert_eq!(items[4].id, json!(42));
    }

    #[test]
    fn test_rest_failures() {
        for body in [
            None,
            Some(String::new()),
            Some("not json".to_string()),
            Some(json!({ "result": {} }).to_string()),
            Some(json!({ "result": { "items": [] } }).to_string()),
            Some(json!({ "result": { "items": {} } }).to_string()),
        ] {
            let err = normalize(Response::Rest(body)).unwrap_err();
            assert_eq!(err, RecommendationsError::NoRecommendations);
        }
    }

    #[test]
    fn test_graphql_flattening() {
        let response = graphql(json!([{
            "strategy": "pop",
            "weight": 0.8,
            "product": {
                "product_id": "P1",
                "name": "Dress",
                "images": [{ "url": "a.jpg" }, { "url": "b.jpg" }],
                "categories": [{ "name": "Women" }, { "name": "Dresses" }],
                "additionalFields": { "gender": "women" }
            }
        }]));

        let items = normalize(response).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, json!("P1"));
        assert_eq!(item.weight, Some(0.8));
        assert_eq!(item.strategy, json!("pop"));
        assert_eq!(item.details["gender"], json!("women"));
        assert!(!item.details.contains_key("additionalFields"));
        assert_eq!(item.details["images"], json!(["a.jpg", "b.jpg"]));
        assert_eq!(item.details["categories"], json!(["Women", "Dresses"]));
        assert!(!item.extra.contains_key("product"));

        let flat = serde_json::to_value(item).unwrap();
        assert!(flat.get("product").is_none());
        assert_eq!(flat["details"]["name"], json!("Dress"));
    }

    #[test]
    fn test_graphql_failures() {
        for response in [
            graphql(json!([])),
            graphql(json!(null)),
            Response::Graphql(json!({ "data": null })),
            Response::Graphql(Value::Null),
            graphql(json!(["bad"])),
            graphql(json!([{ "product_id": "P1", "strategy": "pop" }])),
            graphql(json!([
                { "product": { "product_id": "P1" } },
                { "strategy": "pop", "product": null }
            ])),
        ] {
            assert_eq!(
                normalize(response).unwrap_err().code(),
                "NO_RECOMMENDATIONS"
            );
        }
    }
}
