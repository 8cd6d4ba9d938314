//! Backend request construction.

use serde_json::{json, Map, Value};

use crate::config::{Config, EffectiveConfig};
use crate::transport::{Protocol, TransportOptions};

/// Query document sent to the GraphQL backend.
///
/// Product fields are aliased to the snake_case names used by the REST
/// generation so both produce the same item details.
pub const RECOMMENDATIONS_QUERY: &str = r#"query (
  $trackingId: String!,
  $contextId: String!,
  $experienceId: ID,
  $items: Int!,
  $strategy: [RecommendationStrategyInput!],
  $seed: [RecommendationSeedInput!],
  $rules: [RecommendationRuleInput!],
  $locale: String
) {
  property(trackingId: $trackingId, locale: $locale) {
    visitor(contextId: $contextId) {
      productRecommendations(
        experienceId: $experienceId,
        items: $items,
        strategy: $strategy,
        seed: $seed,
        customRules: $rules
      ) {
        strategy
        weight
        product {
          product_id: productId
          sku_code: skuCode
          name
          url
          categories {
            name
          }
          images {
            url
          }
          views
          views_ip: viewsIp
          unit_sale_price: unitSalePrice
          unit_price: unitPrice
          currency
          language
          description
          stock
          additionalFields
        }
      }
    }
  }
}"#;

/// A request ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Rest {
        url: String,
        body: String,
        options: TransportOptions,
    },
    Graphql {
        query: &'static str,
        variables: Value,
        options: TransportOptions,
    },
}

impl Request {
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Rest { .. } => Protocol::Rest,
            Self::Graphql { .. } => Protocol::Graphql,
        }
    }
}

/// Build the backend request for `protocol`.
///
/// `seed` must already be normalized for the same protocol.
pub fn build(
    protocol: Protocol,
    config: &EffectiveConfig,
    seed: Value,
    locale: &str,
) -> Request {
    match protocol {
        Protocol::Rest => Request::Rest {
            url: rest_url(config, locale),
            body: rest_body(config, seed).to_string(),
            options: TransportOptions {
                timeout: config.timeout(),
                url: None,
            },
        },
        Protocol::Graphql => Request::Graphql {
            query: RECOMMENDATIONS_QUERY,
            variables: graphql_variables(config, seed, locale),
            options: TransportOptions {
                timeout: config.timeout(),
                url: Some(config.url.clone()),
            },
        },
    }
}

/// Values are inserted as given, without percent-encoding.
fn rest_url(config: &EffectiveConfig, locale: &str) -> String {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    format!(
        "{url}{tracking}?strategy={strategy}&id={visitor}&n={limit}&experienceId={experience}&iterationId={iteration}&variationId={variation}&locale={locale}",
        url = config.url,
        tracking = config.tracking_id,
        strategy = config.strategy,
        visitor = opt(&config.visitor_id),
        limit = config.limit,
        experience = opt(&config.experience_id),
        iteration = opt(&config.iteration_id),
        variation = opt(&config.variation_id),
    )
}

fn rest_body(config: &EffectiveConfig, seed: Value) -> Value {
    let mut body = Map::new();
    body.insert("h".to_string(), seed);
    if let Some(rules) = &config.rules {
        body.insert("rules".to_string(), rules.clone());
    }
    Value::Object(body)
}

fn graphql_variables(config: &EffectiveConfig, seed: Value, locale: &str) -> Value {
    json!({
        "trackingId": config.tracking_id,
        "contextId": config.visitor_id,
        "experienceId": config.experience_id,
        "items": config.limit,
        "strategy": [{ "name": config.strategy }],
        "seed": seed,
        "rules": config.rules,
        "locale": locale,
    })
}
