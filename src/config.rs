//! Configuration layering.
//!
//! Every request is configured from three [`ConfigLayer`]s merged in order
//! (library defaults, instance overrides, call settings) plus the visitor
//! identity in [`VisitorMeta`], which instance overrides may replace but
//! call settings may not.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RecommendationsError, Result};
use crate::transport::Protocol;

/// Default REST endpoint; the tracking id is appended to it.
pub const DEFAULT_REST_URL: &str = "https://recs.qubit.com/vc/recommend/2.0/";

/// Default GraphQL endpoint.
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.qubit.com/graphql";

/// Base trait for configuration types.
pub trait Config: Send + Sync {
    /// Returns the configuration name/identifier.
    fn name(&self) -> &str {
        "default"
    }

    /// Returns the timeout duration, if configured.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Validates the configuration.
    ///
    /// Returns Ok(()) if valid, or an error message describing the issue.
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Trait for configurations that can be merged.
pub trait MergeableConfig: Config {
    /// Merge another configuration into this one.
    ///
    /// Values from `other` override values in `self` where applicable.
    fn merge(&mut self, other: &Self);

    /// Create a new configuration by merging two configurations.
    fn merged(base: &Self, overlay: &Self) -> Self
    where
        Self: Clone,
    {
        let mut result = base.clone();
        result.merge(overlay);
        result
    }
}

/// One layer of request configuration. Unset fields defer to lower layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigLayer {
    /// Backend ranking algorithm, e.g. `pop`
    pub strategy: Option<String>,
    /// Number of items requested
    pub limit: Option<u32>,
    /// Raw seed input: an id, a `{ "category": .. }` object, an array of
    /// both, or the string `all`
    pub seed: Option<Value>,
    /// Network timeout in milliseconds; zero means none
    #[serde(rename = "timeout")]
    pub timeout_ms: Option<u64>,
    /// Opaque re-ranking rules, forwarded verbatim
    pub rules: Option<Value>,
    pub url: Option<String>,
    pub default_language: Option<String>,
    pub default_currency: Option<String>,
    /// Explicit language, beating anything the event stream reports
    pub language: Option<String>,
    /// Explicit currency, beating anything the event stream reports
    pub currency: Option<String>,
    /// Identity replacing [`VisitorMeta`] values. Honoured on instance
    /// overrides only; call settings cannot change identity.
    pub tracking_id: Option<String>,
    pub visitor_id: Option<String>,
    pub experience_id: Option<String>,
    pub iteration_id: Option<String>,
    pub variation_id: Option<String>,
}

/// Instance-level overrides passed at construction.
pub type Overrides = ConfigLayer;

/// Per-call settings passed to `get`.
pub type Settings = ConfigLayer;

impl ConfigLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library defaults for the given protocol.
    pub fn defaults(protocol: Protocol) -> Self {
        let url = match protocol {
            Protocol::Rest => DEFAULT_REST_URL,
            Protocol::Graphql => DEFAULT_GRAPHQL_URL,
        };
        Self {
            strategy: Some("pop".to_string()),
            limit: Some(10),
            seed: Some(Value::String("all".to_string())),
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_seed(mut self, seed: impl Into<Value>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn with_rules(mut self, rules: impl Into<Value>) -> Self {
        self.rules = Some(rules.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = Some(language.into());
        self
    }

    pub fn with_default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = Some(currency.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_tracking_id(mut self, id: impl Into<String>) -> Self {
        self.tracking_id = Some(id.into());
        self
    }

    pub fn with_visitor_id(mut self, id: impl Into<String>) -> Self {
        self.visitor_id = Some(id.into());
        self
    }

    pub fn with_experience_id(mut self, id: impl Into<String>) -> Self {
        self.experience_id = Some(id.into());
        self
    }

    pub fn with_iteration_id(mut self, id: impl Into<String>) -> Self {
        self.iteration_id = Some(id.into());
        self
    }

    pub fn with_variation_id(mut self, id: impl Into<String>) -> Self {
        self.variation_id = Some(id.into());
        self
    }

    fn sets_identity(&self) -> bool {
        self.tracking_id.is_some()
            || self.visitor_id.is_some()
            || self.experience_id.is_some()
            || self.iteration_id.is_some()
            || self.variation_id.is_some()
    }
}

impl Config for ConfigLayer {
    fn timeout(&self) -> Option<Duration> {
        self.timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

/// Zero, empty and null values defer to the lower layer like unset ones.
impl MergeableConfig for ConfigLayer {
    fn merge(&mut self, other: &Self) {
        fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                slot.clone_from(value);
            }
        }

        fn overlay_set<T: Clone>(slot: &mut Option<T>, value: &Option<T>, is_set: fn(&T) -> bool) {
            if value.as_ref().is_some_and(is_set) {
                slot.clone_from(value);
            }
        }

        overlay_set(&mut self.strategy, &other.strategy, |s| !s.is_empty());
        overlay_set(&mut self.limit, &other.limit, |n| *n > 0);
        overlay_set(&mut self.seed, &other.seed, |v| !v.is_null() && v.as_str() != Some(""));
        overlay_set(&mut self.timeout_ms, &other.timeout_ms, |ms| *ms > 0);
        overlay(&mut self.rules, &other.rules);
        overlay(&mut self.url, &other.url);
        overlay(&mut self.default_language, &other.default_language);
        overlay(&mut self.default_currency, &other.default_currency);
        overlay(&mut self.language, &other.language);
        overlay(&mut self.currency, &other.currency);
        overlay(&mut self.tracking_id, &other.tracking_id);
        overlay(&mut self.visitor_id, &other.visitor_id);
        overlay(&mut self.experience_id, &other.experience_id);
        overlay(&mut self.iteration_id, &other.iteration_id);
        overlay(&mut self.variation_id, &other.variation_id);
    }
}

/// Visitor identity supplied by the host page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisitorMeta {
    pub tracking_id: String,
    pub visitor_id: Option<String>,
    pub experience_id: Option<String>,
    pub iteration_id: Option<String>,
    pub variation_id: Option<String>,
}

impl VisitorMeta {
    pub fn new(tracking_id: impl Into<String>) -> Self {
        Self {
            tracking_id: tracking_id.into(),
            ..Self::default()
        }
    }

    pub fn with_visitor_id(mut self, id: impl Into<String>) -> Self {
        self.visitor_id = Some(id.into());
        self
    }

    pub fn with_experience_id(mut self, id: impl Into<String>) -> Self {
        self.experience_id = Some(id.into());
        self
    }

    pub fn with_iteration_id(mut self, id: impl Into<String>) -> Self {
        self.iteration_id = Some(id.into());
        self
    }

    pub fn with_variation_id(mut self, id: impl Into<String>) -> Self {
        self.variation_id = Some(id.into());
        self
    }
}

/// Fully resolved configuration for a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub strategy: String,
    pub limit: u32,
    pub seed: Value,
    pub timeout: Option<Duration>,
    pub rules: Option<Value>,
    pub url: String,
    pub tracking_id: String,
    pub visitor_id: Option<String>,
    pub experience_id: Option<String>,
    pub iteration_id: Option<String>,
    pub variation_id: Option<String>,
    pub default_language: Option<String>,
    pub default_currency: Option<String>,
    pub language: Option<String>,
    pub currency: Option<String>,
}

impl Config for EffectiveConfig {
    fn name(&self) -> &str {
        &self.tracking_id
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.tracking_id.is_empty() {
            Err("trackingId is required".to_string())
        } else {
            Ok(())
        }
    }
}

/// Merge the configuration layers into the configuration for one request.
///
/// Later layers win on collision. Identity fields come from `overrides`,
/// falling back to `meta`; identity in `settings` is ignored.
pub fn resolve(
    defaults: &ConfigLayer,
    overrides: &ConfigLayer,
    meta: &VisitorMeta,
    settings: &ConfigLayer,
) -> Result<EffectiveConfig> {
    let instance = ConfigLayer::merged(defaults, overrides);
    let mut layer = instance.clone();
    layer.merge(settings);
    if settings.sets_identity() {
        tracing::warn!("call settings cannot change visitor identity; ignoring");
    }
    let identity = |own: &Option<String>, fallback: &Option<String>| {
        own.clone().or_else(|| fallback.clone())
    };

    let timeout = layer.timeout();
    let config = EffectiveConfig {
        strategy: layer.strategy.unwrap_or_default(),
        limit: layer.limit.unwrap_or_default(),
        seed: layer.seed.unwrap_or(Value::Null),
        timeout,
        rules: layer.rules,
        url: layer.url.unwrap_or_default(),
        tracking_id: instance
            .tracking_id
            .clone()
            .unwrap_or_else(|| meta.tracking_id.clone()),
        visitor_id: identity(&instance.visitor_id, &meta.visitor_id),
        experience_id: identity(&instance.experience_id, &meta.experience_id),
        iteration_id: identity(&instance.iteration_id, &meta.iteration_id),
        variation_id: identity(&instance.variation_id, &meta.variation_id),
        default_language: layer.default_language,
        default_currency: layer.default_currency,
        language: layer.language,
        currency: layer.currency,
    };
    config
        .validate()
        .map_err(RecommendationsError::Configuration)?;

    tracing::trace!(tracking_id = %config.tracking_id, strategy = %config.strategy, limit = config.limit, "resolved request config");
    Ok(config)
}
