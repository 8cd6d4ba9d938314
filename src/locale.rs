//! Visitor locale resolution.
//!
//! The locale is read from the first page-view event on the visitor event
//! bus, including events emitted before the request started (via replay).
//! It is resolved afresh for every request since the visitor may switch
//! language or currency mid-session.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::bus::{BusEvent, EventBus, EventHandler, EventPattern};
use crate::config::EffectiveConfig;

/// View types that never carry the page locale.
const IGNORED_VIEW_TYPES: [&str; 3] = ["basket", "checkout", "transaction"];

/// Inputs to locale resolution other than the event itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocaleSources {
    /// Explicit per-call language; beats the event
    pub language: Option<String>,
    /// Explicit per-call currency; beats the event
    pub currency: Option<String>,
    /// Used when neither the call nor the event supplies a language
    pub default_language: Option<String>,
    /// Used when neither the call nor the event supplies a currency
    pub default_currency: Option<String>,
}

impl From<&EffectiveConfig> for LocaleSources {
    fn from(config: &EffectiveConfig) -> Self {
        Self {
            language: config.language.clone(),
            currency: config.currency.clone(),
            default_language: config.default_language.clone(),
            default_currency: config.default_currency.clone(),
        }
    }
}

impl LocaleSources {
    /// Locale implied by `payload` under these sources.
    pub fn locale_for(&self, payload: &Value) -> String {
        let language = pick(&self.language, payload, "language", &self.default_language);
        let currency = pick(&self.currency, payload, "currency", &self.default_currency);
        compose(language, currency)
    }
}

fn pick<'a>(
    explicit: &'a Option<String>,
    payload: &'a Value,
    key: &str,
    fallback: &'a Option<String>,
) -> Option<&'a str> {
    non_empty(explicit.as_deref())
        .or_else(|| non_empty(payload.get(key).and_then(Value::as_str)))
        .or_else(|| non_empty(fallback.as_deref()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Join language and currency as `language-currency`, lowercased.
///
/// Either part alone is used as-is; neither gives an empty string.
pub fn compose(language: Option<&str>, currency: Option<&str>) -> String {
    let locale = match (language, currency) {
        (Some(language), Some(currency)) => format!("{language}-{currency}"),
        (Some(only), None) | (None, Some(only)) => only.to_string(),
        (None, None) => String::new(),
    };
    locale.to_lowercase()
}

fn carries_locale(event: &BusEvent) -> bool {
    match event.payload.get("type").and_then(Value::as_str) {
        Some(kind) => !IGNORED_VIEW_TYPES
            .iter()
            .any(|ignored| kind.eq_ignore_ascii_case(ignored)),
        None => true,
    }
}

/// Wait for the visitor's locale.
///
/// Subscribes to view events, replays history, and completes on the first
/// qualifying event. The subscription is released once resolved. There is
/// no timeout: if no qualifying event ever arrives this never completes.
pub async fn resolve_locale(bus: &dyn EventBus, sources: LocaleSources) -> String {
    let (tx, rx) = oneshot::channel::<String>();
    let slot = Arc::new(Mutex::new(Some(tx)));

    let handler: EventHandler = Arc::new(move |event: &BusEvent| {
        if !carries_locale(event) {
            return;
        }
        let sender = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(sender) = sender {
            let locale = sources.locale_for(&event.payload);
            tracing::debug!(event = %event.name, locale = %locale, "resolved visitor locale");
            let _ = sender.send(locale);
        }
    });

    let subscription = bus.subscribe(EventPattern::view(), handler);
    subscription.replay();

    let locale = match rx.await {
        Ok(locale) => locale,
        Err(_) => {
            tracing::warn!("event bus released the locale handler before any view event");
            std::future::pending::<String>().await
        }
    };
    drop(subscription);
    locale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MemoryEventBus;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_compose() {
        assert_eq!(compose(Some("en-gb"), Some("GBP")), "en-gb-gbp");
        assert_eq!(compose(None, Some("USD")), "usd");
        assert_eq!(compose(Some("FR"), None), "fr");
        assert_eq!(compose(None, None), "");
    }

    #[test]
    fn test_precedence() {
        let payload = json!({ "language": "en-gb", "currency": "GBP" });

        let sources = LocaleSources::default();
        assert_eq!(sources.locale_for(&payload), "en-gb-gbp");

        let sources = LocaleSources {
            currency: Some("EUR".into()),
            default_currency: Some("USD".into()),
            ..Default::default()
        };
        assert_eq!(sources.locale_for(&payload), "en-gb-eur");
        assert_eq!(sources.locale_for(&json!({})), "eur");

        let sources = LocaleSources {
            default_currency: Some("USD".into()),
            ..Default::default()
        };
        assert_eq!(sources.locale_for(&payload), "en-gb-gbp");
        assert_eq!(sources.locale_for(&json!({ "language": "de" })), "de-usd");
    }

    #[test]
    fn test_ignored_view_types() {
        for kind in ["basket", "Checkout", "TRANSACTION"] {
            let event = BusEvent::new("ecView", json!({ "type": kind }));
            assert!(!carries_locale(&event), "{kind} should be ignored");
        }
        assert!(carries_locale(&BusEvent::new("ecView", json!({ "type": "product" }))));
        assert!(carries_locale(&BusEvent::new("ecView", json!({}))));
    }

    #[tokio::test]
    async fn test_resolves_from_history() {
        let bus = MemoryEventBus::new();
        bus.emit("ecView", json!({ "language": "en-gb", "currency": "GBP" }));

        let locale = resolve_locale(&bus, LocaleSources::default()).await;
        assert_eq!(locale, "en-gb-gbp");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_first_qualifying_event_wins() {
        let bus = MemoryEventBus::new();
        bus.emit("ecView", json!({ "type": "basket", "currency": "EUR" }));
        bus.emit("ecView", json!({ "currency": "USD" }));
        bus.emit("ecView", json!({ "currency": "GBP" }));

        let locale = resolve_locale(&bus, LocaleSources::default()).await;
        assert_eq!(locale, "usd");
    }

    #[tokio::test]
    async fn test_waits_for_live_event() {
        let bus = MemoryEventBus::new();
        let emitter = bus.clone();
        let task = tokio::spawn(async move {
            resolve_locale(&emitter, LocaleSources::default()).await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_finished());
        bus.emit("trView", json!({ "language": "fr-fr", "currency": "EUR" }));

        assert_eq!(task.await.unwrap(), "fr-fr-eur");
    }

    #[tokio::test]
    async fn test_pending_without_event() {
        let bus = MemoryEventBus::new();
        bus.emit("qubit.metric", json!({}));

        let result = tokio::time::timeout(
            Duration::from_millis(20),
            resolve_locale(&bus, LocaleSources::default()),
        )
        .await;
        assert!(result.is_err());
    }
}
