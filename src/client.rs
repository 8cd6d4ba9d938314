//! Recommendations client: the consumer entry point.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::bus::EventBus;
use crate::config::{resolve, ConfigLayer, Overrides, Settings, VisitorMeta};
use crate::error::{RecommendationsError, Result};
use crate::locale::{resolve_locale, LocaleSources};
use crate::reporter::{InteractionReporter, MetricSink};
use crate::request::{self, Request};
use crate::response::{self, Item, Response};
use crate::seed;
use crate::transport::{Protocol, Transport};

/// Collaborators and identity supplied by the host page.
#[derive(Clone)]
pub struct Options {
    pub meta: VisitorMeta,
    pub event_bus: Arc<dyn EventBus>,
    pub metrics: Arc<dyn MetricSink>,
    pub transport: Transport,
}

impl Options {
    pub fn new(
        meta: VisitorMeta,
        event_bus: Arc<dyn EventBus>,
        metrics: Arc<dyn MetricSink>,
        transport: Transport,
    ) -> Self {
        Self {
            meta,
            event_bus,
            metrics,
            transport,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("meta", &self.meta)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// A configured recommendations widget backend.
///
/// Instances share no mutable state; each [`get`](Self::get) call resolves
/// its own configuration and locale.
///
/// # Example
///
/// ```rust,ignore
/// let recs = Recommendations::new(Some(options), Overrides::new().with_limit(6))?;
/// let items = recs.get(Settings::new().with_seed("ABC123")).await?;
/// for item in &items {
///     recs.shown(item);
/// }
/// ```
pub struct Recommendations {
    meta: VisitorMeta,
    event_bus: Arc<dyn EventBus>,
    transport: Transport,
    reporter: InteractionReporter,
    defaults: ConfigLayer,
    overrides: Overrides,
}

impl Recommendations {
    /// Create an instance.
    ///
    /// Fails immediately if `options` is missing or carries no tracking id.
    pub fn new(options: Option<Options>, overrides: Overrides) -> Result<Self> {
        let options = options.ok_or_else(|| {
            RecommendationsError::Configuration("No `options` object passed".to_string())
        })?;
        let tracking_id = overrides
            .tracking_id
            .as_deref()
            .unwrap_or(&options.meta.tracking_id);
        if tracking_id.is_empty() {
            return Err(RecommendationsError::Configuration(
                "`meta.trackingId` is required".to_string(),
            ));
        }

        let protocol = options.transport.protocol();
        tracing::debug!(tracking_id, %protocol, "created recommendations instance");
        Ok(Self {
            reporter: InteractionReporter::new(Arc::clone(&options.event_bus), options.metrics),
            meta: options.meta,
            event_bus: options.event_bus,
            transport: options.transport,
            defaults: ConfigLayer::defaults(protocol),
            overrides,
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.transport.protocol()
    }

    /// Fetch recommendations.
    ///
    /// Waits for the visitor locale first; see [`resolve_locale`].
    pub async fn get(&self, settings: Settings) -> Result<Vec<Item>> {
        let protocol = self.protocol();
        let config = resolve(&self.defaults, &self.overrides, &self.meta, &settings)?;
        let seed = seed::normalize(&config.seed, protocol);
        let locale = resolve_locale(self.event_bus.as_ref(), LocaleSources::from(&config)).await;
        let request = request::build(protocol, &config, seed, &locale);

        tracing::debug!(%protocol, strategy = %config.strategy, limit = config.limit, locale = %locale, "requesting recommendations");
        let response = self.send(request).await?;
        let items = response::normalize(response)?;
        tracing::debug!(count = items.len(), "received recommendations");
        Ok(items)
    }

    async fn send(&self, request: Request) -> Result<Response> {
        match (&self.transport, request) {
            (Transport::Rest(client), Request::Rest { url, body, options }) => {
                let body = client.post(&url, &body, &options).await?;
                Ok(Response::Rest(body))
            }
            (Transport::Graphql(client), Request::Graphql { query, variables, options }) => {
                let value = client.query(query, &variables, &options).await?;
                Ok(Response::Graphql(value))
            }
            (transport, request) => Err(RecommendationsError::Configuration(format!(
                "{} request cannot be sent over a {} transport",
                request.protocol(),
                transport.protocol()
            ))),
        }
    }

    /// Report that `item` was displayed.
    pub fn shown<T: Serialize + ?Sized>(&self, item: &T) {
        self.reporter.shown(item);
    }

    /// Report that `item` was clicked.
    pub fn clicked<T: Serialize + ?Sized>(&self, item: &T) {
        self.reporter.clicked(item);
    }
}

impl fmt::Debug for Recommendations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recommendations")
            .field("meta", &self.meta)
            .field("protocol", &self.protocol())
            .field("overrides", &self.overrides)
            .finish()
    }
}

/// Shorthand for [`Recommendations::new`].
pub fn recommendations(options: Option<Options>, overrides: Overrides) -> Result<Recommendations> {
    Recommendations::new(options, overrides)
}
