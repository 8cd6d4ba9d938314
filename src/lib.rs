//! # Recstratify
//!
//! **Recstratify** is the client-side retrieval layer for product
//! recommendation widgets. It turns a property configuration and per-call
//! settings into one backend request and normalizes the answer into a stable
//! item list.
//!
//! ## Overview
//!
//! A [`Recommendations::get`] call runs this pipeline:
//! - **Config**: library defaults, instance overrides and call settings are
//!   merged; visitor identity is fixed from [`VisitorMeta`]
//! - **Seed**: caller seed input is tagged as product or category references
//! - **Locale**: the visitor's `language-currency` locale is read from the
//!   first page-view event on the [`EventBus`], replaying history
//! - **Request**: a REST or GraphQL request is built for the configured
//!   [`Transport`]
//! - **Response**: the backend answer is reduced to a non-empty list of
//!   [`Item`]s, or fails with [`RecommendationsError::NoRecommendations`]
//!
//! ## Layer Structure
//!
//! ```text
//! Facade    - Recommendations (client.rs)
//! Pipeline  - config, seed, locale, request, response, reporter
//! SPI       - EventBus, RestTransport, GraphqlTransport, MetricSink
//! Common    - errors, Item, VisitorMeta
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use recstratify::prelude::*;
//!
//! let options = Options::new(
//!     VisitorMeta::new("my-store").with_visitor_id(visitor_id),
//!     bus,
//!     metrics,
//!     Transport::graphql(MyGraphqlClient::new()),
//! );
//! let recs = Recommendations::new(Some(options), Overrides::new())?;
//! let items = recs.get(Settings::new().with_strategy("engagement")).await?;
//! ```
//!
//! Nothing is cached between calls and failed calls are not retried.

mod bus;
mod client;
mod config;
mod error;
mod locale;
mod reporter;
mod request;
mod response;
mod seed;
mod transport;

pub mod prelude;

// Re-export core types
pub use bus::{
    BusEvent, EventBus, EventHandler, EventPattern, EventStream, MemoryEventBus, Subscription,
    VIEW_EVENT_PATTERN,
};
pub use client::{recommendations, Options, Recommendations};
pub use config::{
    resolve, Config, ConfigLayer, EffectiveConfig, MergeableConfig, Overrides, Settings,
    VisitorMeta, DEFAULT_GRAPHQL_URL, DEFAULT_REST_URL,
};
pub use error::{RecommendationsError, Result, TransportError, TransportResult};
pub use locale::{compose as compose_locale, resolve_locale, LocaleSources};
pub use reporter::{
    InteractionReporter, MetricSink, CLICKED_EVENT, CLICKED_METRIC, SHOWN_EVENT, SHOWN_METRIC,
};
pub use request::{build as build_request, Request, RECOMMENDATIONS_QUERY};
pub use response::{coerce_weight, normalize as normalize_response, Item, Response};
pub use seed::{normalize as normalize_seed, Seed, SeedRef, ALL_SEED};
pub use transport::{GraphqlTransport, Protocol, RestTransport, Transport, TransportOptions};

// Re-export async-trait for convenience
pub use async_trait::async_trait;
