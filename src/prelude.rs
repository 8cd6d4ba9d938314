//! Prelude module for convenient imports.
//!
//! ```rust
//! use recstratify::prelude::*;
//! ```

// Facade
pub use crate::client::{recommendations, Options, Recommendations};

// Configuration
pub use crate::config::{Config, ConfigLayer, MergeableConfig, Overrides, Settings, VisitorMeta};

// Collaborator interfaces
pub use crate::bus::{BusEvent, EventBus, EventPattern, MemoryEventBus, Subscription};
pub use crate::reporter::MetricSink;
pub use crate::transport::{GraphqlTransport, Protocol, RestTransport, Transport, TransportOptions};

// Results
pub use crate::response::Item;

// Errors
pub use crate::error::{RecommendationsError, Result, TransportError, TransportResult};

pub use async_trait::async_trait;
