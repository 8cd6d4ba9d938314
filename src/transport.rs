//! Transport interfaces for the two backend protocol generations.
//!
//! The actual network call lives outside this crate. Embedders implement
//! [`RestTransport`] or [`GraphqlTransport`] and hand one of them to the
//! client wrapped in [`Transport`]; the variant chosen there fixes the
//! protocol for the lifetime of the instance.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportResult;

/// Backend protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// URL query string plus JSON body, JSON text response
    Rest,
    /// Fixed query document plus variables
    Graphql,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rest => write!(f, "rest"),
            Self::Graphql => write!(f, "graphql"),
        }
    }
}

/// Options forwarded opaquely to the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Caller-supplied timeout for the network call
    pub timeout: Option<Duration>,
    /// Endpoint for GraphQL queries
    pub url: Option<String>,
}

/// REST-style backend client.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// POST `body` to `url`, returning the raw response text if any.
    async fn post(
        &self,
        url: &str,
        body: &str,
        options: &TransportOptions,
    ) -> TransportResult<Option<String>>;
}

/// GraphQL-style backend client.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Execute `document` with `variables`, returning the decoded response.
    async fn query(
        &self,
        document: &str,
        variables: &Value,
        options: &TransportOptions,
    ) -> TransportResult<Value>;
}

/// The transport an instance talks to.
#[derive(Clone)]
pub enum Transport {
    Rest(Arc<dyn RestTransport>),
    Graphql(Arc<dyn GraphqlTransport>),
}

impl Transport {
    /// Wrap a REST transport.
    pub fn rest<T: RestTransport + 'static>(transport: T) -> Self {
        Self::Rest(Arc::new(transport))
    }

    /// Wrap a GraphQL transport.
    pub fn graphql<T: GraphqlTransport + 'static>(transport: T) -> Self {
        Self::Graphql(Arc::new(transport))
    }

    /// Protocol spoken by this transport.
    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Rest(_) => Protocol::Rest,
            Self::Graphql(_) => Protocol::Graphql,
        }
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transport").field(&self.protocol()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullRest;

    #[async_trait]
    impl RestTransport for NullRest {
        async fn post(
            &self,
            _url: &str,
            _body: &str,
            _options: &TransportOptions,
        ) -> TransportResult<Option<String>> {
            Ok(None)
        }
    }

    struct NullGraphql;

    #[async_trait]
    impl GraphqlTransport for NullGraphql {
        async fn query(
            &self,
            _document: &str,
            _variables: &Value,
            _options: &TransportOptions,
        ) -> TransportResult<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn test_protocol_follows_variant() {
        assert_eq!(Transport::rest(NullRest).protocol(), Protocol::Rest);
        assert_eq!(Transport::graphql(NullGraphql).protocol(), Protocol::Graphql);
        assert_eq!(format!("{:?}", Transport::rest(NullRest)), "Transport(Rest)");
    }
}
