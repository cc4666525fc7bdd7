//! Call routing
//!
//! The [`Director`] is consulted for every method the proxy receives -
//! which is every method, since the proxy implements none of its own. It
//! decides whether the call is routable, copies the caller's metadata
//! verbatim into the outgoing request, and hands back a channel to the
//! backend.
//!
//! Connections are lazy: no I/O happens here, so a dead backend never
//! blocks routing - the dial failure surfaces on the call that first uses
//! the channel, as `Unavailable`.

use std::time::Duration;

use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;
use tracing::debug;

use crate::config::ProxyConfig;
use crate::credentials;
use crate::error::SiltaError;

/// Default connect timeout for backend dials (10 seconds)
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// A routing decision: where the call goes and what it carries
#[derive(Debug)]
pub struct Route {
    /// Outgoing metadata - the caller's metadata, copied unmodified
    pub metadata: MetadataMap,
    /// Channel to the backend the call is relayed over
    pub channel: Channel,
}

/// Routes unregistered methods to the backend
pub struct Director {
    endpoint: Endpoint,
    /// One process-wide channel when connection reuse is enabled.
    /// tonic serializes dialing inside the channel, so concurrent calls
    /// never race to open a second connection.
    shared: Option<Channel>,
    verbose: bool,
}

impl Director {
    /// Build a director from the startup configuration
    ///
    /// Loads the mTLS credentials and prepares the backend endpoint.
    /// Fails fast on unreadable credential files or a bad backend address;
    /// it does not dial.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, SiltaError> {
        let tls = credentials::client_tls(config)?;
        let endpoint = Endpoint::from_shared(config.backend_uri())
            .map_err(|e| {
                SiltaError::Config(format!("invalid backend address '{}': {e}", config.backend))
            })?
            .tls_config(tls)?
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .tcp_nodelay(true);
        Ok(Self::new(endpoint, config.reuse_connection, config.verbose))
    }

    /// Build a director around a prepared backend endpoint
    pub fn new(endpoint: Endpoint, reuse_connection: bool, verbose: bool) -> Self {
        let shared = reuse_connection.then(|| endpoint.connect_lazy());
        Self {
            endpoint,
            shared,
            verbose,
        }
    }

    /// Decide how to handle one call
    ///
    /// A path that is not of the form `/service/method` is unroutable and
    /// fails with `Unimplemented` without touching the backend. Routable
    /// calls get a verbatim copy of the inbound metadata and a backend
    /// channel.
    pub fn route(&self, method: &str, metadata: &MetadataMap) -> Result<Route, Status> {
        if !is_method_path(method) {
            if self.verbose {
                debug!(method, "unknown method");
            }
            return Err(Status::unimplemented("unknown method"));
        }

        if self.verbose {
            debug!(method, "proxying call");
        }

        let channel = match &self.shared {
            Some(channel) => channel.clone(),
            None => self.endpoint.connect_lazy(),
        };

        Ok(Route {
            metadata: metadata.clone(),
            channel,
        })
    }
}

/// A routable gRPC method path: `/service/method`, both segments non-empty
fn is_method_path(path: &str) -> bool {
    let Some(rest) = path.strip_prefix('/') else {
        return false;
    };
    match rest.split_once('/') {
        Some((service, method)) => {
            !service.is_empty() && !method.is_empty() && !method.contains('/')
        }
        None => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_director(reuse: bool) -> Director {
        let endpoint = Endpoint::from_static("http://127.0.0.1:1");
        Director::new(endpoint, reuse, false)
    }

    #[test]
    fn test_method_path_forms() {
        assert!(is_method_path("/pkg.Echo/Say"));
        assert!(is_method_path("/a/b"));
        assert!(!is_method_path(""));
        assert!(!is_method_path("/"));
        assert!(!is_method_path("/no-method"));
        assert!(!is_method_path("no-slash/Say"));
        assert!(!is_method_path("//Say"));
        assert!(!is_method_path("/pkg.Echo/"));
        assert!(!is_method_path("/pkg.Echo/Say/extra"));
    }

    #[test]
    fn test_unroutable_method_is_unimplemented() {
        let director = test_director(false);
        let err = director
            .route("/not-a-method", &MetadataMap::new())
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_route_copies_metadata_verbatim() {
        let director = test_director(false);

        let mut metadata = MetadataMap::new();
        metadata.insert("x-request-id", "abc".parse().unwrap());
        metadata.append("x-tag", "first".parse().unwrap());
        metadata.append("x-tag", "second".parse().unwrap());

        let route = director.route("/pkg.Echo/Say", &metadata).unwrap();

        assert_eq!(route.metadata.get("x-request-id").unwrap(), "abc");
        let tags: Vec<_> = route.metadata.get_all("x-tag").iter().collect();
        assert_eq!(tags, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_shared_mode_routes() {
        let director = test_director(true);
        // Lazy channels involve no I/O, so routing succeeds even though
        // nothing listens on the endpoint.
        assert!(director.route("/pkg.Echo/Say", &MetadataMap::new()).is_ok());
        assert!(director.route("/pkg.Echo/Stream", &MetadataMap::new()).is_ok());
    }
}
