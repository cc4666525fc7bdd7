//! Listener and catch-all service
//!
//! The proxy registers no gRPC services of its own. Instead every request
//! that reaches the listener - which is every method of every service -
//! falls through to [`ProxyService`], which hands the raw HTTP/2 request
//! to `tonic::server::Grpc` with the pass-through codec and lets the
//! [`RelayService`](crate::relay::RelayService) do the rest. No per-method
//! stubs exist anywhere.
//!
//! The listener itself is plaintext; callers are expected to sit on a
//! trusted local network while the proxy upgrades every call to mutual TLS
//! toward the backend.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::Router;
use tokio::net::TcpListener;
use tonic::body::BoxBody;
use tracing::info;

use crate::codec::RawCodec;
use crate::config::ProxyConfig;
use crate::director::Director;
use crate::error::SiltaError;
use crate::relay::RelayService;

/// Catch-all tower service that relays any gRPC method
#[derive(Clone)]
pub struct ProxyService {
    director: Arc<Director>,
}

impl ProxyService {
    /// Create a proxy service backed by the given director
    pub fn new(director: Arc<Director>) -> Self {
        Self { director }
    }
}

impl tower::Service<http::Request<axum::body::Body>> for ProxyService {
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<axum::body::Body>) -> Self::Future {
        let director = Arc::clone(&self.director);
        Box::pin(async move {
            // The URI path is the fully-qualified method name.
            let method = req.uri().path().to_owned();
            let relay = RelayService::new(director, method);
            let mut grpc = tonic::server::Grpc::new(RawCodec);
            Ok(grpc.streaming(relay, req).await)
        })
    }
}

/// Bind the configured listen address and serve until `shutdown` resolves
pub async fn serve(
    config: &ProxyConfig,
    director: Arc<Director>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SiltaError> {
    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| SiltaError::Config(format!("failed to listen on {addr}: {e}")))?;
    info!(listen = %addr, backend = %config.backend, "proxy listening");
    serve_with_listener(listener, director, shutdown).await
}

/// Serve on an already-bound listener
///
/// Split out so tests can bind port 0 and learn the address first.
pub async fn serve_with_listener(
    listener: TcpListener,
    director: Arc<Director>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SiltaError> {
    let app = Router::new().fallback_service(ProxyService::new(director));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
