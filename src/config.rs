//! Proxy configuration
//!
//! One immutable [`ProxyConfig`] value is built from command-line flags at
//! startup and passed explicitly into the components that need it. Nothing
//! in the call path reads configuration from globals.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::error::SiltaError;

/// Transparent mTLS gRPC proxy
#[derive(Parser, Debug, Clone)]
#[command(name = "silta", about = "Transparent mTLS gRPC proxy")]
pub struct ProxyConfig {
    /// Client certificate presented to the backend
    #[arg(long = "crt", default_value = "client.crt")]
    pub client_cert: PathBuf,

    /// Client private key
    #[arg(long = "key", default_value = "client.key")]
    pub client_key: PathBuf,

    /// Certificate authority bundle used to verify the backend
    #[arg(long = "ca", default_value = "ca.key")]
    pub ca_cert: PathBuf,

    /// Backend address calls are forwarded to
    #[arg(long, default_value = "localhost:8098")]
    pub backend: String,

    /// Address to listen on (a leading ':' binds all interfaces)
    #[arg(long, default_value = ":50051")]
    pub listen: String,

    /// Per-call diagnostics
    #[arg(long)]
    pub verbose: bool,

    /// Share one backend channel across calls instead of dialing per call
    #[arg(long)]
    pub reuse_connection: bool,

    /// Serve Prometheus metrics and a health endpoint on this port
    #[arg(long)]
    pub metrics_port: Option<u16>,
}

impl ProxyConfig {
    /// Resolve the listen flag into a socket address
    ///
    /// Accepts the Go-style shorthand `:PORT` as well as a full
    /// `HOST:PORT` pair.
    pub fn listen_addr(&self) -> Result<SocketAddr, SiltaError> {
        let candidate = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };
        candidate
            .parse()
            .map_err(|e| SiltaError::Config(format!("invalid listen address '{}': {e}", self.listen)))
    }

    /// The backend endpoint URI, scheme included
    ///
    /// The backend flag is a bare `host:port`; TLS channels want an
    /// `https://` URI.
    pub fn backend_uri(&self) -> String {
        if self.backend.contains("://") {
            self.backend.clone()
        } else {
            format!("https://{}", self.backend)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::parse_from(["silta"]);
        assert_eq!(config.client_cert, PathBuf::from("client.crt"));
        assert_eq!(config.client_key, PathBuf::from("client.key"));
        assert_eq!(config.ca_cert, PathBuf::from("ca.key"));
        assert_eq!(config.backend, "localhost:8098");
        assert_eq!(config.listen, ":50051");
        assert!(!config.verbose);
        assert!(!config.reuse_connection);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn test_listen_addr_shorthand() {
        let config = ProxyConfig::parse_from(["silta", "--listen", ":50051"]);
        let addr = config.listen_addr().unwrap();
        assert_eq!(addr.port(), 50051);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn test_listen_addr_full() {
        let config = ProxyConfig::parse_from(["silta", "--listen", "127.0.0.1:9000"]);
        let addr = config.listen_addr().unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_listen_addr_invalid() {
        let config = ProxyConfig::parse_from(["silta", "--listen", "not-an-addr"]);
        assert!(config.listen_addr().is_err());
    }

    #[test]
    fn test_backend_uri_gets_scheme() {
        let config = ProxyConfig::parse_from(["silta"]);
        assert_eq!(config.backend_uri(), "https://localhost:8098");

        let config = ProxyConfig::parse_from(["silta", "--backend", "http://10.0.0.1:8098"]);
        assert_eq!(config.backend_uri(), "http://10.0.0.1:8098");
    }
}
