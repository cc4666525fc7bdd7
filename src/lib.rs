//! SILTA - Transparent mTLS gRPC proxy
//!
//! Sits between a caller and a backend gRPC service and forwards any call -
//! unary or streaming, for any method of any service - without knowing any
//! service's message definitions. The listener is plaintext; the backend
//! connection is always mutual TLS against a pinned server identity.
//!
//! # Call path
//!
//! ```text
//! caller ──► ProxyService (catch-all) ──► Director ──► Relay ──► backend
//!                 │                          │            │
//!             RawCodec              metadata copy +   two concurrent
//!          (identity frames)        backend channel   pump loops
//! ```
//!
//! The proxy never decodes a payload: every message crosses it as an opaque
//! [`bytes::Bytes`] frame via [`RawCodec`]. Ordering, metadata, and the
//! terminal status (including trailing metadata) are preserved end to end.

#![deny(unsafe_code)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::panic)]

pub mod codec;
pub mod config;
pub mod credentials;
pub mod director;
pub mod error;
pub mod metrics;
pub mod metrics_server;
pub mod relay;
pub mod server;

pub use codec::RawCodec;
pub use config::ProxyConfig;
pub use director::{Director, Route};
pub use error::{Result, SiltaError};
pub use metrics::Metrics;
pub use metrics_server::MetricsServer;
pub use server::ProxyService;
