//! Prometheus metrics for the proxy
//!
//! A small, fixed set of counters around the relay: calls by terminal
//! outcome, frames forwarded per direction, and the number of calls
//! currently in flight. Registered once into the default registry and
//! exposed by the optional metrics server.

use prometheus::{
    register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder,
};
use std::sync::OnceLock;

use crate::error::SiltaError;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All proxy metrics
pub struct Metrics {
    /// Completed calls by terminal gRPC status code
    pub calls_total: CounterVec,

    /// Frames forwarded, by direction (`inbound` = caller→backend,
    /// `outbound` = backend→caller)
    pub frames_forwarded: CounterVec,

    /// Calls currently being relayed
    pub active_calls: Gauge,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    pub fn init() -> Result<&'static Metrics, SiltaError> {
        // Serialize initialization: concurrent registration of the same
        // metric names would fail in the prometheus registry.
        static INIT_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
        let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            calls_total: register_counter_vec!(
                "silta_calls_total",
                "Completed proxied calls by terminal status code",
                &["code"]
            )
            .map_err(|e| SiltaError::Metrics(format!("calls_total: {e}")))?,

            frames_forwarded: register_counter_vec!(
                "silta_frames_forwarded_total",
                "Message frames forwarded through the relay",
                &["direction"]
            )
            .map_err(|e| SiltaError::Metrics(format!("frames_forwarded: {e}")))?,

            active_calls: register_gauge!(
                "silta_active_calls",
                "Calls currently being relayed"
            )
            .map_err(|e| SiltaError::Metrics(format!("active_calls: {e}")))?,
        };

        Ok(METRICS.get_or_init(|| metrics))
    }

    /// Get the metrics instance if initialized
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }

    /// Record a completed call
    pub fn record_call(&self, code: tonic::Code) {
        self.calls_total
            .with_label_values(&[code_label(code)])
            .inc();
    }

    /// Record a forwarded frame
    pub fn record_frame(&self, direction: &str) {
        self.frames_forwarded.with_label_values(&[direction]).inc();
    }
}

fn code_label(code: tonic::Code) -> &'static str {
    match code {
        tonic::Code::Ok => "ok",
        tonic::Code::Cancelled => "cancelled",
        tonic::Code::Unknown => "unknown",
        tonic::Code::InvalidArgument => "invalid_argument",
        tonic::Code::DeadlineExceeded => "deadline_exceeded",
        tonic::Code::NotFound => "not_found",
        tonic::Code::AlreadyExists => "already_exists",
        tonic::Code::PermissionDenied => "permission_denied",
        tonic::Code::ResourceExhausted => "resource_exhausted",
        tonic::Code::FailedPrecondition => "failed_precondition",
        tonic::Code::Aborted => "aborted",
        tonic::Code::OutOfRange => "out_of_range",
        tonic::Code::Unimplemented => "unimplemented",
        tonic::Code::Internal => "internal",
        tonic::Code::Unavailable => "unavailable",
        tonic::Code::DataLoss => "data_loss",
        tonic::Code::Unauthenticated => "unauthenticated",
    }
}

/// Render all registered metrics in the Prometheus text format
pub fn gather() -> String {
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = Metrics::init().unwrap() as *const Metrics;
        let second = Metrics::init().unwrap() as *const Metrics;
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_call_shows_in_gather() {
        let metrics = Metrics::init().unwrap();
        metrics.record_call(tonic::Code::Ok);
        metrics.record_frame("inbound");
        let text = gather();
        assert!(text.contains("silta_calls_total"));
        assert!(text.contains("silta_frames_forwarded_total"));
    }
}
