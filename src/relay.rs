//! Bidirectional frame relay
//!
//! One [`RelayService`] instance drives one proxied call: it asks the
//! [`Director`] for a route, opens the backend call with the pass-through
//! codec, and pumps frames in both directions until either side
//! terminates.
//!
//! The two directions run as independent tasks joined to the tonic
//! machinery by bounded channels, so neither leg can block the other and
//! neither can buffer unboundedly - h2 flow control paces each direction
//! by its slower endpoint. Cancellation needs no token of its own: when
//! the caller goes away the response channel closes, both pumps observe it
//! on their next scheduling step, and dropping the backend streams resets
//! the backend call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::uri::PathAndQuery;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Response, Status, Streaming};
use tracing::debug;

use crate::codec::RawCodec;
use crate::director::Director;
use crate::metrics::Metrics;

/// Frames buffered per direction between a pump and the transport.
/// Small on purpose: the window only smooths scheduling jitter, while
/// backpressure stays with the transport's flow control.
const FRAME_WINDOW: usize = 16;

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = std::result::Result<T, E>> + Send + 'static>>;

/// Relays one call between the caller and the backend
pub struct RelayService {
    director: Arc<Director>,
    method: String,
}

impl RelayService {
    /// Create a relay for one call to `method`
    pub fn new(director: Arc<Director>, method: String) -> Self {
        Self { director, method }
    }
}

impl tonic::server::StreamingService<Bytes> for RelayService {
    type Response = Bytes;
    type ResponseStream = ReceiverStream<Result<Bytes, Status>>;
    type Future = BoxFuture<Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: Request<Streaming<Bytes>>) -> Self::Future {
        let director = Arc::clone(&self.director);
        let method = self.method.clone();
        Box::pin(async move {
            let result = relay(director, method, request).await;
            if let (Err(status), Some(metrics)) = (&result, Metrics::get()) {
                metrics.record_call(status.code());
            }
            result
        })
    }
}

/// Open the backend call and wire up both pump loops
async fn relay(
    director: Arc<Director>,
    method: String,
    request: Request<Streaming<Bytes>>,
) -> Result<Response<ReceiverStream<Result<Bytes, Status>>>, Status> {
    let (metadata, extensions, inbound) = request.into_parts();

    let route = director.route(&method, &metadata)?;
    let path = PathAndQuery::from_maybe_shared(method)
        .map_err(|_| Status::unimplemented("unknown method"))?;

    let mut grpc = tonic::client::Grpc::new(route.channel);
    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("backend unavailable: {e}")))?;

    // Caller -> backend. The pump must already be running when the backend
    // call opens, so servers that read before responding make progress.
    let (frame_tx, frame_rx) = mpsc::channel(FRAME_WINDOW);
    tokio::spawn(pump_caller_to_backend(inbound, frame_tx));

    let outgoing = Request::from_parts(route.metadata, extensions, ReceiverStream::new(frame_rx));
    let response = grpc.streaming(outgoing, path, RawCodec).await?;

    // Backend -> caller, response headers copied through as-is.
    let (head, backend, extensions) = response.into_parts();
    let (reply_tx, reply_rx) = mpsc::channel(FRAME_WINDOW);
    tokio::spawn(pump_backend_to_caller(backend, reply_tx));

    Ok(Response::from_parts(
        head,
        ReceiverStream::new(reply_rx),
        extensions,
    ))
}

/// Forward caller frames to the backend request stream
///
/// Ends when the caller half-closes (dropping `tx` half-closes the backend
/// call), when the inbound leg fails, or when the backend leg is gone and
/// remaining frames are to be discarded.
async fn pump_caller_to_backend(mut inbound: Streaming<Bytes>, tx: mpsc::Sender<Bytes>) {
    loop {
        tokio::select! {
            // Backend call finished or was torn down; stop reading.
            _ = tx.closed() => break,
            next = inbound.message() => match next {
                Ok(Some(frame)) => {
                    if let Some(metrics) = Metrics::get() {
                        metrics.record_frame("inbound");
                    }
                    if tx.send(frame).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(status) => {
                    debug!(code = ?status.code(), "inbound leg ended with error");
                    break;
                }
            }
        }
    }
}

/// Forward backend frames and the terminal status to the caller
async fn pump_backend_to_caller(
    backend: Streaming<Bytes>,
    tx: mpsc::Sender<Result<Bytes, Status>>,
) {
    if let Some(metrics) = Metrics::get() {
        metrics.active_calls.inc();
    }
    let code = drive_backend(backend, tx).await;
    if let Some(metrics) = Metrics::get() {
        metrics.active_calls.dec();
        metrics.record_call(code);
    }
}

async fn drive_backend(
    mut backend: Streaming<Bytes>,
    tx: mpsc::Sender<Result<Bytes, Status>>,
) -> Code {
    let status = loop {
        tokio::select! {
            // Caller disconnected (or its deadline expired). Dropping
            // `backend` resets the backend call; nothing further is
            // forwarded in either direction.
            _ = tx.closed() => {
                debug!("caller gone, cancelling backend call");
                return Code::Cancelled;
            }
            next = backend.message() => match next {
                Ok(Some(frame)) => {
                    if let Some(metrics) = Metrics::get() {
                        metrics.record_frame("outbound");
                    }
                    if tx.send(Ok(frame)).await.is_err() {
                        return Code::Cancelled;
                    }
                }
                Ok(None) => break None,
                Err(status) => break Some(status),
            }
        }
    };

    match status {
        // Backend failed: its status - code, message, and trailing
        // metadata - reaches the caller verbatim.
        Some(status) => {
            let code = status.code();
            let _ = tx.send(Err(status)).await;
            code
        }
        // Clean completion: recover the backend's trailing metadata so the
        // caller sees the same trailers the backend sent. On the wire a
        // `Code::Ok` status is exactly `grpc-status: 0` plus that metadata.
        None => {
            match backend.trailers().await {
                Ok(Some(mut trailers)) => {
                    // The status line itself is regenerated on our side.
                    trailers.remove("grpc-status");
                    trailers.remove("grpc-message");
                    if !trailers.is_empty() {
                        let _ = tx
                            .send(Err(Status::with_metadata(Code::Ok, "", trailers)))
                            .await;
                    }
                }
                Ok(None) => {}
                Err(status) => {
                    let code = status.code();
                    let _ = tx.send(Err(status)).await;
                    return code;
                }
            }
            Code::Ok
        }
    }
}
