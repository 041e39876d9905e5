//! Responses that report when they have been handed to the client.
//!
//! [`committed_json`] wraps a JSON body in a one-chunk stream holding the
//! sending half of a oneshot channel. The signal fires once the HTTP layer
//! has drained the body, or when the body is dropped without being drained,
//! so work gated on the receiver never starts before the response is out.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use serde::Serialize;
use tokio::sync::oneshot;

use icvk_common::error::AppError;

/// Receiving half; resolves when the response body is finished.
pub type CommitSignal = oneshot::Receiver<()>;

/// Build a JSON response plus the signal that fires once it is written.
pub fn committed_json<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<(Response, CommitSignal), AppError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| AppError::Internal(format!("Failed to serialize response: {}", e)))?;
    let length = bytes.len();
    let (tx, rx) = oneshot::channel();

    let body = Body::from_stream(CommitOnDrain {
        chunk: Some(Bytes::from(bytes)),
        signal: Some(tx),
    });

    let response = (
        status,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response();
    Ok((response, rx))
}

/// Wait for a commit signal. A dropped sender counts as committed.
pub async fn committed(signal: CommitSignal) {
    let _ = signal.await;
}

struct CommitOnDrain {
    chunk: Option<Bytes>,
    signal: Option<oneshot::Sender<()>>,
}

impl Stream for CommitOnDrain {
    type Item = Result<Bytes, std::convert::Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = self.chunk.take() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        if let Some(signal) = self.signal.take() {
            let _ = signal.send(());
        }
        Poll::Ready(None)
    }
}
