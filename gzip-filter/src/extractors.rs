//! Buffering of request bodies ahead of decompression.
//!
//! Compressed bodies are collected in full before they are inflated, so the
//! read is bounded by a size limit and an optional per-chunk timeout to keep
//! slow clients from holding a connection.

use std::time::Duration;

use axum::body::Body;
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use tracing::warn;

use crate::api::FilterError;
use crate::prometheus::report_body_read_timeout;

/// Collects `body` into memory.
///
/// With a `chunk_timeout`, each chunk must arrive within that window or
/// `FilterError::BodyReadTimeout` is returned. Bodies larger than
/// `payload_size_limit` fail with `FilterError::PayloadTooLarge`.
pub async fn extract_body_with_timeout(
    body: Body,
    payload_size_limit: usize,
    chunk_timeout: Option<Duration>,
    chunk_size_kb: usize,
    path: &str,
) -> Result<Bytes, FilterError> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::with_capacity(std::cmp::min(payload_size_limit, chunk_size_kb * 1024));

    loop {
        let chunk_result = match chunk_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, stream.next()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    report_body_read_timeout(path);
                    warn!(
                        path = path,
                        bytes_received = buf.len(),
                        timeout_ms = timeout.as_millis() as u64,
                        "body read timeout: client stopped sending data"
                    );
                    return Err(FilterError::BodyReadTimeout);
                }
            },
            None => stream.next().await,
        };

        match chunk_result {
            Some(Ok(chunk)) => {
                if buf.len() + chunk.len() > payload_size_limit {
                    return Err(FilterError::PayloadTooLarge(format!(
                        "request body exceeds limit of {payload_size_limit} bytes"
                    )));
                }
                buf.put(chunk);
            }
            Some(Err(e)) => {
                return Err(FilterError::RequestBodyError(e.to_string()));
            }
            None => break,
        }
    }

    Ok(buf.freeze())
}
