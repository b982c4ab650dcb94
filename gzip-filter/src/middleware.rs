use std::time::Duration;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use bytes::Bytes;

use crate::api::FilterError;
use crate::config::Config;
use crate::extractors::extract_body_with_timeout;
use crate::filter::{FilteredRequest, GzipBodyFilter};
use crate::prometheus::report_request_outcome;
use crate::request::{IncomingRequest, ParameterMap};

/// Parameters of a request whose body was decompressed, as seen after the
/// form body has been parsed. Inserted as a request extension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestParameters(pub ParameterMap);

#[derive(Clone, Debug)]
pub struct DecompressionLayerState {
    pub filter: GzipBodyFilter,
    pub payload_size_limit: usize,
    pub chunk_timeout: Option<Duration>,
    pub chunk_size_kb: usize,
}

impl DecompressionLayerState {
    pub fn new(payload_size_limit: usize) -> Self {
        Self {
            filter: GzipBodyFilter::with_decompressed_size_limit(payload_size_limit),
            payload_size_limit,
            chunk_timeout: None,
            chunk_size_kb: 256,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: GzipBodyFilter::with_decompressed_size_limit(config.payload_size_limit),
            payload_size_limit: config.payload_size_limit,
            chunk_timeout: config.body_chunk_read_timeout_ms.map(Duration::from_millis),
            chunk_size_kb: config.body_read_chunk_size_kb,
        }
    }
}

/// Inflates gzipped POST bodies for the handlers behind it.
///
/// The decision is taken on the request head, so rejected requests and
/// requests that need no decompression never have their body buffered.
pub async fn decompress_gzip_body(
    State(state): State<DecompressionLayerState>,
    req: Request,
    next: Next,
) -> Result<Response, FilterError> {
    let is_compressed = {
        let content_encoding = req
            .headers()
            .get(CONTENT_ENCODING)
            .map(|v| String::from_utf8_lossy(v.as_bytes()));
        GzipBodyFilter::requires_decompression(content_encoding.as_deref(), req.method().as_str())?
    };
    if !is_compressed {
        report_request_outcome("passthrough");
        return Ok(next.run(req).await);
    }

    let (parts, body) = req.into_parts();
    let path = parts.uri.path().to_string();
    let body = extract_body_with_timeout(
        body,
        state.payload_size_limit,
        state.chunk_timeout,
        state.chunk_size_kb,
        &path,
    )
    .await?;

    let response = state.filter.do_filter(
        http::Request::from_parts(parts, body),
        next,
        |req: FilteredRequest<http::Request<Bytes>>, next: Next| {
            next.run(into_downstream_request(req))
        },
    )?;

    Ok(response.await)
}

/// Rebuilds the request handlers see. A decompressed body no longer carries
/// its `Content-Encoding`, and its length is the inflated length.
fn into_downstream_request(request: FilteredRequest<http::Request<Bytes>>) -> Request {
    match request {
        FilteredRequest::Original(req) => req.map(Body::from),
        FilteredRequest::Decompressed(req) => {
            let parameters = req.parameter_map();
            let (req, body) = req.into_parts();
            let (mut parts, _) = req.into_parts();

            parts.headers.remove(CONTENT_ENCODING);
            parts
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            parts.extensions.insert(RequestParameters(parameters));

            Request::from_parts(parts, Body::from(body))
        }
    }
}
