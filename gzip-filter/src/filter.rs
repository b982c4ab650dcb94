use std::borrow::Cow;
use std::io::Read;
use std::time::Instant;

use axum::http::header::CONTENT_ENCODING;

use crate::api::FilterError;
use crate::decompress::DecompressedRequest;
use crate::prometheus::{report_decompressed_body, report_request_outcome};
use crate::request::{IncomingRequest, ParameterMap};

/// The next stage of request processing.
pub trait FilterChain<Req, Resp> {
    type Output;

    fn do_filter(self, request: Req, response: Resp) -> Self::Output;
}

impl<F, Req, Resp, O> FilterChain<Req, Resp> for F
where
    F: FnOnce(Req, Resp) -> O,
{
    type Output = O;

    fn do_filter(self, request: Req, response: Resp) -> O {
        self(request, response)
    }
}

/// What the next stage receives: either the untouched request, or the same
/// request with its body inflated.
#[derive(Debug)]
pub enum FilteredRequest<R> {
    Original(R),
    Decompressed(DecompressedRequest<R>),
}

impl<R> FilteredRequest<R> {
    pub fn is_decompressed(&self) -> bool {
        matches!(self, FilteredRequest::Decompressed(_))
    }
}

impl<R: IncomingRequest> IncomingRequest for FilteredRequest<R> {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        match self {
            FilteredRequest::Original(req) => req.header(name),
            FilteredRequest::Decompressed(req) => req.header(name),
        }
    }

    fn method_name(&self) -> &str {
        match self {
            FilteredRequest::Original(req) => req.method_name(),
            FilteredRequest::Decompressed(req) => req.method_name(),
        }
    }

    fn request_uri(&self) -> &str {
        match self {
            FilteredRequest::Original(req) => req.request_uri(),
            FilteredRequest::Decompressed(req) => req.request_uri(),
        }
    }

    fn character_encoding(&self) -> Option<&str> {
        match self {
            FilteredRequest::Original(req) => req.character_encoding(),
            FilteredRequest::Decompressed(req) => req.character_encoding(),
        }
    }

    fn parameter_map(&self) -> ParameterMap {
        match self {
            FilteredRequest::Original(req) => req.parameter_map(),
            FilteredRequest::Decompressed(req) => req.parameter_map(),
        }
    }

    fn input_stream(&mut self) -> Box<dyn Read + '_> {
        match self {
            FilteredRequest::Original(req) => req.input_stream(),
            FilteredRequest::Decompressed(req) => req.input_stream(),
        }
    }
}

/// Inflates gzipped POST bodies before handing the request on.
///
/// Only holds its configuration, so one instance can serve any number of
/// requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct GzipBodyFilter {
    decompressed_size_limit: Option<usize>,
}

impl GzipBodyFilter {
    /// A filter that inflates bodies of any size.
    pub fn new() -> Self {
        Self::default()
    }

    /// A filter that rejects bodies inflating to more than `limit` bytes.
    pub fn with_decompressed_size_limit(limit: usize) -> Self {
        Self {
            decompressed_size_limit: Some(limit),
        }
    }

    /// Decides from the request head alone whether the body needs
    /// inflating. Compressed bodies are only accepted on POST.
    pub fn requires_decompression(
        content_encoding: Option<&str>,
        method: &str,
    ) -> Result<bool, FilterError> {
        let is_compressed = content_encoding.is_some_and(|v| v.contains("gzip"));
        if is_compressed && method != "POST" {
            report_request_outcome("rejected_method");
            return Err(FilterError::MethodNotSupportedForCompressedBody {
                method: method.to_string(),
            });
        }
        Ok(is_compressed)
    }

    /// Runs `chain` exactly once with the request to process, unless the
    /// request is rejected.
    pub fn do_filter<R, Resp, C>(
        &self,
        request: R,
        response: Resp,
        chain: C,
    ) -> Result<C::Output, FilterError>
    where
        R: IncomingRequest,
        C: FilterChain<FilteredRequest<R>, Resp>,
    {
        let is_compressed = Self::requires_decompression(
            request.header(CONTENT_ENCODING.as_str()).as_deref(),
            request.method_name(),
        )?;

        let request = if is_compressed {
            let uri = request.request_uri().to_string();
            tracing::debug!("decompressing POST request to {}", uri);
            let timer = Instant::now();

            let request =
                DecompressedRequest::with_size_limit(request, self.decompressed_size_limit)
                    .inspect_err(|e| match e {
                        FilterError::PayloadTooLarge(_) => report_request_outcome("too_large"),
                        _ => report_request_outcome("malformed"),
                    })?;

            let elapsed = timer.elapsed();
            report_request_outcome("decompressed");
            report_decompressed_body(request.body().len(), elapsed);
            tracing::debug!(
                "POST request to {} decompressed successfully in {:?}",
                uri,
                elapsed
            );
            FilteredRequest::Decompressed(request)
        } else {
            if request.method_name() == "POST" {
                tracing::debug!(
                    "POST body to {} does not require decompression, skipping filter",
                    request.request_uri()
                );
            }
            report_request_outcome("passthrough");
            FilteredRequest::Original(request)
        };

        Ok(chain.do_filter(request, response))
    }
}
