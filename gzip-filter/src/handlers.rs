use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Uri};
use axum::{Extension, Json};
use bytes::Bytes;

use crate::middleware::RequestParameters;
use crate::params::{form_parameters_or_native, is_form_urlencoded};
use crate::request::{charset_from_content_type, query_parameters, ParameterMap};
use crate::router;

pub async fn index(State(state): State<router::State>) -> String {
    state.service_name.clone()
}

pub async fn liveness() -> &'static str {
    "ok"
}

/// Returns the body exactly as handlers behind the filter observe it.
pub async fn echo(body: Bytes) -> Bytes {
    tracing::debug!(len = body.len(), "echoing request body");
    body
}

/// Returns the request parameters. Decompressed requests carry them as an
/// extension; plain requests get the same query + form treatment here.
pub async fn params(
    parameters: Option<Extension<RequestParameters>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<ParameterMap> {
    if let Some(Extension(RequestParameters(params))) = parameters {
        return Json(params);
    }

    let native = query_parameters(uri.query());
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    if is_form_urlencoded(content_type) {
        Json(form_parameters_or_native(
            native,
            &body,
            content_type.and_then(charset_from_content_type),
        ))
    } else {
        Json(native)
    }
}
