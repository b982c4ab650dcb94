use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Read;

use axum::http::header::CONTENT_TYPE;
use bytes::{Buf, Bytes};

/// Parameter name to its values, in arrival order. `None` marks a key that
/// was sent without a value.
pub type ParameterMap = HashMap<String, Vec<Option<String>>>;

/// The parts of an inbound HTTP request the filter works with.
pub trait IncomingRequest {
    /// Raw header value. Bytes that are not valid UTF-8 are replaced rather
    /// than hiding the header.
    fn header(&self, name: &str) -> Option<Cow<'_, str>>;

    fn method_name(&self) -> &str;

    /// Path component of the request URI.
    fn request_uri(&self) -> &str;

    /// Character encoding declared by the client, if any.
    fn character_encoding(&self) -> Option<&str>;

    fn parameter_map(&self) -> ParameterMap;

    /// Raw body bytes. Implementations backed by a one-shot stream only
    /// yield the body on the first call.
    fn input_stream(&mut self) -> Box<dyn Read + '_>;
}

/// Extracts the `charset` parameter from a `Content-Type` value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Decodes a query string into a [`ParameterMap`], keeping repeated keys.
pub fn query_parameters(query: Option<&str>) -> ParameterMap {
    let mut params = ParameterMap::new();
    let Some(query) = query else {
        return params;
    };

    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => {
            for (key, value) in pairs {
                params.entry(key).or_default().push(Some(value));
            }
        }
        Err(e) => {
            tracing::warn!("failed to decode query string: {}", e);
        }
    }
    params
}

impl IncomingRequest for http::Request<Bytes> {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers()
            .get(name)
            .map(|v| String::from_utf8_lossy(v.as_bytes()))
    }

    fn method_name(&self) -> &str {
        self.method().as_str()
    }

    fn request_uri(&self) -> &str {
        self.uri().path()
    }

    fn character_encoding(&self) -> Option<&str> {
        self.headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type)
    }

    fn parameter_map(&self) -> ParameterMap {
        query_parameters(self.uri().query())
    }

    fn input_stream(&mut self) -> Box<dyn Read + '_> {
        Box::new(std::mem::take(self.body_mut()).reader())
    }
}
