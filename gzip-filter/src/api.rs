use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("{method} does not support a gzipped body, only POST requests are supported")]
    MethodNotSupportedForCompressedBody { method: String },
    #[error("failed to decompress request body: {0}")]
    MalformedCompressedBody(String),

    #[error("request body too large: {0}")]
    PayloadTooLarge(String),
    #[error("timed out reading request body")]
    BodyReadTimeout,
    #[error("failed to read request body: {0}")]
    RequestBodyError(String),
}

impl IntoResponse for FilterError {
    fn into_response(self) -> Response {
        match self {
            FilterError::MethodNotSupportedForCompressedBody { .. } => {
                (StatusCode::METHOD_NOT_ALLOWED, self.to_string())
            }

            FilterError::MalformedCompressedBody(_) | FilterError::RequestBodyError(_) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }

            FilterError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, self.to_string()),

            FilterError::BodyReadTimeout => (StatusCode::REQUEST_TIMEOUT, self.to_string()),
        }
        .into_response()
    }
}

/// Raised while decoding a form body. Never fatal: callers log it and fall
/// back to the request's native parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParameterDecodingDegraded {
    #[error("unsupported character encoding: {0}")]
    UnsupportedEncoding(String),
    #[error("malformed percent-escape in {0:?}")]
    MalformedEscape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        let cases = [
            (
                FilterError::MethodNotSupportedForCompressedBody {
                    method: "PUT".to_string(),
                },
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            (
                FilterError::MalformedCompressedBody("invalid gzip header".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                FilterError::PayloadTooLarge("over 10 bytes".to_string()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (FilterError::BodyReadTimeout, StatusCode::REQUEST_TIMEOUT),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn method_error_names_the_method() {
        let err = FilterError::MethodNotSupportedForCompressedBody {
            method: "GET".to_string(),
        };
        assert!(err.to_string().starts_with("GET does not support"));
    }
}
