use std::borrow::Cow;
use std::io::{self, BufRead, BufReader, Read};

use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use flate2::bufread::GzDecoder;

use crate::api::FilterError;
use crate::body::BodyReader;
use crate::params::{form_parameters_or_native, is_form_urlencoded};
use crate::request::{IncomingRequest, ParameterMap};

/// A request whose gzipped body has been inflated into memory.
///
/// Every capability other than the body and the parameter map is answered
/// by the wrapped request.
#[derive(Debug)]
pub struct DecompressedRequest<R> {
    inner: R,
    body: Bytes,
}

impl<R: IncomingRequest> DecompressedRequest<R> {
    /// Drains and inflates the body of `inner`. The original stream is not
    /// read again afterwards.
    pub fn new(inner: R) -> Result<Self, FilterError> {
        Self::with_size_limit(inner, None)
    }

    /// Like [`DecompressedRequest::new`], failing with
    /// [`FilterError::PayloadTooLarge`] once the inflated body grows past
    /// `limit` bytes.
    pub fn with_size_limit(mut inner: R, limit: Option<usize>) -> Result<Self, FilterError> {
        let body = inflate(inner.input_stream(), limit)?;
        Ok(Self { inner, body })
    }

    /// A fresh cursor over the decompressed body.
    pub fn body_reader(&self) -> BodyReader {
        BodyReader::new(self.body.clone())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_parts(self) -> (R, Bytes) {
        (self.inner, self.body)
    }
}

/// Inflates every gzip member in `compressed`, in order.
///
/// An empty or truncated first member yields an empty body. Bytes after a
/// complete member that do not decode as another member are ignored.
fn inflate(compressed: impl Read, limit: Option<usize>) -> Result<Bytes, FilterError> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut reader = BufReader::new(compressed);
    let mut buf = Vec::new();
    let mut members = 0;

    loop {
        let at_end = reader
            .fill_buf()
            .map_err(|e| FilterError::RequestBodyError(e.to_string()))?
            .is_empty();
        if at_end {
            break;
        }

        let member_start = buf.len();
        let allowed = (limit - member_start) as u64;
        let result = GzDecoder::new(&mut reader)
            .take(allowed.saturating_add(1))
            .read_to_end(&mut buf);

        match result {
            Ok(_) if buf.len() > limit => {
                tracing::error!("decompressed body exceeds {} bytes", limit);
                return Err(FilterError::PayloadTooLarge(format!(
                    "decompressed body exceeds {limit} bytes"
                )));
            }
            Ok(_) => members += 1,
            Err(e) if members > 0 => {
                tracing::debug!("ignoring trailing data after gzip member: {}", e);
                buf.truncate(member_start);
                break;
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tracing::debug!("gzip stream ended early, treating body as empty: {}", e);
                return Ok(Bytes::new());
            }
            Err(e) => {
                tracing::error!("failed to decode gzip: {}", e);
                return Err(FilterError::MalformedCompressedBody(e.to_string()));
            }
        }
    }

    Ok(Bytes::from(buf))
}

impl<R: IncomingRequest> IncomingRequest for DecompressedRequest<R> {
    fn header(&self, name: &str) -> Option<Cow<'_, str>> {
        self.inner.header(name)
    }

    fn method_name(&self) -> &str {
        self.inner.method_name()
    }

    fn request_uri(&self) -> &str {
        self.inner.request_uri()
    }

    fn character_encoding(&self) -> Option<&str> {
        self.inner.character_encoding()
    }

    /// The wrapped request cannot see the body anymore, so form parameters
    /// are parsed from the decompressed bytes and laid over its own.
    fn parameter_map(&self) -> ParameterMap {
        if is_form_urlencoded(self.header(CONTENT_TYPE.as_str()).as_deref()) {
            form_parameters_or_native(
                self.inner.parameter_map(),
                &self.body,
                self.character_encoding(),
            )
        } else {
            self.inner.parameter_map()
        }
    }

    fn input_stream(&mut self) -> Box<dyn Read + '_> {
        Box::new(self.body_reader())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::write::GzEncoder;
    use flate2::Compression;

    use super::*;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn post(uri: &str, content_type: &str, body: Vec<u8>) -> http::Request<Bytes> {
        http::Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-encoding", "gzip")
            .header("content-type", content_type)
            .body(Bytes::from(body))
            .unwrap()
    }

    fn read_all(mut reader: impl Read) -> Vec<u8> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        buf
    }

    #[test]
    fn inflates_body() {
        let plain = br#"{"event":"pageview","properties":{"path":"/"}}"#;
        let mut req =
            DecompressedRequest::new(post("/e", "application/json", gzip(plain))).unwrap();

        assert_eq!(req.body(), &Bytes::from_static(plain));
        assert_eq!(read_all(req.input_stream()), plain.to_vec());
    }

    #[test]
    fn body_can_be_read_repeatedly() {
        let plain = "a".repeat(64 * 1024);
        let mut req =
            DecompressedRequest::new(post("/e", "text/plain", gzip(plain.as_bytes()))).unwrap();

        let first = read_all(req.input_stream());
        let second = read_all(req.input_stream());
        assert_eq!(first, plain.as_bytes());
        assert_eq!(first, second);
    }

    #[test]
    fn cursors_are_independent() {
        let req = DecompressedRequest::new(post("/e", "text/plain", gzip(b"0123456789"))).unwrap();

        let mut first = req.body_reader();
        let mut head = [0u8; 4];
        first.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"0123");

        let second = req.body_reader();
        assert_eq!(second.remaining(), 10);
        assert_eq!(first.remaining(), 6);

        first.close();
        assert_eq!(read_all(second), b"0123456789");
        assert_eq!(read_all(req.body_reader()), b"0123456789");
    }

    #[test]
    fn original_stream_is_consumed() {
        let req = DecompressedRequest::new(post("/e", "text/plain", gzip(b"data"))).unwrap();
        let (mut inner, body) = req.into_parts();

        assert_eq!(&body[..], b"data");
        assert!(read_all(inner.input_stream()).is_empty());
    }

    #[test]
    fn empty_body_is_empty() {
        let mut req = DecompressedRequest::new(post("/e", "text/plain", Vec::new())).unwrap();
        assert!(req.body().is_empty());
        assert!(read_all(req.input_stream()).is_empty());
    }

    #[test]
    fn truncated_body_is_empty() {
        let mut compressed = gzip(b"some payload that will be cut short");
        compressed.truncate(5);

        let req = DecompressedRequest::new(post("/e", "text/plain", compressed)).unwrap();
        assert!(req.body().is_empty());
    }

    #[test]
    fn malformed_body_is_an_error() {
        let result = DecompressedRequest::new(post(
            "/e",
            "text/plain",
            b"this is definitely not gzip".to_vec(),
        ));

        assert!(matches!(
            result,
            Err(FilterError::MalformedCompressedBody(_))
        ));
    }

    #[test]
    fn concatenated_members_are_joined() {
        let mut compressed = gzip(b"first,");
        compressed.extend(gzip(b"second"));

        let req = DecompressedRequest::new(post("/e", "text/plain", compressed)).unwrap();
        assert_eq!(&req.body()[..], b"first,second");
    }

    #[test]
    fn trailing_bytes_after_member_are_ignored() {
        let tails: [&[u8]; 5] = [
            b"\0",
            b"\0\0\0\0",
            b"\x1f",
            b"\x1f\x8b\x08",
            b"garbage-after-member",
        ];

        for tail in tails {
            let mut compressed = gzip(b"payload");
            compressed.extend_from_slice(tail);

            let req = DecompressedRequest::new(post("/e", "text/plain", compressed)).unwrap();
            assert_eq!(&req.body()[..], b"payload", "{tail:?}");
        }
    }

    #[test]
    fn broken_member_after_complete_ones_is_dropped() {
        let mut compressed = gzip(b"first,");
        compressed.extend(gzip(b"second,"));
        let mut third = gzip(b"third member cut short");
        third.truncate(third.len() - 4);
        compressed.extend(third);

        let req = DecompressedRequest::new(post("/e", "text/plain", compressed)).unwrap();
        assert_eq!(&req.body()[..], b"first,second,");
    }

    #[test]
    fn inflated_size_is_bounded() {
        let bomb = gzip(&vec![0u8; 1024 * 1024]);
        assert!(bomb.len() < 4096);

        let result = DecompressedRequest::with_size_limit(
            post("/e", "text/plain", bomb),
            Some(64 * 1024),
        );
        assert!(matches!(result, Err(FilterError::PayloadTooLarge(_))));
    }

    #[test]
    fn limit_applies_across_members() {
        let mut compressed = gzip(b"0123456789");
        compressed.extend(gzip(b"0123456789"));

        let result = DecompressedRequest::with_size_limit(
            post("/e", "text/plain", compressed.clone()),
            Some(15),
        );
        assert!(matches!(result, Err(FilterError::PayloadTooLarge(_))));

        let req =
            DecompressedRequest::with_size_limit(post("/e", "text/plain", compressed), Some(20))
                .unwrap();
        assert_eq!(req.body().len(), 20);
    }

    #[test]
    fn form_parameters_come_from_decompressed_body() {
        let req = DecompressedRequest::new(post(
            "/submit?source=query&name=native",
            "application/x-www-form-urlencoded",
            gzip(b"name=John+Doe&tags=a&tags=b&empty=&bare"),
        ))
        .unwrap();

        let params = req.parameter_map();
        let some = |v: &str| Some(v.to_string());
        assert_eq!(params.get("name"), Some(&vec![some("John Doe")]));
        assert_eq!(params.get("tags"), Some(&vec![some("a"), some("b")]));
        assert_eq!(params.get("empty"), Some(&vec![None]));
        assert_eq!(params.get("bare"), Some(&vec![None]));
        assert_eq!(params.get("source"), Some(&vec![some("query")]));
    }

    #[test]
    fn declared_charset_is_used_for_form_parameters() {
        let req = DecompressedRequest::new(post(
            "/submit",
            "application/x-www-form-urlencoded; charset=UTF-8",
            gzip(b"city=Z%C3%BCrich"),
        ))
        .unwrap();

        assert_eq!(
            req.parameter_map().get("city"),
            Some(&vec![Some("Z\u{fc}rich".to_string())])
        );
    }

    #[test]
    fn undecodable_form_falls_back_to_native_parameters() {
        let inner = post(
            "/submit?source=query",
            "application/x-www-form-urlencoded",
            gzip(b"ok=1&broken=%ZZ"),
        );
        let native = inner.parameter_map();

        let req = DecompressedRequest::new(inner).unwrap();
        assert_eq!(req.parameter_map(), native);
    }

    #[test]
    fn non_form_body_keeps_native_parameters() {
        let inner = post(
            "/submit?source=query",
            "application/json",
            gzip(b"name=not-a-form"),
        );
        let native = inner.parameter_map();

        let req = DecompressedRequest::new(inner).unwrap();
        assert_eq!(req.parameter_map(), native);
        assert!(!req.parameter_map().contains_key("name"));
    }

    #[test]
    fn delegates_request_metadata() {
        let req = DecompressedRequest::new(post(
            "/submit?x=1",
            "text/plain; charset=us-ascii",
            gzip(b""),
        ))
        .unwrap();

        assert_eq!(req.method_name(), "POST");
        assert_eq!(req.request_uri(), "/submit");
        assert_eq!(req.character_encoding(), Some("us-ascii"));
        assert_eq!(req.header("content-encoding").as_deref(), Some("gzip"));
    }
}
