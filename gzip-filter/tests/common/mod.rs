#![allow(dead_code)]

use std::io::Write;

use axum::body::Body;
use axum::http::{Request, Response};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http_body_util::BodyExt;

use gzip_filter::middleware::DecompressionLayerState;
use gzip_filter::router::router;

pub const TEST_SERVICE_NAME: &str = "gzip-filter-test";

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

pub fn test_router(payload_size_limit: usize) -> axum::Router {
    router(
        TEST_SERVICE_NAME.to_string(),
        DecompressionLayerState::new(payload_size_limit),
        false,
    )
}

pub fn post(uri: &str, content_encoding: Option<&str>, content_type: &str, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type);
    if let Some(content_encoding) = content_encoding {
        builder = builder.header("content-encoding", content_encoding);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}
