// prometheus exporter setup

use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

pub const GZIP_FILTER_REQUESTS_TOTAL: &str = "gzip_filter_requests_total";
pub const GZIP_FILTER_DECOMPRESSION_DURATION: &str = "gzip_filter_decompression_duration_seconds";
pub const GZIP_FILTER_DECOMPRESSED_BYTES: &str = "gzip_filter_decompressed_body_bytes";
pub const GZIP_FILTER_PARAMETERS_DEGRADED: &str = "gzip_filter_parameter_decoding_degraded_total";
pub const GZIP_FILTER_BODY_READ_TIMEOUT: &str = "gzip_filter_body_read_timeout_total";

pub fn report_request_outcome(outcome: &'static str) {
    counter!(GZIP_FILTER_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn report_decompressed_body(size: usize, elapsed: Duration) {
    histogram!(GZIP_FILTER_DECOMPRESSION_DURATION).record(elapsed.as_secs_f64());
    histogram!(GZIP_FILTER_DECOMPRESSED_BYTES).record(size as f64);
}

pub fn report_parameter_decoding_degraded() {
    counter!(GZIP_FILTER_PARAMETERS_DEGRADED).increment(1);
}

pub fn report_body_read_timeout(path: &str) {
    counter!(GZIP_FILTER_BODY_READ_TIMEOUT, "path" => path.to_string()).increment(1);
}

pub fn setup_metrics_recorder() -> PrometheusHandle {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];
    const PAYLOAD_SIZES: &[f64] = &[
        1024.0,     // 1KB
        10240.0,    // 10KB
        102400.0,   // 100KB
        1048576.0,  // 1MB
        10485760.0, // 10MB
        52428800.0, // 50MB
    ];

    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), EXPONENTIAL_SECONDS)
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(GZIP_FILTER_DECOMPRESSED_BYTES.to_string()),
            PAYLOAD_SIZES,
        )
        .unwrap()
        .install_recorder()
        .unwrap()
}
