pub mod api;
pub mod body;
pub mod config;
pub mod decompress;
pub mod extractors;
pub mod filter;
pub mod handlers;
pub mod metrics_middleware;
pub mod middleware;
pub mod params;
pub mod prometheus;
pub mod request;
pub mod router;
pub mod server;
