use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    #[envconfig(default = "gzip-filter")]
    pub service_name: String,

    // Upper bound on the compressed body buffered before inflating
    #[envconfig(default = "20971520")]
    pub payload_size_limit: usize,

    pub body_chunk_read_timeout_ms: Option<u64>,

    #[envconfig(default = "256")]
    pub body_read_chunk_size_kb: usize,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,
}
