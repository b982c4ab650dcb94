use std::future::Future;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::middleware::DecompressionLayerState;
use crate::router;

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router::router(
        config.service_name.clone(),
        DecompressionLayerState::from_config(&config),
        config.export_prometheus,
    );

    tracing::info!("listening on {:?}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
