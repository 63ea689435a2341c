//! TCP transport for the REST adapter

use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

/// Serve `app` on `addr` until `shutdown` resolves, then drain open connections
pub async fn serve_on_tcp<F>(
    addr: SocketAddr,
    app: Router,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()>,
{
    let server = hyper::Server::try_bind(&addr)?.serve(app.into_make_service());
    info!(addr = %server.local_addr(), "REST API server listening");

    server.with_graceful_shutdown(shutdown).await?;

    info!("REST API server stopped");
    Ok(())
}
