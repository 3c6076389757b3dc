use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::web::error::WebError;
use crate::web::routes::router;
use crate::web::state::AppState;

/// Serve the control panel on `addr` until `shutdown` resolves
pub async fn run_web_server<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<(), WebError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "web interface listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
