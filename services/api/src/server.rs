//! HTTP serving: per-request deadline and graceful shutdown

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use tokio::{net::TcpListener, sync::Notify};
use tracing::{info, warn};

use crate::error::ApiError;

/// Fail the request with `TIMEOUT` once `deadline` elapses.
///
/// The handler future is dropped, which rolls back any open transaction.
pub async fn request_timeout(
    State(deadline): State<Duration>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = req.uri().path().to_owned();
    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => Ok(response),
        Err(_) => {
            warn!("Request to {} exceeded {:?}", path, deadline);
            Err(ApiError::Timeout)
        }
    }
}

pub fn with_request_timeout(router: Router, deadline: Duration) -> Router {
    router.layer(from_fn_with_state(deadline, request_timeout))
}

/// Resolve on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Serve `app` until `shutdown` resolves, then give in-flight requests up
/// to `drain` to finish
pub async fn serve(
    listener: TcpListener,
    app: Router,
    drain: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let signalled = Arc::new(Notify::new());
    let trigger = signalled.clone();

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("Shutdown requested, draining connections");
            trigger.notify_one();
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = signalled.notified() => {}
    }

    match tokio::time::timeout(drain, server).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Drain deadline of {:?} elapsed, dropping open connections", drain);
            Ok(())
        }
    }
}
