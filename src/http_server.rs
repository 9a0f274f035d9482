//! Battery-packed HTTP transport.
//!
//! Calls are `POST /{service}/{method}` requests carrying the encoded request as body. The
//! response body is the encoded reply, errors are mapped to status codes with
//! [`CallError::status_code`](crate::errors::CallError::status_code).

use crate::errors::ServeError;
use crate::hyper::HyperEndpoint;
use crate::server::ServerConfig;
use crate::transport::{Dispatcher, Transport};
use futures::future::BoxFuture;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Http transport serving HTTP/1 over TCP.
#[derive(Default)]
pub struct HttpTransport {
    running: Mutex<Option<Running>>,
}

struct Running {
    shutdown: CancellationToken,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the transport is bound to, once started.
    ///
    /// Useful when listening on port `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|r| r.local_addr)
    }
}

impl Transport for HttpTransport {
    fn start<'a>(
        &'a self,
        dispatcher: Dispatcher,
        config: &'a ServerConfig,
    ) -> BoxFuture<'a, Result<(), ServeError>> {
        Box::pin(async move {
            let bind_err = |source| ServeError::Bind {
                address: config.address.clone(),
                source,
            };
            let listener = TcpListener::bind(&config.address).await.map_err(bind_err)?;
            let local_addr = listener.local_addr().map_err(bind_err)?;
            info!("Starting listening on {}", local_addr);

            let shutdown = CancellationToken::new();
            let task = tokio::spawn(accept_loop(
                listener,
                HyperEndpoint::new(dispatcher),
                shutdown.clone(),
                config.shutdown_timeout,
            ));

            *self.running.lock().unwrap_or_else(PoisonError::into_inner) = Some(Running {
                shutdown,
                task,
                local_addr,
            });
            Ok(())
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let running = self
                .running
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(Running { shutdown, task, .. }) = running {
                shutdown.cancel();
                if let Err(e) = task.await {
                    warn!("Accept loop terminated abnormally: {e}");
                }
            }
        })
    }
}

async fn accept_loop(
    listener: TcpListener,
    endpoint: HyperEndpoint,
    shutdown: CancellationToken,
    shutdown_timeout: Duration,
) {
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Error accepting connection: {e}");
                        continue;
                    }
                };
                let endpoint = endpoint.clone();

                let conn = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), endpoint);

                let fut = graceful.watch(conn);

                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        warn!("Error serving connection {remote}: {:?}", e);
                    }
                });
            },
            _ = shutdown.cancelled() => {
                info!("Shutting down");
                // stop the accept loop
                break;
            }
        }
    }

    // Wait graceful shutdown
    tokio::select! {
        _ = graceful.shutdown() => {},
        _ = tokio::time::sleep(shutdown_timeout) => {
            warn!("Timed out waiting for all connections to close");
        }
    }
}
