use tracing::{debug, info};

/// Resolves once the process receives a termination signal.
///
/// On unix this listens for `SIGINT`, `SIGTERM` and `SIGQUIT`, and for `SIGSEGV` where the
/// runtime allows registering it. Elsewhere only ctrl-c is observed.
#[cfg(unix)]
pub(crate) async fn termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let kinds = [
        ("SIGINT", SignalKind::interrupt()),
        ("SIGTERM", SignalKind::terminate()),
        ("SIGQUIT", SignalKind::quit()),
        ("SIGSEGV", SignalKind::from_raw(libc::SIGSEGV)),
    ];

    let mut streams = Vec::with_capacity(kinds.len());
    for (name, kind) in kinds {
        match signal(kind) {
            Ok(stream) => streams.push((name, stream)),
            Err(e) => debug!("Cannot listen for {name}: {e}"),
        }
    }

    if streams.is_empty() {
        // Nothing to wait on, fall back to ctrl-c handling.
        let _ = tokio::signal::ctrl_c().await;
        info!("Received ctrl-c");
        return;
    }

    let waits = streams.iter_mut().map(|(name, stream)| {
        Box::pin(async move {
            stream.recv().await;
            *name
        })
    });
    let (name, _, _) = futures::future::select_all(waits).await;
    info!("Received {name}");
}

#[cfg(not(unix))]
pub(crate) async fn termination() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!("Cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("Received ctrl-c");
}
