use std::future::Future;
use tracing::{error, info};

/// Install the shutdown handlers and return a future resolving on ctrl-c or,
/// on unix, SIGTERM.
///
/// The handlers are registered when this function returns, not when the
/// future is first polled, so a signal arriving while the pipeline is still
/// spawning workers is delivered to the future instead of killing the
/// process.
#[cfg(unix)]
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn install(kind: SignalKind, name: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                error!("Failed to install {} handler: {}", name, e);
                None
            }
        }
    }

    async fn recv(stream: Option<Signal>) {
        match stream {
            Some(mut stream) => {
                stream.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    let interrupt = install(SignalKind::interrupt(), "SIGINT");
    let terminate = install(SignalKind::terminate(), "SIGTERM");

    async move {
        tokio::select! {
            _ = recv(interrupt) => {},
            _ = recv(terminate) => {},
        }
        info!("Shutdown signal received");
    }
}

#[cfg(windows)]
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    let ctrl_c = tokio::signal::windows::ctrl_c();

    async move {
        match ctrl_c {
            Ok(mut ctrl_c) => {
                ctrl_c.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        }
        info!("Shutdown signal received");
    }
}
