//! Graceful shutdown utilities
//!
//! Provides unified shutdown signal handling for the service binaries, plus a
//! SIGHUP hook for reloading settings in place.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
///
/// # Example
///
/// ```ignore
/// tokio::select! {
///     _ = common::shutdown::wait_for_shutdown() => {
///         info!("Shutdown signal received");
///     }
///     // ... other tasks
/// }
/// ```
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("SIGTERM handler unavailable ({}), only Ctrl+C will stop the service", e);
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                match term_signal {
                    Some(mut sig) => { sig.recv().await; },
                    None => std::future::pending::<()>().await,
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Cancel `token` once a shutdown signal arrives
///
/// Returns the watcher task; it also exits quietly if the token is cancelled
/// by someone else first.
pub fn cancel_on_shutdown(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                token.cancel();
            }
            () = token.cancelled() => {}
        }
    })
}

/// Run `on_reload` for every SIGHUP until `token` is cancelled
///
/// On platforms without SIGHUP the task only waits for cancellation.
pub fn reload_on_hangup<F>(token: CancellationToken, on_reload: F) -> JoinHandle<()>
where
    F: Fn() + Send + 'static,
{
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut hangup = match signal(SignalKind::hangup()) {
                Ok(sig) => sig,
                Err(e) => {
                    warn!("SIGHUP handler unavailable ({}), reload disabled", e);
                    token.cancelled().await;
                    return;
                },
            };
            loop {
                tokio::select! {
                    received = hangup.recv() => {
                        if received.is_none() {
                            break;
                        }
                        info!("SIGHUP received, reloading");
                        on_reload();
                    }
                    () = token.cancelled() => break,
                }
            }
        }
        #[cfg(not(unix))]
        {
            let _ = on_reload;
            token.cancelled().await;
        }
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_watcher_exits_when_token_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let watcher = cancel_on_shutdown(token.clone());
        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), watcher)
            .await
            .expect("watcher should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_reload_listener_stops_on_cancel() {
        let token = CancellationToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let listener = reload_on_hangup(token.clone(), move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        token.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), listener)
            .await
            .expect("listener should stop")
            .unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }
}
