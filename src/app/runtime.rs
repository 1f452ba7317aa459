use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Exit status after a forced SIGINT stop (128 + 2)
const FORCED_EXIT_SIGINT: i32 = 130;
/// Exit status after a forced SIGTERM stop (128 + 15)
const FORCED_EXIT_SIGTERM: i32 = 143;

/// What a stop signal should do given the current cancellation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum SignalAction {
    /// First signal: finish the in-flight cycle, then release and stop
    Cancel,
    /// Repeated signal while shutdown is already underway
    ForceExit,
}

pub(super) fn signal_action(already_cancelled: bool) -> SignalAction {
    if already_cancelled {
        SignalAction::ForceExit
    } else {
        SignalAction::Cancel
    }
}

fn handle_signal(token: &CancellationToken, name: &str, exit_code: i32) {
    match signal_action(token.is_cancelled()) {
        SignalAction::Cancel => {
            info!("Received {}, stopping after the current cycle", name);
            token.cancel();
        }
        SignalAction::ForceExit => {
            warn!("Received {} again, exiting immediately", name);
            std::process::exit(exit_code);
        }
    }
}

/// Cancel `token` on SIGINT (Ctrl+C) or SIGTERM. A second signal exits the
/// process without waiting for the in-flight call.
pub fn install_signal_handlers(token: CancellationToken) {
    // Handle SIGTERM (systemd stop) - Unix only
    #[cfg(unix)]
    {
        let token_sigterm = token.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    while sigterm.recv().await.is_some() {
                        handle_signal(&token_sigterm, "SIGTERM", FORCED_EXIT_SIGTERM);
                    }
                }
                Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
            }
        });
    }

    // Handle SIGINT (Ctrl+C) - Cross-platform
    tokio::spawn(async move {
        loop {
            match tokio::signal::ctrl_c().await {
                Ok(()) => handle_signal(&token, "SIGINT (Ctrl+C)", FORCED_EXIT_SIGINT),
                Err(e) => {
                    warn!("Failed to register SIGINT handler: {}", e);
                    break;
                }
            }
        }
    });
}
