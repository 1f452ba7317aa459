use super::controller::LoopController;
use super::state::LoopState;
use super::stats::LoopStats;
use super::types::ShutdownReason;
use crate::analysis::AnalysisClient;
use crate::camera::FrameSource;
use crate::presenter::Presenter;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Upper bound on releasing transport state at shutdown
const CLIENT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

impl<S, C, P> LoopController<S, C, P>
where
    S: FrameSource,
    C: AnalysisClient,
    P: Presenter,
{
    /// Enter `Stopped`: release the frame source, then the transport
    pub(super) async fn shutdown(mut self, reason: ShutdownReason) -> LoopStats {
        info!("Stopping capture loop: {:?}", reason);
        self.set_state(LoopState::Stopped);

        info!("Releasing frame source {}", self.source.describe());
        self.source.release();

        if timeout(CLIENT_CLOSE_TIMEOUT, self.client.close()).await.is_err() {
            warn!(
                "Analysis client did not close within {:?}",
                CLIENT_CLOSE_TIMEOUT
            );
        }

        let stats = self.stats.clone();
        info!(
            "Capture loop stopped after {} iterations ({} frames captured, {} skipped, {}/{} analyses succeeded)",
            stats.iterations,
            stats.frames_captured,
            stats.frames_skipped,
            stats.analyses_succeeded,
            stats.analyses_attempted
        );
        stats
    }
}
