use super::pacing::Pacer;
use super::state::LoopState;
use super::stats::LoopStats;
use super::types::{FailureStage, IterationFailure, IterationOutcome, ShutdownReason};
use crate::analysis::{AnalysisClient, AnalysisRequest};
use crate::camera::FrameSource;
use crate::config::RobowatchConfig;
use crate::encoder::FrameEncoder;
use crate::error::CameraError;
use crate::normalize::normalize;
use crate::presenter::Presenter;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

/// Drives capture → encode → analyze → present → pace, one iteration at a
/// time. Owns every collaborator for the lifetime of the loop.
pub struct LoopController<S, C, P>
where
    S: FrameSource,
    C: AnalysisClient,
    P: Presenter,
{
    config: Arc<RobowatchConfig>,
    pub(super) source: S,
    pub(super) client: C,
    presenter: P,
    encoder: FrameEncoder,
    pacer: Pacer,
    pub(super) stats: LoopStats,
    state: LoopState,
    iteration: u64,
    max_iterations: Option<u64>,
}

impl<S, C, P> LoopController<S, C, P>
where
    S: FrameSource,
    C: AnalysisClient,
    P: Presenter,
{
    pub fn new(config: Arc<RobowatchConfig>, source: S, client: C, presenter: P) -> Self {
        let encoder = FrameEncoder::new(&config.encoder);
        let pacer = Pacer::new(&config.pacing);

        Self {
            config,
            source,
            client,
            presenter,
            encoder,
            pacer,
            stats: LoopStats::default(),
            state: LoopState::Idle,
            iteration: 0,
            max_iterations: None,
        }
    }

    /// Stop after `max` cycles instead of waiting for cancellation
    pub fn with_max_iterations(mut self, max: Option<u64>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub(super) fn set_state(&mut self, next: LoopState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid loop transition {} -> {}",
            self.state,
            next
        );
        trace!("Loop state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Run until `cancel` fires or the iteration limit is hit, then release
    /// the frame source and the transport, in that order.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopStats {
        info!(
            "Capture loop started on {} (interval {:?})",
            self.source.describe(),
            self.pacer.interval()
        );

        let reason = loop {
            if cancel.is_cancelled() {
                break ShutdownReason::Cancelled;
            }

            self.run_iteration().await;

            if let Some(max) = self.max_iterations {
                if self.iteration >= max {
                    break ShutdownReason::IterationLimit(max);
                }
            }

            self.set_state(LoopState::Pacing);
            if self.pacer.wait(&cancel).await {
                break ShutdownReason::Cancelled;
            }
        };

        self.shutdown(reason).await
    }

    /// One full cycle without pacing. Makes at most one analysis call.
    pub async fn run_iteration(&mut self) -> IterationOutcome {
        self.iteration += 1;
        let span = info_span!(
            "iteration",
            n = self.iteration,
            id = %Uuid::new_v4()
        );

        let outcome = self.cycle().instrument(span).await;

        match &outcome {
            IterationOutcome::Presented => self.pacer.record_success(),
            IterationOutcome::AnalysisFailed(_) => self.pacer.record_failure(),
            IterationOutcome::NoFrame
            | IterationOutcome::CaptureFailed
            | IterationOutcome::EncodeFailed => {}
        }

        outcome
    }

    async fn cycle(&mut self) -> IterationOutcome {
        self.stats.record_iteration();

        self.set_state(LoopState::Capturing);
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(CameraError::NoFrame { details }) => {
                warn!("No frame available, skipping cycle: {}", details);
                self.stats.record_frame_skipped();
                return IterationOutcome::NoFrame;
            }
            Err(e) => {
                error!("Frame capture failed, skipping cycle: {}", e);
                self.stats.record_frame_skipped();
                self.report(FailureStage::Capture, e.to_string());
                return IterationOutcome::CaptureFailed;
            }
        };
        self.stats.record_frame_captured();
        trace!(
            "Captured frame {} ({}x{} {:?}, {} bytes)",
            frame.id,
            frame.width,
            frame.height,
            frame.format,
            frame.data.len()
        );

        self.set_state(LoopState::Encoding);
        let payload = match self.encoder.encode(frame) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Frame encoding failed, skipping cycle: {}", e);
                self.stats.record_frame_skipped();
                self.report(FailureStage::Encode, e.to_string());
                return IterationOutcome::EncodeFailed;
            }
        };
        trace!("Encoded payload: {} bytes", payload.size_bytes());

        self.set_state(LoopState::Analyzing);
        let request = AnalysisRequest::new(
            self.config.analysis.agent_id.as_str(),
            self.config.credential(),
            payload,
        );
        self.stats.record_analysis_attempt();
        let reply = match self.client.analyze(request).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(kind = e.kind(), "Error calling analysis tool: {}", e);
                self.stats.record_analysis_failure();
                self.report(FailureStage::Analysis, e.to_string());
                return IterationOutcome::AnalysisFailed(e);
            }
        };
        self.stats.record_analysis_success();

        self.set_state(LoopState::Presenting);
        let result = normalize(&reply);
        debug!(
            "Analysis result for {}: {} objects",
            result.agent_id,
            result.objects.len()
        );
        self.presenter.present(&result);

        IterationOutcome::Presented
    }

    fn report(&mut self, stage: FailureStage, message: String) {
        let failure = IterationFailure {
            iteration: self.iteration,
            stage,
            message,
        };
        self.presenter.report_failure(&failure);
    }
}
