use crate::error::AnalysisError;
use std::fmt;

/// Stage in which an iteration gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Capture,
    Encode,
    Analysis,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Capture => f.write_str("capture"),
            FailureStage::Encode => f.write_str("encode"),
            FailureStage::Analysis => f.write_str("analysis"),
        }
    }
}

/// Recoverable failure handed to the presenter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationFailure {
    pub iteration: u64,
    pub stage: FailureStage,
    pub message: String,
}

/// How one cycle ended
#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    Presented,
    NoFrame,
    CaptureFailed,
    EncodeFailed,
    AnalysisFailed(AnalysisError),
}

/// Why the loop reached `Stopped`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Cancelled,
    IterationLimit(u64),
}
