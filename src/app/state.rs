use std::fmt;

/// Capture loop states. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Capturing,
    Encoding,
    Analyzing,
    Presenting,
    Pacing,
    Stopped,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped)
    }

    /// Whether the cycle allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: LoopState) -> bool {
        use LoopState::*;

        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            // run_iteration may be driven directly without pacing
            (_, Capturing) => true,
            (Capturing, Encoding) | (Capturing, Pacing) => true,
            (Encoding, Analyzing) | (Encoding, Pacing) => true,
            (Analyzing, Presenting) | (Analyzing, Pacing) => true,
            (Presenting, Pacing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Idle => "idle",
            LoopState::Capturing => "capturing",
            LoopState::Encoding => "encoding",
            LoopState::Analyzing => "analyzing",
            LoopState::Presenting => "presenting",
            LoopState::Pacing => "pacing",
            LoopState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
