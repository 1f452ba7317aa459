use std::time::SystemTime;

/// Counters for one run of the capture loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopStats {
    pub iterations: u64,
    pub frames_captured: u64,
    pub frames_skipped: u64,
    pub analyses_attempted: u64,
    pub analyses_succeeded: u64,
    pub analyses_failed: u64,
    pub last_result_time: Option<SystemTime>,
}

impl LoopStats {
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    pub fn record_frame_captured(&mut self) {
        self.frames_captured += 1;
    }

    /// No frame, capture error or encode failure
    pub fn record_frame_skipped(&mut self) {
        self.frames_skipped += 1;
    }

    pub fn record_analysis_attempt(&mut self) {
        self.analyses_attempted += 1;
    }

    pub fn record_analysis_success(&mut self) {
        self.analyses_succeeded += 1;
        self.last_result_time = Some(SystemTime::now());
    }

    pub fn record_analysis_failure(&mut self) {
        self.analyses_failed += 1;
    }

    pub fn analysis_success_rate(&self) -> f64 {
        if self.analyses_attempted == 0 {
            0.0
        } else {
            self.analyses_succeeded as f64 / self.analyses_attempted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut stats = LoopStats::default();
        assert_eq!(stats.analysis_success_rate(), 0.0);

        stats.record_analysis_attempt();
        stats.record_analysis_success();
        stats.record_analysis_attempt();
        stats.record_analysis_failure();

        assert_eq!(stats.analysis_success_rate(), 0.5);
        assert!(stats.last_result_time.is_some());
    }
}
