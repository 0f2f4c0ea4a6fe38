//! # Revision Loop
//!
//! Counts revise/re-verify passes and decides when the loop ends.

/// Bounded revise/re-verify loop
#[derive(Debug, Clone)]
pub struct RevisionLoop {
    /// Completed passes
    pub completed: u32,
    /// At least one pass always runs
    pub max_passes: u32,
}

impl RevisionLoop {
    pub fn new(max_passes: u32) -> Self {
        Self {
            completed: 0,
            max_passes: max_passes.max(1),
        }
    }

    /// 1-based number of the pass about to start
    pub fn next_pass(&self) -> u32 {
        self.completed + 1
    }

    /// Record a finished re-verification pass.
    ///
    /// Returns `true` when another pass should run: the rate is below the
    /// threshold and the cap is not reached.
    pub fn finish_pass(&mut self, verification_rate: f64, threshold: f64) -> bool {
        self.completed += 1;
        verification_rate < threshold && self.completed < self.max_passes
    }
}
