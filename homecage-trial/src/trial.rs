use homecage_core::{HitArea, TrialOutcome};

use crate::iti::SampledIti;

/// Trial-scoped counters owned by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrialCounters {
    /// Completed trials in the run.
    pub global: u64,
    /// Completed trials since the current stimulus set became active.
    pub in_set: u64,
    /// Correct trials whose reward pulse was delivered.
    pub successes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CorrectionState {
    /// Set by a failure in correction mode; the next trial repeats as a correction trial.
    pub active: bool,
    /// Whether the trial currently on screen is a correction trial.
    pub current_trial: bool,
}

impl CorrectionState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Summary of one completed trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    /// 1-based global index.
    pub trial_index: u64,
    pub set_index: u32,
    pub outcome: TrialOutcome,
    pub hit_area: HitArea,
    pub iti: SampledIti,
    pub is_correction_trial: bool,
    pub completed_ns: u64,
}
