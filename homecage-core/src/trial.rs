use serde::{Deserialize, Serialize};

/// Trial controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialState {
    /// Stimulus visible, waiting for a qualifying contact.
    Show,
    /// Blank inter-trial interval with a fixed end time.
    Iti,
    /// Blank, waiting for every contact to lift before the next stimulus.
    WaitRelease,
}

impl TrialState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrialState::Show => "SHOW",
            TrialState::Iti => "ITI",
            TrialState::WaitRelease => "WAIT_RELEASE",
        }
    }
}

/// Result of one completed trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialOutcome {
    Success,
    ErrorOutsideLimit,
}

impl TrialOutcome {
    pub fn is_correct(self) -> bool {
        matches!(self, TrialOutcome::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrialOutcome::Success => "success",
            TrialOutcome::ErrorOutsideLimit => "error",
        }
    }

    pub fn fail_reason(self) -> &'static str {
        match self {
            TrialOutcome::Success => "",
            TrialOutcome::ErrorOutsideLimit => "outside_limit",
        }
    }

    pub fn iti_kind(self) -> ItiKind {
        match self {
            TrialOutcome::Success => ItiKind::Correct,
            TrialOutcome::ErrorOutsideLimit => ItiKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItiKind {
    Correct,
    Error,
}

impl ItiKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItiKind::Correct => "correct",
            ItiKind::Error => "error",
        }
    }
}
