use crate::error::PeripheralError;

/// Fire-and-forget reward trigger. Must not block the tick beyond a short write timeout.
pub trait RewardPulse {
    fn pulse(&mut self) -> Result<(), PeripheralError>;
}

/// Feedback sound played on a correct contact.
pub trait AudioCue {
    fn play(&mut self) -> Result<(), PeripheralError>;
}

/// External collaborators driven by the controller on a correct contact.
pub struct Peripherals {
    pub reward: Box<dyn RewardPulse>,
    /// Dropped after the first failure.
    pub audio: Option<Box<dyn AudioCue>>,
}

impl Peripherals {
    pub fn new(reward: Box<dyn RewardPulse>) -> Self {
        Self {
            reward,
            audio: None,
        }
    }

    pub fn with_audio(mut self, audio: Box<dyn AudioCue>) -> Self {
        self.audio = Some(audio);
        self
    }
}

impl std::fmt::Debug for Peripherals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peripherals")
            .field("audio", &self.audio.is_some())
            .finish_non_exhaustive()
    }
}
