pub mod config;
pub mod error;
pub mod input;
pub mod iti;
pub mod logger;
pub mod peripheral;
pub mod progression;
pub mod record;
pub mod release;
pub mod sentinel;
pub mod state;
pub mod trial;

pub use config::{
    ConfigError, ItiConfig, LogConfig, LoopConfig, ProgressionConfig, ReleaseConfig, TrialConfig,
};
pub use error::{LogError, PeripheralError, TrialError};
pub use input::{ContactEvent, InputEvent, InputQueue};
pub use iti::{ItiRange, ItiSampler, SampledIti};
pub use logger::{CsvSink, EventLogger, JsonLinesSink, LogFormat, MemorySink, RecordSink};
pub use peripheral::{AudioCue, Peripherals, RewardPulse};
pub use progression::{Advancement, ProgressionTracker, SlidingWindow};
pub use record::{EventTag, LogRecord, Snapshot};
pub use release::{GateStep, ReleaseGate};
pub use sentinel::StopSentinel;
pub use state::{StopReason, TickOutcome, TrialController};
pub use trial::{CorrectionState, TrialCounters, TrialResult};
