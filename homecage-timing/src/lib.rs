pub mod timer;

pub use timer::{CalibrationStats, FrameHistory, HighPrecisionTimer, ManualTimer, Timer};
