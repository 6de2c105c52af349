#![allow(dead_code)]

use chrono::Local;
use homecage_core::{ContactId, Extent, Point, StimulusSet};
use homecage_timing::ManualTimer;
use homecage_trial::{
    AudioCue, ContactEvent, EventLogger, InputEvent, InputQueue, LogRecord, MemorySink,
    PeripheralError, Peripherals, RewardPulse, StopSentinel, TickOutcome, TrialConfig,
    TrialController,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Inside the left plate core on a 1280x720 screen with the default layout.
pub const LEFT: Point = Point::new(340, 360);
pub const RIGHT: Point = Point::new(940, 360);
pub const OUTSIDE: Point = Point::new(10, 10);

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct CountingPulse {
    pub calls: Counter,
    pub fail: bool,
}

impl RewardPulse for CountingPulse {
    fn pulse(&mut self) -> Result<(), PeripheralError> {
        self.calls.bump();
        if self.fail {
            Err(PeripheralError::Write {
                device: "/dev/null-pulse".into(),
                source: std::io::Error::other("unplugged"),
            })
        } else {
            Ok(())
        }
    }
}

pub struct CountingAudio {
    pub calls: Counter,
    pub fail: bool,
}

impl AudioCue for CountingAudio {
    fn play(&mut self) -> Result<(), PeripheralError> {
        self.calls.bump();
        if self.fail {
            Err(PeripheralError::Audio("no output device".into()))
        } else {
            Ok(())
        }
    }
}

/// ITI of zero and no release dwell: one tap completes a trial within a single tick.
pub fn fast_config() -> TrialConfig {
    let mut config = TrialConfig::default();
    config.iti.base_min_ms = 0;
    config.iti.base_max_ms = 0;
    config.release.min_release_after_iti_touch_ms = 0;
    config
}

pub struct Rig {
    pub controller: TrialController<ManualTimer, StdRng>,
    pub timer: ManualTimer,
    pub queue: InputQueue,
    pub sink: MemorySink,
    pub pulses: Counter,
    pub audio: Counter,
}

pub struct RigBuilder {
    config: TrialConfig,
    sets: u32,
    fail_pulse: bool,
    audio: Option<bool>,
    sentinel: Option<StopSentinel>,
}

impl RigBuilder {
    pub fn new(config: TrialConfig) -> Self {
        Self {
            config,
            sets: 1,
            fail_pulse: false,
            audio: None,
            sentinel: None,
        }
    }

    pub fn sets(mut self, sets: u32) -> Self {
        self.sets = sets;
        self
    }

    pub fn failing_pulse(mut self) -> Self {
        self.fail_pulse = true;
        self
    }

    pub fn audio(mut self, fail: bool) -> Self {
        self.audio = Some(fail);
        self
    }

    pub fn sentinel(mut self, sentinel: StopSentinel) -> Self {
        self.sentinel = Some(sentinel);
        self
    }

    pub fn build(self) -> Rig {
        let timer = ManualTimer::new();
        let sink = MemorySink::new();
        let pulses = Counter::default();
        let audio = Counter::default();

        let mut peripherals = Peripherals::new(Box::new(CountingPulse {
            calls: pulses.clone(),
            fail: self.fail_pulse,
        }));
        if let Some(fail) = self.audio {
            peripherals = peripherals.with_audio(Box::new(CountingAudio {
                calls: audio.clone(),
                fail,
            }));
        }
        let logger = EventLogger::new(Box::new(sink.clone()), 64, Local::now());
        let stimuli = (1..=self.sets).map(StimulusSet::placeholder).collect();
        let queue = InputQueue::new(self.config.run.input_queue_capacity);
        let mut controller = TrialController::new(
            self.config,
            stimuli,
            Extent::new(1280, 720),
            timer.clone(),
            StdRng::seed_from_u64(11),
            peripherals,
            logger,
            self.sentinel,
        )
        .unwrap();
        controller.start().unwrap();

        Rig {
            controller,
            timer,
            queue,
            sink,
            pulses,
            audio,
        }
    }
}

impl Rig {
    pub fn down(&mut self, finger: u64, point: Point) {
        self.queue.push(InputEvent::Contact(ContactEvent::Down {
            contact: ContactId::Finger(finger),
            point: Some(point),
        }));
    }

    pub fn up(&mut self, finger: u64) {
        self.queue.push(InputEvent::Contact(ContactEvent::Up {
            contact: ContactId::Finger(finger),
        }));
    }

    /// Press and release within one tick.
    pub fn tap(&mut self, point: Point) {
        self.down(1, point);
        self.up(1);
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.controller.tick(&mut self.queue).unwrap()
    }

    pub fn tap_and_tick(&mut self, point: Point) -> TickOutcome {
        self.tap(point);
        self.tick()
    }

    pub fn advance_and_tick(&mut self, ms: u64) -> TickOutcome {
        self.timer.advance_ms(ms);
        self.tick()
    }

    pub fn rows(&self) -> Vec<LogRecord> {
        self.sink.rows()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.rows().iter().map(|r| r.event).collect()
    }

    pub fn rows_for(&self, event: &str) -> Vec<LogRecord> {
        self.rows().into_iter().filter(|r| r.event == event).collect()
    }
}
