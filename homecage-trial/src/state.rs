use homecage_core::{
    ContactSet, Extent, GeometryLayout, HitArea, ItiKind, PlateLayout, Point, StimulusSet,
    TrialOutcome, TrialState,
};
use homecage_timing::Timer;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, TrialConfig};
use crate::error::TrialError;
use crate::input::{ContactEvent, InputQueue};
use crate::iti::{ItiSampler, SampledIti};
use crate::logger::EventLogger;
use crate::peripheral::Peripherals;
use crate::progression::ProgressionTracker;
use crate::record::{EventTag, LogRecord, Snapshot};
use crate::release::{GateStep, ReleaseGate};
use crate::sentinel::StopSentinel;
use crate::trial::{CorrectionState, TrialCounters, TrialResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    StopSentinel,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::QuitRequested => f.write_str("quit requested"),
            StopReason::StopSentinel => f.write_str("stop file present"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stop(StopReason),
}

/// Sequences SHOW, ITI and WAIT_RELEASE and owns every piece of trial-scoped state.
///
/// Driven by [`tick`](Self::tick) at a fixed rate. Each tick reads the clock once, handles
/// termination, drains a bounded batch of contact events in arrival order, then evaluates
/// the time-based transitions.
pub struct TrialController<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    config: TrialConfig,
    geometry: GeometryLayout,
    sampler: ItiSampler,
    gate: ReleaseGate,
    progression: ProgressionTracker,
    stimuli: Vec<StimulusSet>,
    timer: T,
    rng: R,
    peripherals: Peripherals,
    logger: EventLogger,
    sentinel: Option<StopSentinel>,
    screen: Extent,
    layout: PlateLayout,
    state: TrialState,
    contacts: ContactSet,
    counters: TrialCounters,
    correction: CorrectionState,
    outside_touches: u32,
    iti_end_ns: u64,
    wait_enter_ns: u64,
    touched_during_iti: bool,
    run_start_ns: u64,
    dropped_events: u64,
    last_result: Option<TrialResult>,
    frame_dirty: bool,
    started: bool,
}

impl<T, R> TrialController<T, R>
where
    T: Timer<Timestamp = u64>,
    R: Rng,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: TrialConfig,
        stimuli: Vec<StimulusSet>,
        screen: Extent,
        timer: T,
        mut rng: R,
        peripherals: Peripherals,
        logger: EventLogger,
        sentinel: Option<StopSentinel>,
    ) -> Result<Self, TrialError> {
        let config = config.validated()?;
        if stimuli.is_empty() {
            return Err(ConfigError::NoStimuli.into());
        }
        let geometry = GeometryLayout::new(config.layout.clone()).map_err(ConfigError::from)?;
        let (correct, error) = config.iti.ranges();
        let gate = ReleaseGate::new(Duration::from_millis(
            config.release.min_release_after_iti_touch_ms,
        ));
        let progression = ProgressionTracker::new(
            config.progression.sliding_n,
            config.progression.acc_threshold,
            config.progression.exclude_correction_from_acc,
            stimuli.len(),
        );
        let layout = geometry.place(screen, &mut rng);
        let run_start_ns = timer.now();

        Ok(Self {
            config,
            geometry,
            sampler: ItiSampler::new(correct, error),
            gate,
            progression,
            stimuli,
            timer,
            rng,
            peripherals,
            logger,
            sentinel,
            screen,
            layout,
            state: TrialState::Show,
            contacts: ContactSet::new(),
            counters: TrialCounters::default(),
            correction: CorrectionState::default(),
            outside_touches: 0,
            iti_end_ns: 0,
            wait_enter_ns: 0,
            touched_during_iti: false,
            run_start_ns,
            dropped_events: 0,
            last_result: None,
            frame_dirty: true,
            started: false,
        })
    }

    /// Logs the session start and presents the first trial. Called implicitly by the first tick.
    pub fn start(&mut self) -> Result<(), TrialError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let now = self.timer.now();
        info!(
            width = self.screen.width,
            height = self.screen.height,
            layout = self.geometry.config().arrangement.as_str(),
            sets = self.stimuli.len(),
            first_set = %self.current_set().label(),
            "session started"
        );
        self.warn_if_offset_clamped();
        let record = self.record(EventTag::SessionStart, now);
        self.emit(record)?;
        self.place_new_trial(now)
    }

    pub fn tick(&mut self, input: &mut InputQueue) -> Result<TickOutcome, TrialError> {
        if !self.started {
            self.start()?;
        }
        let now = self.timer.now();

        if input.quit_requested() {
            return Ok(TickOutcome::Stop(StopReason::QuitRequested));
        }
        if let Some(sentinel) = &self.sentinel {
            if sentinel.is_raised() {
                info!(path = %sentinel.path().display(), "stop file detected");
                return Ok(TickOutcome::Stop(StopReason::StopSentinel));
            }
        }

        let dropped = input.take_dropped();
        if dropped > 0 {
            self.dropped_events += dropped;
            warn!(dropped, total = self.dropped_events, "input queue overflowed");
            let record = self.record(EventTag::InputDropped, now);
            self.emit(record)?;
        }

        for _ in 0..self.config.run.max_events_per_tick {
            let Some(event) = input.pop() else {
                break;
            };
            self.handle_contact(event, now)?;
        }

        self.check_timers(now)?;
        Ok(TickOutcome::Continue)
    }

    /// Re-places the stimulus for a new screen size without touching trial state.
    pub fn resize(&mut self, screen: Extent) -> Result<(), TrialError> {
        if screen == self.screen {
            return Ok(());
        }
        let now = self.timer.now();
        self.screen = screen;
        self.layout = self.geometry.place(screen, &mut self.rng);
        self.frame_dirty = true;
        debug!(width = screen.width, height = screen.height, "layout recomputed");
        self.warn_if_offset_clamped();
        let record = self.record(EventTag::LayoutChanged, now);
        self.emit(record)
    }

    /// Logs the session end and flushes the log.
    pub fn shutdown(&mut self) -> Result<(), TrialError> {
        let now = self.timer.now();
        let record = self.record(EventTag::SessionEnd, now);
        let appended = self.logger.append(record);
        self.logger.flush()?;
        appended?;
        info!(
            trials = self.counters.global,
            successes = self.counters.successes,
            failures = self.counters.failures,
            set = %self.current_set().label(),
            rows = self.logger.written(),
            "session ended"
        );
        Ok(())
    }

    fn handle_contact(&mut self, event: ContactEvent, now: u64) -> Result<(), TrialError> {
        match event {
            ContactEvent::Up { contact } => {
                self.contacts.release(contact);
                Ok(())
            }
            ContactEvent::Down { contact, point } => {
                self.contacts.press(contact);
                match self.state {
                    TrialState::Show => match point {
                        Some(p) => self.on_show_touch(p, now),
                        None => Ok(()),
                    },
                    TrialState::Iti => {
                        self.touched_during_iti = true;
                        match point {
                            Some(p) => {
                                let area = self.classify(p);
                                let record = self
                                    .record(EventTag::TouchIti(area.side()), now)
                                    .with_point(Some(p))
                                    .with_hit_area(area);
                                self.emit(record)
                            }
                            None => Ok(()),
                        }
                    }
                    TrialState::WaitRelease => {
                        if self.gate.interrupt() {
                            let record = self
                                .record(EventTag::ReleaseDwellReset, now)
                                .with_point(point);
                            self.emit(record)?;
                        }
                        Ok(())
                    }
                }
            }
        }
    }

    fn classify(&self, p: Point) -> HitArea {
        HitArea::resolve(p, &self.layout, self.config.hit_margin_px)
    }

    fn on_show_touch(&mut self, p: Point, now: u64) -> Result<(), TrialError> {
        let area = self.classify(p);
        if area.is_hit() {
            self.on_correct(p, area, now)
        } else {
            self.on_outside(p, now)
        }
    }

    fn on_correct(&mut self, p: Point, area: HitArea, now: u64) -> Result<(), TrialError> {
        let pulse_ok = match self.peripherals.reward.pulse() {
            Ok(()) => true,
            Err(err) => {
                error!(%err, "reward pulse failed");
                false
            }
        };
        let audio = self.peripherals.audio.as_mut().map(|cue| cue.play());
        let audio_failed = match audio {
            Some(Err(err)) => {
                warn!(%err, "audio cue failed, disabling audio");
                self.peripherals.audio = None;
                true
            }
            _ => false,
        };

        let outcome = TrialOutcome::Success;
        let iti = self.sampler.sample(outcome.iti_kind(), &mut self.rng);
        let tag = if pulse_ok {
            EventTag::TouchCorrect
        } else {
            EventTag::TouchCorrectPulseFail
        };
        let record = self
            .record(tag, now)
            .with_point(Some(p))
            .with_hit_area(area)
            .with_iti(iti)
            .with_outcome(outcome);
        self.emit(record)?;
        if audio_failed {
            let record = self.record(EventTag::AudioFail, now).with_point(Some(p));
            self.emit(record)?;
        }

        if pulse_ok {
            self.counters.successes += 1;
        }
        let was_correction = self.correction.current_trial;
        if self.config.progression.correction_mode {
            self.correction.active = false;
        }
        self.complete_trial(outcome, area, iti, was_correction, true, now)
    }

    fn on_outside(&mut self, p: Point, now: u64) -> Result<(), TrialError> {
        self.outside_touches += 1;
        let record = self
            .record(EventTag::TouchOutside, now)
            .with_point(Some(p))
            .with_hit_area(HitArea::Outside);
        self.emit(record)?;
        if self.outside_touches < self.config.max_outside_before_fail {
            return Ok(());
        }

        self.counters.failures += 1;
        let outcome = TrialOutcome::ErrorOutsideLimit;
        let iti = self.sampler.sample(ItiKind::Error, &mut self.rng);
        let record = self
            .record(EventTag::FailOutsideLimit, now)
            .with_point(Some(p))
            .with_hit_area(HitArea::Outside)
            .with_iti(iti)
            .with_outcome(outcome);
        self.emit(record)?;

        let was_correction = self.correction.current_trial;
        let correction_mode = self.config.progression.correction_mode;
        if correction_mode {
            self.correction.active = true;
        }
        self.complete_trial(outcome, HitArea::Outside, iti, was_correction, !correction_mode, now)
    }

    fn complete_trial(
        &mut self,
        outcome: TrialOutcome,
        hit_area: HitArea,
        iti: SampledIti,
        is_correction_trial: bool,
        allow_advance: bool,
        now: u64,
    ) -> Result<(), TrialError> {
        self.counters.global += 1;
        self.counters.in_set += 1;
        self.last_result = Some(TrialResult {
            trial_index: self.counters.global,
            set_index: self.current_set().index,
            outcome,
            hit_area,
            iti,
            is_correction_trial,
            completed_ns: now,
        });

        let advanced =
            self.progression
                .record(outcome.is_correct(), is_correction_trial, allow_advance);
        if let Some(step) = advanced {
            self.counters.in_set = 0;
            self.correction.clear();
            info!(
                from = %self.stimuli[step.from].label(),
                to = %self.stimuli[step.to].label(),
                accuracy = step.accuracy,
                threshold = self.config.progression.acc_threshold,
                "advanced to next stimulus set"
            );
            let record = self.record(EventTag::SetAdvanced, now);
            self.emit(record)?;
        }

        self.state = TrialState::Iti;
        self.iti_end_ns = now.saturating_add(iti.duration_ns());
        self.touched_during_iti = !self.contacts.is_clear();
        self.frame_dirty = true;
        Ok(())
    }

    fn check_timers(&mut self, now: u64) -> Result<(), TrialError> {
        if self.state == TrialState::Iti && now >= self.iti_end_ns {
            self.state = TrialState::WaitRelease;
            self.wait_enter_ns = now;
            if self.gate.arm(self.touched_during_iti) {
                let record = self.record(EventTag::ReleaseDwellWillRequire, now);
                self.emit(record)?;
            }
        }
        if self.state != TrialState::WaitRelease {
            return Ok(());
        }

        match self.gate.poll(now, self.contacts.is_clear()) {
            GateStep::Blocked => {}
            GateStep::DwellStarted => {
                let record = self.record(EventTag::ReleaseDwellStart, now);
                self.emit(record)?;
            }
            GateStep::DwellReset => {
                let record = self.record(EventTag::ReleaseDwellReset, now);
                self.emit(record)?;
            }
            GateStep::Open => {
                if self.gate.is_required() {
                    let record = self.record(EventTag::ReleaseDwellOk, now);
                    self.emit(record)?;
                }
                return self.begin_show(now);
            }
        }

        let timeout_ns = self.config.release.wait_release_timeout_ms.saturating_mul(1_000_000);
        if now.saturating_sub(self.wait_enter_ns) >= timeout_ns && !self.contacts.is_clear() {
            let held = self.contacts.clear();
            warn!(held, "contacts held through release timeout, forcing release");
            let record = self.record(EventTag::ForcedRelease, now);
            self.emit(record)?;
            if self.gate.is_required() {
                if self.gate.force_start(now) {
                    let record = self.record(EventTag::ReleaseDwellStartForced, now);
                    self.emit(record)?;
                }
            } else {
                return self.begin_show(now);
            }
        }
        Ok(())
    }

    fn begin_show(&mut self, now: u64) -> Result<(), TrialError> {
        self.outside_touches = 0;
        self.touched_during_iti = false;
        self.gate.disarm();
        self.place_new_trial(now)
    }

    fn place_new_trial(&mut self, now: u64) -> Result<(), TrialError> {
        self.correction.current_trial =
            self.config.progression.correction_mode && self.correction.active;
        self.layout = self.geometry.place(self.screen, &mut self.rng);
        self.state = TrialState::Show;
        self.frame_dirty = true;
        let record = self.record(EventTag::TrialPlaced, now);
        self.emit(record)
    }

    fn warn_if_offset_clamped(&self) {
        if self.geometry.offset_clamped(self.screen) {
            warn!(
                configured = self.geometry.config().center_offset_px,
                applied = self.geometry.effective_offset(self.screen),
                "center offset clamped to keep plates on screen"
            );
        }
    }

    fn snapshot(&self, now: u64) -> Snapshot<'_> {
        Snapshot {
            elapsed_ns: now.saturating_sub(self.run_start_ns),
            state: self.state,
            layout: &self.layout,
            hit_margin_px: self.config.hit_margin_px,
            outside_in_trial: self.outside_touches,
            max_outside_before_fail: self.config.max_outside_before_fail,
            set: self.current_set(),
            set_position: self.progression.position(),
            counters: &self.counters,
            window: self.progression.window(),
            correction_mode: self.config.progression.correction_mode,
            correction: &self.correction,
            dropped_events: self.dropped_events,
        }
    }

    fn record(&self, tag: EventTag, now: u64) -> LogRecord {
        LogRecord::capture(tag, &self.snapshot(now))
    }

    /// Appends a row. A sink failure is fatal; buffered rows are flushed on a best-effort basis.
    fn emit(&mut self, record: LogRecord) -> Result<(), TrialError> {
        if let Err(err) = self.logger.append(record) {
            error!(%err, "event log write failed");
            if let Err(flush_err) = self.logger.flush() {
                error!(err = %flush_err, "event log flush failed");
            }
            return Err(err.into());
        }
        Ok(())
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn layout(&self) -> &PlateLayout {
        &self.layout
    }

    pub fn current_set(&self) -> &StimulusSet {
        &self.stimuli[self.progression.position()]
    }

    pub fn screen(&self) -> Extent {
        self.screen
    }

    pub fn counters(&self) -> &TrialCounters {
        &self.counters
    }

    pub fn correction(&self) -> &CorrectionState {
        &self.correction
    }

    pub fn progression(&self) -> &ProgressionTracker {
        &self.progression
    }

    pub fn outside_touches(&self) -> u32 {
        self.outside_touches
    }

    /// The most recently completed trial.
    pub fn last_result(&self) -> Option<&TrialResult> {
        self.last_result.as_ref()
    }

    pub fn contacts(&self) -> &ContactSet {
        &self.contacts
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// True once after anything visible changed.
    pub fn take_frame_dirty(&mut self) -> bool {
        std::mem::take(&mut self.frame_dirty)
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    pub fn log_path(&self) -> Option<&std::path::Path> {
        self.logger.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PeripheralError;
    use crate::logger::MemorySink;
    use crate::peripheral::RewardPulse;
    use chrono::Local;
    use homecage_timing::ManualTimer;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct NoopPulse;

    impl RewardPulse for NoopPulse {
        fn pulse(&mut self) -> Result<(), PeripheralError> {
            Ok(())
        }
    }

    fn controller(
        stimuli: Vec<StimulusSet>,
    ) -> Result<(TrialController<ManualTimer, StdRng>, MemorySink), TrialError> {
        let sink = MemorySink::new();
        let logger = EventLogger::new(Box::new(sink.clone()), 64, Local::now());
        let controller = TrialController::new(
            TrialConfig::default(),
            stimuli,
            Extent::new(1280, 720),
            ManualTimer::new(),
            StdRng::seed_from_u64(7),
            Peripherals::new(Box::new(NoopPulse)),
            logger,
            None,
        )?;
        Ok((controller, sink))
    }

    #[test]
    fn empty_curriculum_is_rejected() {
        let err = controller(Vec::new()).err().unwrap();
        assert!(matches!(err, TrialError::Config(ConfigError::NoStimuli)));
    }

    #[test]
    fn start_logs_session_and_first_placement() {
        let (mut controller, sink) = controller(vec![StimulusSet::placeholder(1)]).unwrap();
        controller.start().unwrap();
        controller.start().unwrap();
        let events: Vec<_> = sink.rows().iter().map(|r| r.event).collect();
        assert_eq!(events, vec!["SESSION_START", "TRIAL_PLACED"]);
        assert_eq!(controller.state(), TrialState::Show);
        assert!(controller.take_frame_dirty());
        assert!(!controller.take_frame_dirty());
    }

    #[test]
    fn resize_replaces_layout_in_place() {
        let (mut controller, sink) = controller(vec![StimulusSet::placeholder(1)]).unwrap();
        controller.start().unwrap();
        controller.resize(Extent::new(1920, 1080)).unwrap();
        let left = controller.layout().plates()[0].plate;
        assert_eq!((left.x, left.y), (540, 420));
        assert_eq!(controller.state(), TrialState::Show);
        assert_eq!(sink.rows().last().map(|r| r.event), Some("LAYOUT_CHANGED"));
    }

    #[test]
    fn shutdown_flushes_session_end() {
        let (mut controller, sink) = controller(vec![StimulusSet::placeholder(1)]).unwrap();
        controller.start().unwrap();
        controller.shutdown().unwrap();
        assert_eq!(sink.rows().last().map(|r| r.event), Some("SESSION_END"));
        assert_eq!(sink.flush_count(), 1);
    }
}
