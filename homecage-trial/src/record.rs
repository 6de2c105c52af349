use homecage_core::{
    HitArea, PlateLayout, Point, Rect, Side, StimulusSet, TrialOutcome, TrialState,
    stimulus::image_name,
};
use serde::Serialize;

use crate::iti::SampledIti;
use crate::progression::SlidingWindow;
use crate::trial::{CorrectionState, TrialCounters};

/// Value of the `event` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTag {
    SessionStart,
    TrialPlaced,
    LayoutChanged,
    TouchCorrect,
    TouchCorrectPulseFail,
    AudioFail,
    TouchOutside,
    FailOutsideLimit,
    /// Touch during the ITI; `None` when it missed every plate.
    TouchIti(Option<Side>),
    ReleaseDwellWillRequire,
    ReleaseDwellStart,
    ReleaseDwellStartForced,
    ReleaseDwellReset,
    ReleaseDwellOk,
    ForcedRelease,
    SetAdvanced,
    InputDropped,
    SessionEnd,
}

impl EventTag {
    pub fn as_str(self) -> &'static str {
        match self {
            EventTag::SessionStart => "SESSION_START",
            EventTag::TrialPlaced => "TRIAL_PLACED",
            EventTag::LayoutChanged => "LAYOUT_CHANGED",
            EventTag::TouchCorrect => "TOUCH_CORRECT",
            EventTag::TouchCorrectPulseFail => "TOUCH_CORRECT_PULSE_FAIL",
            EventTag::AudioFail => "AUDIO_FAIL",
            EventTag::TouchOutside => "TOUCH_OUTSIDE",
            EventTag::FailOutsideLimit => "FAIL_OUTSIDE_LIMIT",
            EventTag::TouchIti(Some(Side::Left)) => "TOUCH_ITI_LEFT",
            EventTag::TouchIti(Some(Side::Right)) => "TOUCH_ITI_RIGHT",
            EventTag::TouchIti(Some(Side::Center)) => "TOUCH_ITI_CENTER",
            EventTag::TouchIti(None) => "TOUCH_ITI_OUTSIDE",
            EventTag::ReleaseDwellWillRequire => "RELEASE_DWELL_WILL_REQUIRE",
            EventTag::ReleaseDwellStart => "RELEASE_DWELL_START",
            EventTag::ReleaseDwellStartForced => "RELEASE_DWELL_START_FORCED",
            EventTag::ReleaseDwellReset => "RELEASE_DWELL_RESET",
            EventTag::ReleaseDwellOk => "RELEASE_DWELL_OK",
            EventTag::ForcedRelease => "FORCED_RELEASE",
            EventTag::SetAdvanced => "SET_ADVANCED",
            EventTag::InputDropped => "INPUT_DROPPED",
            EventTag::SessionEnd => "SESSION_END",
        }
    }
}

impl std::fmt::Display for EventTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view of controller state at the moment an event is logged.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub elapsed_ns: u64,
    pub state: TrialState,
    pub layout: &'a PlateLayout,
    pub hit_margin_px: u32,
    pub outside_in_trial: u32,
    pub max_outside_before_fail: u32,
    pub set: &'a StimulusSet,
    /// 0-based curriculum position.
    pub set_position: usize,
    pub counters: &'a TrialCounters,
    pub window: &'a SlidingWindow,
    pub correction_mode: bool,
    pub correction: &'a CorrectionState,
    pub dropped_events: u64,
}

/// One row of the experimental log. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub start_iso: String,
    pub iso: String,
    pub rel_s: String,
    pub state: &'static str,
    pub x: i32,
    pub y: i32,
    pub left_x: Option<i32>,
    pub left_y: Option<i32>,
    pub left_w: Option<i32>,
    pub left_h: Option<i32>,
    pub right_x: Option<i32>,
    pub right_y: Option<i32>,
    pub right_w: Option<i32>,
    pub right_h: Option<i32>,
    pub left_plate_x: Option<i32>,
    pub left_plate_y: Option<i32>,
    pub left_plate_w: Option<i32>,
    pub left_plate_h: Option<i32>,
    pub right_plate_x: Option<i32>,
    pub right_plate_y: Option<i32>,
    pub right_plate_w: Option<i32>,
    pub right_plate_h: Option<i32>,
    pub hit_margin_px: u32,
    pub hit_area: &'static str,
    pub event: &'static str,
    pub iti_ms: u64,
    pub iti_kind: &'static str,
    pub outside_in_trial: u32,
    pub max_outside_before_fail: u32,
    pub trial_outcome: &'static str,
    pub fail_reason: &'static str,
    pub stim_set: String,
    pub left_image: String,
    pub right_image: String,
    pub target_image: String,
    pub non_target_image: String,
    pub trial_index_global: u64,
    pub trial_index_in_set: u64,
    pub sliding_n: usize,
    pub sliding_correct: usize,
    pub sliding_acc: f64,
    pub correction_mode: u8,
    pub is_correction_trial: u8,
    pub layout: &'static str,
    pub successes: u64,
    pub failures: u64,
    pub set_position: usize,
    pub dropped_events: u64,
}

fn split(rect: Option<&Rect>) -> [Option<i32>; 4] {
    match rect {
        Some(r) => [Some(r.x), Some(r.y), Some(r.width), Some(r.height)],
        None => [None; 4],
    }
}

impl LogRecord {
    /// Captures the full state for `event`. Timestamps are stamped by the logger on append.
    pub fn capture(event: EventTag, snap: &Snapshot<'_>) -> Self {
        let left = snap.layout.primary();
        let right = snap.layout.plate(Side::Right);
        let [left_x, left_y, left_w, left_h] = split(left.map(|p| &p.image));
        let [right_x, right_y, right_w, right_h] = split(right.map(|p| &p.image));
        let [left_plate_x, left_plate_y, left_plate_w, left_plate_h] =
            split(left.map(|p| &p.plate));
        let [right_plate_x, right_plate_y, right_plate_w, right_plate_h] =
            split(right.map(|p| &p.plate));

        let reward = image_name(snap.set.reward_image.as_deref());
        let right_image = if right.is_some() {
            image_name(snap.set.right_image())
        } else {
            String::new()
        };

        Self {
            start_iso: String::new(),
            iso: String::new(),
            rel_s: format!("{:.6}", snap.elapsed_ns as f64 / 1e9),
            state: snap.state.as_str(),
            x: -1,
            y: -1,
            left_x,
            left_y,
            left_w,
            left_h,
            right_x,
            right_y,
            right_w,
            right_h,
            left_plate_x,
            left_plate_y,
            left_plate_w,
            left_plate_h,
            right_plate_x,
            right_plate_y,
            right_plate_w,
            right_plate_h,
            hit_margin_px: snap.hit_margin_px,
            hit_area: "",
            event: event.as_str(),
            iti_ms: 0,
            iti_kind: "",
            outside_in_trial: snap.outside_in_trial,
            max_outside_before_fail: snap.max_outside_before_fail,
            trial_outcome: "",
            fail_reason: "",
            stim_set: snap.set.label(),
            left_image: image_name(snap.set.left_image()),
            right_image,
            target_image: reward,
            non_target_image: image_name(snap.set.non_reward_image.as_deref()),
            trial_index_global: snap.counters.global,
            trial_index_in_set: snap.counters.in_set,
            sliding_n: snap.window.capacity(),
            sliding_correct: snap.window.correct_count(),
            sliding_acc: snap.window.accuracy(),
            correction_mode: u8::from(snap.correction_mode),
            is_correction_trial: u8::from(snap.correction.current_trial),
            layout: snap.layout.arrangement().as_str(),
            successes: snap.counters.successes,
            failures: snap.counters.failures,
            set_position: snap.set_position + 1,
            dropped_events: snap.dropped_events,
        }
    }

    pub fn with_point(mut self, point: Option<Point>) -> Self {
        if let Some(p) = point {
            self.x = p.x;
            self.y = p.y;
        }
        self
    }

    pub fn with_hit_area(mut self, area: HitArea) -> Self {
        self.hit_area = area.label();
        self
    }

    pub fn with_iti(mut self, iti: SampledIti) -> Self {
        self.iti_ms = iti.ms;
        self.iti_kind = iti.kind.as_str();
        self
    }

    pub fn with_outcome(mut self, outcome: TrialOutcome) -> Self {
        self.trial_outcome = outcome.as_str();
        self.fail_reason = outcome.fail_reason();
        self
    }
}
