mod common;

use common::{LEFT, OUTSIDE, RigBuilder, fast_config};
use homecage_trial::TrialConfig;

fn correction_config(exclude: bool) -> TrialConfig {
    let mut config = fast_config();
    config.max_outside_before_fail = 1;
    config.progression.correction_mode = true;
    config.progression.exclude_correction_from_acc = exclude;
    config
}

#[test]
fn failure_marks_next_trial_as_correction() {
    let mut rig = RigBuilder::new(correction_config(false)).build();
    rig.tap_and_tick(OUTSIDE);
    assert!(rig.controller.correction().active);
    assert!(rig.controller.correction().current_trial);
    let placed = rig.rows_for("TRIAL_PLACED").pop().unwrap();
    assert_eq!((placed.correction_mode, placed.is_correction_trial), (1, 1));

    rig.tap_and_tick(LEFT);
    assert!(!rig.controller.correction().active);
    assert!(rig.controller.last_result().unwrap().is_correction_trial);
    let placed = rig.rows_for("TRIAL_PLACED").pop().unwrap();
    assert_eq!(placed.is_correction_trial, 0);
}

#[test]
fn correction_trials_can_be_excluded_from_window() {
    let mut rig = RigBuilder::new(correction_config(true)).build();
    rig.tap_and_tick(OUTSIDE);
    assert_eq!(rig.controller.progression().window().len(), 1);

    // repeated failure of a correction trial stays out of the window
    rig.tap_and_tick(OUTSIDE);
    rig.tap_and_tick(LEFT);
    assert_eq!(rig.controller.progression().window().len(), 1);

    rig.tap_and_tick(LEFT);
    assert_eq!(rig.controller.progression().window().len(), 2);
}

#[test]
fn correction_trials_count_when_not_excluded() {
    let mut rig = RigBuilder::new(correction_config(false)).build();
    rig.tap_and_tick(OUTSIDE);
    rig.tap_and_tick(LEFT);
    assert_eq!(rig.controller.progression().window().len(), 2);
    assert_eq!(rig.controller.progression().window().correct_count(), 1);
}

#[test]
fn failure_never_advances_in_correction_mode() {
    let mut config = correction_config(false);
    config.progression.sliding_n = 2;
    config.progression.acc_threshold = 0.4;
    let mut rig = RigBuilder::new(config).sets(2).build();

    rig.tap_and_tick(LEFT);
    // window now [true, false], accuracy 0.5 > 0.4, but the failing trial may not advance
    rig.tap_and_tick(OUTSIDE);
    assert_eq!(rig.controller.progression().position(), 0);
    assert!(rig.controller.correction().active);

    // window [false, true] on a successful trial advances and clears correction state
    rig.tap_and_tick(LEFT);
    assert_eq!(rig.controller.progression().position(), 1);
    assert!(!rig.controller.correction().active);
    assert!(!rig.controller.correction().current_trial);
}
