use std::time::Duration;

/// Result of polling the release gate once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStep {
    Blocked,
    DwellStarted,
    DwellReset,
    Open,
}

/// Decides when WAIT_RELEASE may hand back to SHOW.
///
/// If the screen was touched during the ITI, every contact must stay up for a continuous
/// dwell before the next stimulus. Any contact restarts the dwell from scratch.
#[derive(Debug, Clone)]
pub struct ReleaseGate {
    min_dwell_ns: u64,
    required: bool,
    clear_since: Option<u64>,
}

impl ReleaseGate {
    pub fn new(min_dwell: Duration) -> Self {
        Self {
            min_dwell_ns: min_dwell.as_nanos() as u64,
            required: false,
            clear_since: None,
        }
    }

    /// Called on entering WAIT_RELEASE. Returns whether a dwell is now required.
    pub fn arm(&mut self, touched_during_iti: bool) -> bool {
        self.required = touched_during_iti && self.min_dwell_ns > 0;
        self.clear_since = None;
        self.required
    }

    pub fn disarm(&mut self) {
        self.required = false;
        self.clear_since = None;
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn dwell_started_at(&self) -> Option<u64> {
        self.clear_since
    }

    pub fn poll(&mut self, now_ns: u64, contacts_clear: bool) -> GateStep {
        if !self.required {
            return if contacts_clear {
                GateStep::Open
            } else {
                GateStep::Blocked
            };
        }
        if !contacts_clear {
            return if self.clear_since.take().is_some() {
                GateStep::DwellReset
            } else {
                GateStep::Blocked
            };
        }
        match self.clear_since {
            None => {
                self.clear_since = Some(now_ns);
                GateStep::DwellStarted
            }
            Some(start) if now_ns.saturating_sub(start) >= self.min_dwell_ns => GateStep::Open,
            Some(_) => GateStep::Blocked,
        }
    }

    /// A contact went down. Returns true if a running dwell was discarded.
    pub fn interrupt(&mut self) -> bool {
        self.required && self.clear_since.take().is_some()
    }

    /// Starts the dwell at a forced release. Returns true if a dwell was started.
    pub fn force_start(&mut self, now_ns: u64) -> bool {
        if self.required && self.clear_since.is_none() {
            self.clear_since = Some(now_ns);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn no_touch_during_iti_opens_on_release() {
        let mut gate = ReleaseGate::new(Duration::from_millis(2000));
        assert!(!gate.arm(false));
        assert_eq!(gate.poll(0, false), GateStep::Blocked);
        assert_eq!(gate.poll(MS, true), GateStep::Open);
    }

    #[test]
    fn zero_dwell_is_never_required() {
        let mut gate = ReleaseGate::new(Duration::ZERO);
        assert!(!gate.arm(true));
        assert_eq!(gate.poll(0, true), GateStep::Open);
    }

    #[test]
    fn dwell_must_be_continuous() {
        let mut gate = ReleaseGate::new(Duration::from_millis(2000));
        assert!(gate.arm(true));
        assert_eq!(gate.poll(0, true), GateStep::DwellStarted);
        assert_eq!(gate.poll(1999 * MS, true), GateStep::Blocked);
        assert_eq!(gate.poll(2000 * MS, false), GateStep::DwellReset);
        assert_eq!(gate.poll(2100 * MS, true), GateStep::DwellStarted);
        assert_eq!(gate.poll(4099 * MS, true), GateStep::Blocked);
        assert_eq!(gate.poll(4100 * MS, true), GateStep::Open);
    }

    #[test]
    fn interrupt_discards_running_dwell() {
        let mut gate = ReleaseGate::new(Duration::from_millis(2000));
        gate.arm(true);
        assert!(!gate.interrupt());
        gate.poll(0, true);
        assert!(gate.interrupt());
        assert_eq!(gate.dwell_started_at(), None);
        assert_eq!(gate.poll(500 * MS, true), GateStep::DwellStarted);
        assert_eq!(gate.dwell_started_at(), Some(500 * MS));
    }

    #[test]
    fn forced_release_starts_dwell_once() {
        let mut gate = ReleaseGate::new(Duration::from_millis(2000));
        gate.arm(true);
        assert!(gate.force_start(2000 * MS));
        assert!(!gate.force_start(2100 * MS));
        assert_eq!(gate.poll(3999 * MS, true), GateStep::Blocked);
        assert_eq!(gate.poll(4000 * MS, true), GateStep::Open);
    }
}
