use homecage_timing::Timer;
use std::time::Duration;

/// Waits at or below this are slept on the timer instead of handed to the event loop,
/// whose wake-ups are only millisecond-accurate.
pub const PRECISE_WINDOW: Duration = Duration::from_millis(1);

/// Fixed-rate tick schedule on the controller's clock.
#[derive(Debug, Clone)]
pub struct TickPacer {
    interval_ns: u64,
    precise_window_ns: u64,
    next_ns: Option<u64>,
}

impl TickPacer {
    pub fn new(tick_hz: u32, precise_window: Duration) -> Self {
        Self {
            interval_ns: 1_000_000_000 / u64::from(tick_hz.max(1)),
            precise_window_ns: precise_window.as_nanos() as u64,
            next_ns: None,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_nanos(self.interval_ns)
    }

    /// Returns true when a tick should run now and schedules the one after it.
    ///
    /// A tick less than the precise window away is waited out with `Timer::sleep`. After a
    /// stall the schedule restarts from now rather than running the missed ticks back to back.
    pub fn poll<T: Timer<Timestamp = u64>>(&mut self, timer: &T) -> bool {
        let mut now = timer.now();
        let next = *self.next_ns.get_or_insert(now);
        if now < next {
            let remaining = next - now;
            if remaining > self.precise_window_ns {
                return false;
            }
            timer.sleep(Duration::from_nanos(remaining));
            now = timer.now();
            if now < next {
                return false;
            }
        }
        let mut upcoming = next.saturating_add(self.interval_ns);
        if upcoming <= now {
            upcoming = now.saturating_add(self.interval_ns);
        }
        self.next_ns = Some(upcoming);
        true
    }

    /// Time left before the next scheduled tick.
    pub fn until_next<T: Timer<Timestamp = u64>>(&self, timer: &T) -> Duration {
        let now = timer.now();
        Duration::from_nanos(self.next_ns.map_or(0, |next| next.saturating_sub(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homecage_timing::ManualTimer;

    const MS: u64 = 1_000_000;

    #[test]
    fn first_poll_is_due_then_waits_an_interval() {
        let timer = ManualTimer::new();
        let mut pacer = TickPacer::new(250, PRECISE_WINDOW);
        assert_eq!(pacer.interval(), Duration::from_millis(4));
        assert!(pacer.poll(&timer));
        assert!(!pacer.poll(&timer));
        assert_eq!(pacer.until_next(&timer), Duration::from_millis(4));

        timer.advance_ms(2);
        assert!(!pacer.poll(&timer));
        assert_eq!(timer.now(), 2 * MS);
    }

    #[test]
    fn short_remainder_is_slept_on_the_timer() {
        let timer = ManualTimer::new();
        let mut pacer = TickPacer::new(250, PRECISE_WINDOW);
        assert!(pacer.poll(&timer));

        timer.set_ns(3 * MS + MS / 2);
        assert!(pacer.poll(&timer));
        // ManualTimer::sleep advances the clock to the tick boundary
        assert_eq!(timer.now(), 4 * MS);
        assert_eq!(pacer.until_next(&timer), Duration::from_millis(4));
    }

    #[test]
    fn stall_does_not_trigger_catch_up_ticks() {
        let timer = ManualTimer::new();
        let mut pacer = TickPacer::new(250, PRECISE_WINDOW);
        assert!(pacer.poll(&timer));

        timer.advance_ms(50);
        assert!(pacer.poll(&timer));
        assert!(!pacer.poll(&timer));
        assert_eq!(pacer.until_next(&timer), Duration::from_millis(4));
    }

    #[test]
    fn zero_rate_is_treated_as_one_hertz() {
        let pacer = TickPacer::new(0, Duration::ZERO);
        assert_eq!(pacer.interval(), Duration::from_secs(1));
    }
}
