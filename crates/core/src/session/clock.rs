/// State of a [`SessionClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Running,
    Expired,
    Stopped,
}

/// What a single [`SessionClock::tick`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Elapsed moved forward by one unit; `remaining` is `None` for untimed sessions.
    Advanced { elapsed: u32, remaining: Option<u32> },
    /// The limit was reached on this tick. Reported once per clock.
    Expired { elapsed: u32 },
    /// The clock is no longer running.
    Idle,
}

/// Counts elapsed session time in whole units (seconds at the default tick rate).
///
/// `elapsed` never exceeds the limit. Expiry is reported exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    limit: Option<u32>,
    elapsed: u32,
    state: ClockState,
}

impl SessionClock {
    /// Start a fresh clock.
    #[must_use]
    pub fn new(limit: Option<u32>) -> Self {
        Self::resume(limit, 0)
    }

    /// Resume from a previously persisted `time_spent`, clamped to the limit.
    ///
    /// A clock resumed at or past its limit stays `Running` until the next
    /// [`tick`](Self::tick) or [`expire_if_due`](Self::expire_if_due) reports expiry.
    #[must_use]
    pub fn resume(limit: Option<u32>, time_spent: u32) -> Self {
        let elapsed = limit.map_or(time_spent, |limit| time_spent.min(limit));
        Self {
            limit,
            elapsed,
            state: ClockState::Running,
        }
    }

    #[must_use]
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// `max(0, limit - elapsed)`, or `None` when untimed.
    #[must_use]
    pub fn remaining(&self) -> Option<u32> {
        self.limit.map(|limit| limit.saturating_sub(self.elapsed))
    }

    #[must_use]
    pub fn state(&self) -> ClockState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.state == ClockState::Expired || (self.remaining() == Some(0))
    }

    /// Advance by one unit while running.
    pub fn tick(&mut self) -> TickOutcome {
        if self.state != ClockState::Running {
            return TickOutcome::Idle;
        }
        if self.expire_if_due() {
            return TickOutcome::Expired {
                elapsed: self.elapsed,
            };
        }

        self.elapsed = self.elapsed.saturating_add(1);
        if self.expire_if_due() {
            return TickOutcome::Expired {
                elapsed: self.elapsed,
            };
        }

        TickOutcome::Advanced {
            elapsed: self.elapsed,
            remaining: self.remaining(),
        }
    }

    /// Transition to `Expired` if the limit has been reached.
    ///
    /// Returns `true` only on the call that performs the transition.
    pub fn expire_if_due(&mut self) -> bool {
        if self.state == ClockState::Running && self.remaining() == Some(0) {
            self.state = ClockState::Expired;
            return true;
        }
        false
    }

    /// Stop ticking for good. Elapsed time is kept.
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn counts_down_and_expires_once() {
        let mut clock = SessionClock::new(Some(2));
        assert_eq!(
            clock.tick(),
            TickOutcome::Advanced {
                elapsed: 1,
                remaining: Some(1)
            }
        );
        assert_eq!(clock.tick(), TickOutcome::Expired { elapsed: 2 });
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.remaining(), Some(0));
        assert_eq!(clock.state(), ClockState::Expired);
    }

    #[test]
    fn resume_clamps_to_limit_and_expires_on_first_tick() {
        let mut clock = SessionClock::resume(Some(60), 75);
        assert_eq!(clock.elapsed(), 60);
        assert!(clock.is_running());
        assert_eq!(clock.tick(), TickOutcome::Expired { elapsed: 60 });
        assert_eq!(clock.elapsed(), 60);
    }

    #[test]
    fn expire_if_due_reports_transition_once() {
        let mut clock = SessionClock::resume(Some(10), 10);
        assert!(clock.expire_if_due());
        assert!(!clock.expire_if_due());
        assert_eq!(clock.tick(), TickOutcome::Idle);
    }

    #[test]
    fn untimed_clock_never_expires() {
        let mut clock = SessionClock::resume(None, 5);
        for _ in 0..100 {
            clock.tick();
        }
        assert_eq!(clock.elapsed(), 105);
        assert_eq!(clock.remaining(), None);
        assert!(!clock.is_expired());
    }

    #[test]
    fn stopped_clock_does_not_advance() {
        let mut clock = SessionClock::new(Some(30));
        clock.tick();
        clock.stop();
        assert_eq!(clock.tick(), TickOutcome::Idle);
        assert_eq!(clock.elapsed(), 1);
    }

    proptest! {
        #[test]
        fn elapsed_grows_by_tick_count(
            initial in 0u32..1_000,
            ticks in 0u32..500,
            extra in 1u32..100,
        ) {
            let limit = initial + ticks + extra;
            let mut clock = SessionClock::resume(Some(limit), initial);
            for _ in 0..ticks {
                clock.tick();
            }
            prop_assert_eq!(clock.elapsed(), initial + ticks);
            prop_assert_eq!(clock.remaining(), Some(extra));
        }

        #[test]
        fn remaining_never_negative(limit in 1u32..200, initial in 0u32..300, ticks in 0u32..400) {
            let mut clock = SessionClock::resume(Some(limit), initial);
            let mut expiries = 0;
            for _ in 0..ticks {
                if matches!(clock.tick(), TickOutcome::Expired { .. }) {
                    expiries += 1;
                }
                prop_assert!(clock.elapsed() <= limit);
            }
            prop_assert!(expiries <= 1);
            prop_assert_eq!(clock.remaining(), Some(limit - clock.elapsed()));
        }
    }
}
