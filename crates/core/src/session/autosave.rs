/// Default autosave period in clock units.
pub const DEFAULT_AUTOSAVE_PERIOD: u32 = 30;

/// Proof that an autosave was started; hand it back to [`AutosaveGuard::finish`].
#[derive(Debug, PartialEq, Eq)]
pub struct AutosaveTicket {
    revision: u64,
}

impl AutosaveTicket {
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// Single in-flight guard for best-effort autosaves.
///
/// A save requested while another is pending is dropped; the next period retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutosaveGuard {
    period: u32,
    in_flight: bool,
    saved_revision: Option<u64>,
    failures: u32,
}

impl Default for AutosaveGuard {
    fn default() -> Self {
        Self::new(DEFAULT_AUTOSAVE_PERIOD)
    }
}

impl AutosaveGuard {
    /// A zero period is treated as one.
    #[must_use]
    pub fn new(period: u32) -> Self {
        Self {
            period: period.max(1),
            in_flight: false,
            saved_revision: None,
            failures: 0,
        }
    }

    #[must_use]
    pub fn period(&self) -> u32 {
        self.period
    }

    /// True on every `period`-th unit of absolute elapsed time, for a non-empty buffer.
    #[must_use]
    pub fn is_due(&self, elapsed: u32, buffer_len: usize) -> bool {
        elapsed > 0 && elapsed % self.period == 0 && buffer_len > 0
    }

    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Revision confirmed by the last successful save.
    #[must_use]
    pub fn saved_revision(&self) -> Option<u64> {
        self.saved_revision
    }

    /// Consecutive failures since the last success.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Returns `None` while a save is pending.
    pub fn try_begin(&mut self, revision: u64) -> Option<AutosaveTicket> {
        if self.in_flight {
            return None;
        }
        self.in_flight = true;
        Some(AutosaveTicket { revision })
    }

    pub fn finish(&mut self, ticket: AutosaveTicket, ok: bool) {
        self.in_flight = false;
        if ok {
            self.failures = 0;
            self.saved_revision = Some(
                self.saved_revision
                    .map_or(ticket.revision, |saved| saved.max(ticket.revision)),
            );
        } else {
            self.failures = self.failures.saturating_add(1);
        }
    }
}
