use std::fmt;

/// Host visibility signal (page/tab/window focus).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Identifies one transient warning so its timer can dismiss it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WarningId(u64);

impl WarningId {
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WarningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "warning-{}", self.0)
    }
}

/// A focus-loss warning shown to the learner until dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityWarning {
    pub id: WarningId,
    /// Value of the focus-loss counter when this warning was raised.
    pub occurrence: u32,
}

impl IntegrityWarning {
    #[must_use]
    pub fn message(&self) -> String {
        format!(
            "Leaving the quiz window is recorded (switch #{}). Stay on this page until you submit.",
            self.occurrence
        )
    }
}

/// Monotonic focus-loss counter. Only a new session starts a new log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrityLog {
    count: u32,
}

impl IntegrityLog {
    /// Continue a log recorded earlier in the same session.
    #[must_use]
    pub fn resume(count: u32) -> Self {
        Self { count }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    fn increment(&mut self) -> u32 {
        self.count = self.count.saturating_add(1);
        self.count
    }
}

/// Tab-switch detection for proctored sessions.
///
/// Advisory only: it never pauses the clock. Repeated `Hidden` signals without
/// a `Visible` in between count once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityMonitor {
    enabled: bool,
    log: IntegrityLog,
    hidden: bool,
    next_warning: u64,
    warnings: Vec<IntegrityWarning>,
}

impl IntegrityMonitor {
    #[must_use]
    pub fn new(enabled: bool, log: IntegrityLog) -> Self {
        Self {
            enabled,
            log,
            hidden: false,
            next_warning: 1,
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn log(&self) -> IntegrityLog {
        self.log
    }

    #[must_use]
    pub fn active_warnings(&self) -> &[IntegrityWarning] {
        &self.warnings
    }

    /// Feed a visibility signal. Returns the warning raised, if any.
    pub fn observe(&mut self, visibility: Visibility) -> Option<IntegrityWarning> {
        if !self.enabled {
            return None;
        }
        match visibility {
            Visibility::Visible => {
                self.hidden = false;
                None
            }
            Visibility::Hidden if self.hidden => None,
            Visibility::Hidden => {
                self.hidden = true;
                let occurrence = self.log.increment();
                let warning = IntegrityWarning {
                    id: WarningId(self.next_warning),
                    occurrence,
                };
                self.next_warning += 1;
                self.warnings.push(warning.clone());
                Some(warning)
            }
        }
    }

    /// Remove a warning once its display time is over.
    pub fn dismiss(&mut self, id: WarningId) -> bool {
        let before = self.warnings.len();
        self.warnings.retain(|w| w.id != id);
        self.warnings.len() != before
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_hide_and_keeps_warnings_until_dismissed() {
        let mut monitor = IntegrityMonitor::new(true, IntegrityLog::default());
        let mut raised = Vec::new();
        for _ in 0..3 {
            raised.push(monitor.observe(Visibility::Hidden).unwrap());
            monitor.observe(Visibility::Visible);
        }

        assert_eq!(monitor.log().count(), 3);
        assert_eq!(monitor.active_warnings().len(), 3);
        assert_eq!(raised[2].occurrence, 3);

        for warning in &raised {
            assert!(monitor.dismiss(warning.id));
        }
        assert!(monitor.active_warnings().is_empty());
        assert!(!monitor.dismiss(raised[0].id));
        assert_eq!(monitor.log().count(), 3);
    }

    #[test]
    fn repeated_hidden_counts_once() {
        let mut monitor = IntegrityMonitor::new(true, IntegrityLog::resume(2));
        assert!(monitor.observe(Visibility::Hidden).is_some());
        assert!(monitor.observe(Visibility::Hidden).is_none());
        assert_eq!(monitor.log().count(), 3);
    }

    #[test]
    fn disabled_monitor_ignores_signals() {
        let mut monitor = IntegrityMonitor::new(false, IntegrityLog::default());
        assert!(monitor.observe(Visibility::Hidden).is_none());
        assert_eq!(monitor.log().count(), 0);
    }
}
