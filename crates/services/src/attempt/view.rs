use std::fmt;

use educare_core::session::{AttemptView, QuestionState};

/// Seconds left at which the timer is shown as urgent.
pub const LOW_TIME_SECS: u32 = 60;

/// Countdown (or count-up for untimed attempts) ready for display.
///
/// Formatting lives here so every front end shows the same `mm:ss`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDisplay {
    pub seconds: u32,
    pub counting_down: bool,
    pub low: bool,
}

impl TimerDisplay {
    #[must_use]
    pub fn new(elapsed: u32, remaining: Option<u32>) -> Self {
        match remaining {
            Some(left) => Self {
                seconds: left,
                counting_down: true,
                low: left <= LOW_TIME_SECS,
            },
            None => Self {
                seconds: elapsed,
                counting_down: false,
                low: false,
            },
        }
    }

    #[must_use]
    pub fn from_view(view: &AttemptView) -> Self {
        Self::new(view.elapsed, view.remaining)
    }
}

impl fmt::Display for TimerDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hours = self.seconds / 3600;
        let minutes = (self.seconds % 3600) / 60;
        let seconds = self.seconds % 60;
        if hours > 0 {
            write!(f, "{hours}:{minutes:02}:{seconds:02}")
        } else {
            write!(f, "{minutes:02}:{seconds:02}")
        }
    }
}

/// One-line question palette, e.g. `[1*] [2+] [3 ]`.
///
/// `*` answered, `+` flagged, brackets `<>` mark the current question.
#[must_use]
pub fn palette_line(view: &AttemptView) -> String {
    view.marks
        .iter()
        .map(|mark| {
            let symbol = match mark.state() {
                QuestionState::Flagged => '+',
                QuestionState::Answered => '*',
                QuestionState::Unanswered => ' ',
            };
            let (open, close) = if mark.current { ('<', '>') } else { ('[', ']') };
            format!("{open}{}{symbol}{close}", mark.index + 1)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
