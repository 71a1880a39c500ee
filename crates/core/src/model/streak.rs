use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Consecutive calendar days with at least one review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStreak {
    current: u32,
    last_study_date: Option<NaiveDate>,
}

impl DailyStreak {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_persisted(current: u32, last_study_date: Option<NaiveDate>) -> Self {
        Self {
            current,
            last_study_date,
        }
    }

    #[must_use]
    pub fn current(&self) -> u32 {
        self.current
    }

    #[must_use]
    pub fn last_study_date(&self) -> Option<NaiveDate> {
        self.last_study_date
    }

    /// Registers study activity on `today`.
    ///
    /// Studying again on the same day leaves the streak unchanged; studying the
    /// day after extends it; anything else (a gap, or a date in the past)
    /// restarts it at one.
    pub fn record_study(&mut self, today: NaiveDate) {
        self.current = match self.last_study_date {
            Some(last) if last == today => self.current.max(1),
            Some(last) if last.succ_opt() == Some(today) => self.current.saturating_add(1),
            _ => 1,
        };
        self.last_study_date = Some(today);
    }

    /// Streak as it stands on `today`: zero once a whole day has been missed.
    #[must_use]
    pub fn active_on(&self, today: NaiveDate) -> u32 {
        match self.last_study_date {
            Some(last) if last == today || last.succ_opt() == Some(today) => self.current,
            _ => 0,
        }
    }
}
