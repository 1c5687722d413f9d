use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Loan-period rules applied on top of replayed state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPolicy {
    /// Days a book may be held before it counts as overdue.
    pub loan_period_days: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: Self::DEFAULT_LOAN_PERIOD_DAYS,
        }
    }
}

impl LoanPolicy {
    pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;

    pub fn new(loan_period_days: i64) -> Self {
        Self { loan_period_days }
    }

    /// Whole days between `borrowed_at` and `now`, never negative.
    pub fn days_held(borrowed_at: NaiveDateTime, now: NaiveDateTime) -> i64 {
        (now - borrowed_at).num_days().max(0)
    }

    /// Remaining days; negative once overdue.
    pub fn days_left(&self, days_held: i64) -> i64 {
        self.loan_period_days - days_held
    }

    /// Calendar date a loan opened at `borrowed_at` is due back.
    pub fn due_date(&self, borrowed_at: NaiveDateTime) -> NaiveDate {
        (borrowed_at + Duration::days(self.loan_period_days)).date()
    }
}
