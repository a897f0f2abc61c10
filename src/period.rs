use std::fmt;
use std::fmt::{Debug, Formatter};

use chrono::{Datelike, NaiveDate};

use crate::error::PeriodError;

/// A calendar month/year the balance is calculated over.
///
/// A water balance runs one calendar month at a time rather than over an
/// arbitrary date range, so the validated quantity here is the month
/// number rather than a `start < end` invariant.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    /// Month number, 1-12.
    pub month: u32,
    pub year: i32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self, PeriodError> {
        if !(1..=12).contains(&month) {
            return Err(PeriodError::MonthOutOfRange(month));
        }
        Ok(Period { month, year })
    }

    /// The first day of the period.
    pub fn start_date(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).expect("month validated at construction")
    }

    /// The last day of the period.
    pub fn end_date(&self) -> NaiveDate {
        let (next_year, next_month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid rollover");
        first_of_next.pred_opt().expect("month always has at least one day")
    }

    pub fn days_in_period(&self) -> i64 {
        (self.end_date() - self.start_date()).num_days() + 1
    }

    /// Short label, e.g. "2025-10".
    pub fn period_short(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Human label, e.g. "October 2025".
    pub fn period_label(&self) -> String {
        format!("{} {}", Self::month_name(self.month), self.year)
    }

    /// The period immediately preceding this one.
    ///
    /// `month = 1` rolls back to `(12, year - 1)`.
    pub fn previous(&self) -> Period {
        if self.month == 1 {
            Period {
                month: 12,
                year: self.year - 1,
            }
        } else {
            Period {
                month: self.month - 1,
                year: self.year,
            }
        }
    }

    fn month_name(month: u32) -> &'static str {
        const NAMES: [&str; 12] = [
            "January", "February", "March", "April", "May", "June", "July", "August", "September",
            "October", "November", "December",
        ];
        NAMES[(month - 1) as usize]
    }
}

impl Debug for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period_short())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.period_label())
    }
}
