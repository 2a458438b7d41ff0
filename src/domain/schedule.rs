//! Periodic base-investment gate.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleGate {
    interval_days: u32,
    last_investment_date: Option<NaiveDate>,
}

impl ScheduleGate {
    pub fn new(interval_days: u32) -> Self {
        ScheduleGate {
            interval_days,
            last_investment_date: None,
        }
    }

    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    pub fn last_investment_date(&self) -> Option<NaiveDate> {
        self.last_investment_date
    }

    /// Due on the first call, then once `interval_days` calendar days have
    /// elapsed since the last executed base investment.
    pub fn is_due(&self, date: NaiveDate) -> bool {
        match self.last_investment_date {
            None => true,
            Some(last) => (date - last).num_days() >= i64::from(self.interval_days),
        }
    }

    /// Call only after a base investment actually executed.
    pub fn record_investment(&mut self, date: NaiveDate) {
        self.last_investment_date = Some(date);
    }
}
