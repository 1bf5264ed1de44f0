//! Date-window filtering of email records.

use chrono::{DateTime, Datelike, Months, Utc};
use tracing::info;

use crate::pipeline::types::EmailRecord;

/// Keep only records inside a recent window and/or a calendar year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    /// Keep records no older than this many months.
    pub months: Option<u32>,
    /// Keep records from this calendar year (UTC).
    pub year: Option<i32>,
}

impl DateFilter {
    pub fn new(months: Option<u32>, year: Option<i32>) -> Self {
        Self { months, year }
    }

    pub fn is_active(&self) -> bool {
        self.months.is_some() || self.year.is_some()
    }

    /// Whether one record passes. Undated records only pass an inactive filter.
    pub fn matches(&self, record: &EmailRecord, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(date) = record.date else {
            return false;
        };
        if let Some(year) = self.year {
            if date.year() != year {
                return false;
            }
        }
        if let Some(months) = self.months {
            if let Some(cutoff) = now.checked_sub_months(Months::new(months)) {
                if date < cutoff {
                    return false;
                }
            }
        }
        true
    }

    pub fn apply(&self, records: Vec<EmailRecord>, now: DateTime<Utc>) -> Vec<EmailRecord> {
        if !self.is_active() {
            return records;
        }
        let before = records.len();
        let kept: Vec<EmailRecord> = records
            .into_iter()
            .filter(|r| self.matches(r, now))
            .collect();
        info!(
            kept = kept.len(),
            total = before,
            months = ?self.months,
            year = ?self.year,
            "Applied date filter"
        );
        kept
    }
}
