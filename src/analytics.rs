//! Aggregate statistics over classified emails.
//!
//! Straight counting, no decision logic: a status histogram, the date range,
//! per-company counts and the summary document written next to the graph.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::funnel::{CompanyFlow, SourceCounts};
use crate::pipeline::types::{ClassifiedEmail, StatusCategory};

/// Emails above this confidence count as confidently classified.
const HIGH_CONFIDENCE: f64 = 0.5;

/// Count of emails per status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusHistogram {
    counts: BTreeMap<StatusCategory, u64>,
    total: u64,
}

impl StatusHistogram {
    pub fn from_emails(emails: &[ClassifiedEmail]) -> Self {
        let mut histogram = Self::default();
        for email in emails {
            *histogram.counts.entry(email.status).or_default() += 1;
            histogram.total += 1;
        }
        histogram
    }

    pub fn count(&self, status: StatusCategory) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn job_related(&self) -> u64 {
        self.total - self.count(StatusCategory::NotJobRelated)
    }

    pub fn interviews(&self) -> u64 {
        self.counts
            .iter()
            .filter(|(status, _)| status.interview_stage().is_some())
            .map(|(_, n)| n)
            .sum()
    }

    /// Inputs for the graph's `Total Applications` node.
    pub fn source_counts(&self) -> SourceCounts {
        SourceCounts {
            applied: self.count(StatusCategory::Applied),
            confirmation: self.count(StatusCategory::Confirmation),
            job_related: self.job_related(),
            total_emails: self.total,
        }
    }

    pub fn breakdown(&self) -> &BTreeMap<StatusCategory, u64> {
        &self.counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn from_emails(emails: &[ClassifiedEmail]) -> Self {
        let dates = emails.iter().filter_map(|e| e.record.date);
        Self {
            earliest: dates.clone().min(),
            latest: dates.max(),
        }
    }
}

/// Headline numbers for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_applications: u64,
    pub status_breakdown: BTreeMap<StatusCategory, u64>,
    pub total_companies: u64,
    pub date_range: DateRange,
    pub rejected_count: u64,
    pub offers_count: u64,
    pub accepted_count: u64,
    pub interviews_count: u64,
    pub withdrew_count: u64,
    pub no_reply_count: u64,
    pub not_job_related_count: u64,
    pub applied_count: u64,
    pub confirmation_count: u64,
    /// Share of job-related emails with confidence above 0.5, in percent.
    pub accuracy_percentage: f64,
}

impl Summary {
    pub fn build(emails: &[ClassifiedEmail], flows: &[CompanyFlow]) -> Self {
        let histogram = StatusHistogram::from_emails(emails);

        let tracked = histogram.job_related() - histogram.count(StatusCategory::NoReply);
        let total_applications = if tracked > 0 { tracked } else { histogram.total() };

        Self {
            total_applications,
            status_breakdown: histogram.breakdown().clone(),
            total_companies: flows.len() as u64,
            date_range: DateRange::from_emails(emails),
            rejected_count: histogram.count(StatusCategory::Rejected),
            offers_count: histogram.count(StatusCategory::Offer),
            accepted_count: histogram.count(StatusCategory::Accepted),
            interviews_count: histogram.interviews(),
            withdrew_count: histogram.count(StatusCategory::Withdrew),
            no_reply_count: histogram.count(StatusCategory::NoReply),
            not_job_related_count: histogram.count(StatusCategory::NotJobRelated),
            applied_count: histogram.count(StatusCategory::Applied),
            confirmation_count: histogram.count(StatusCategory::Confirmation),
            accuracy_percentage: accuracy_percentage(emails),
        }
    }

    /// Rebuild graph source counts from the breakdown.
    pub fn source_counts(&self) -> SourceCounts {
        let total: u64 = self.status_breakdown.values().sum();
        SourceCounts {
            applied: self.applied_count,
            confirmation: self.confirmation_count,
            job_related: total - self.not_job_related_count,
            total_emails: total,
        }
    }
}

fn accuracy_percentage(emails: &[ClassifiedEmail]) -> f64 {
    let job_related: Vec<_> = emails.iter().filter(|e| e.status.is_job_related()).collect();
    if job_related.is_empty() {
        return 0.0;
    }
    let confident = job_related
        .iter()
        .filter(|e| e.confidence > HIGH_CONFIDENCE)
        .count();
    let pct = confident as f64 / job_related.len() as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

/// One line per email in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRow {
    pub company: String,
    pub status: StatusCategory,
    pub date: Option<DateTime<Utc>>,
    pub subject: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetail {
    pub count: u64,
    pub statuses: BTreeMap<StatusCategory, u64>,
}

/// Summary plus per-email and per-company detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    #[serde(flatten)]
    pub summary: Summary,
    pub applications: Vec<ApplicationRow>,
    pub company_details: BTreeMap<String, CompanyDetail>,
}

impl AnalyticsReport {
    pub fn build(emails: &[ClassifiedEmail], flows: &[CompanyFlow]) -> Self {
        let applications = emails
            .iter()
            .map(|e| ApplicationRow {
                company: e.company.clone(),
                status: e.status,
                date: e.record.date,
                subject: e.record.subject.clone(),
                confidence: e.confidence,
            })
            .collect();

        let mut company_details: BTreeMap<String, CompanyDetail> = BTreeMap::new();
        for email in emails {
            let detail = company_details.entry(email.company.clone()).or_default();
            detail.count += 1;
            *detail.statuses.entry(email.status).or_default() += 1;
        }

        Self {
            summary: Summary::build(emails, flows),
            applications,
            company_details,
        }
    }
}
