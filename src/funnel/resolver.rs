//! Per-company outcome derivation.
//!
//! Each company's emails reduce to a `CompanyFlags` value. The reduction is
//! an associative, commutative merge (flags OR together, the interview stage
//! takes the max), so partial results from any partition of the input merge
//! to the same flow. Email dates play no part: the terminal status is
//! derived from the union of statuses ever seen.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pipeline::types::{ClassifiedEmail, StatusCategory};

/// Order-independent summary of the statuses seen for one company.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompanyFlags {
    pub highest_interview_stage: u8,
    pub has_offer: bool,
    pub has_accepted: bool,
    pub has_rejected: bool,
    pub has_withdrew: bool,
}

impl CompanyFlags {
    /// Fold one status into the flags.
    pub fn observe(&mut self, status: StatusCategory) {
        match status {
            StatusCategory::Offer => self.has_offer = true,
            StatusCategory::Accepted => self.has_accepted = true,
            StatusCategory::Rejected => self.has_rejected = true,
            StatusCategory::Withdrew => self.has_withdrew = true,
            other => {
                if let Some(stage) = other.interview_stage() {
                    self.highest_interview_stage = self.highest_interview_stage.max(stage);
                }
            }
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            highest_interview_stage: self.highest_interview_stage.max(other.highest_interview_stage),
            has_offer: self.has_offer || other.has_offer,
            has_accepted: self.has_accepted || other.has_accepted,
            has_rejected: self.has_rejected || other.has_rejected,
            has_withdrew: self.has_withdrew || other.has_withdrew,
        }
    }

    /// Apply `TERMINAL_RULES`; the first rule that yields a status wins.
    pub fn terminal_status(&self) -> StatusCategory {
        TERMINAL_RULES
            .iter()
            .find_map(|(_, rule)| rule(self))
            .unwrap_or(StatusCategory::NoReply)
    }
}

type TerminalRule = fn(&CompanyFlags) -> Option<StatusCategory>;

fn accepted(f: &CompanyFlags) -> Option<StatusCategory> {
    f.has_accepted.then_some(StatusCategory::Accepted)
}

fn offer(f: &CompanyFlags) -> Option<StatusCategory> {
    f.has_offer.then_some(StatusCategory::Offer)
}

fn withdrew(f: &CompanyFlags) -> Option<StatusCategory> {
    f.has_withdrew.then_some(StatusCategory::Withdrew)
}

fn rejected(f: &CompanyFlags) -> Option<StatusCategory> {
    f.has_rejected.then_some(StatusCategory::Rejected)
}

/// Ghosted after an interview: the terminal is the highest stage reached.
fn ghosted_after_interview(f: &CompanyFlags) -> Option<StatusCategory> {
    StatusCategory::interview(f.highest_interview_stage)
}

/// Terminal status priority. Falls through to `no_reply` (ghosted, no interview).
pub const TERMINAL_RULES: &[(&str, TerminalRule)] = &[
    ("accepted", accepted),
    ("offer", offer),
    ("withdrew", withdrew),
    ("rejected", rejected),
    ("ghosted_after_interview", ghosted_after_interview),
];

/// Where a company's journey ended, keyed by the stage it reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
    Accepted,
    /// Offer without acceptance or explicit decline.
    Offer,
    /// Offer followed by a withdrawal.
    DeclinedOffer,
    Rejected { stage: u8 },
    Withdrew { stage: u8 },
    Ghosted { stage: u8 },
}

/// Derived outcome for one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyFlow {
    pub company: String,
    pub highest_interview_stage: u8,
    pub has_offer: bool,
    pub has_accepted: bool,
    pub has_rejected: bool,
    pub has_withdrew: bool,
    pub terminal_status: StatusCategory,
}

impl CompanyFlow {
    pub fn from_flags(company: impl Into<String>, flags: CompanyFlags) -> Self {
        Self {
            company: company.into(),
            highest_interview_stage: flags.highest_interview_stage,
            has_offer: flags.has_offer,
            has_accepted: flags.has_accepted,
            has_rejected: flags.has_rejected,
            has_withdrew: flags.has_withdrew,
            terminal_status: flags.terminal_status(),
        }
    }

    pub fn flags(&self) -> CompanyFlags {
        CompanyFlags {
            highest_interview_stage: self.highest_interview_stage,
            has_offer: self.has_offer,
            has_accepted: self.has_accepted,
            has_rejected: self.has_rejected,
            has_withdrew: self.has_withdrew,
        }
    }

    /// Funnel bucket for this company.
    pub fn outcome(&self) -> FlowOutcome {
        let stage = self.highest_interview_stage;
        match self.terminal_status {
            StatusCategory::Accepted => FlowOutcome::Accepted,
            StatusCategory::Offer if self.has_withdrew => FlowOutcome::DeclinedOffer,
            StatusCategory::Offer => FlowOutcome::Offer,
            StatusCategory::Withdrew => FlowOutcome::Withdrew { stage },
            StatusCategory::Rejected => FlowOutcome::Rejected { stage },
            _ => FlowOutcome::Ghosted { stage },
        }
    }
}

/// Groups classified emails by company and derives one flow per company.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompanyFlowResolver;

impl CompanyFlowResolver {
    /// Map step: partial flags per company for any slice of the input.
    ///
    /// Emails attributed to `Unknown` or classified `not_job_related` are skipped.
    pub fn partial(&self, emails: &[ClassifiedEmail]) -> BTreeMap<String, CompanyFlags> {
        let mut partial: BTreeMap<String, CompanyFlags> = BTreeMap::new();
        for email in emails {
            if !email.has_known_company() || !email.status.is_job_related() {
                continue;
            }
            partial
                .entry(email.company.clone())
                .or_default()
                .observe(email.status);
        }
        partial
    }

    /// Reduce step: merge partials in any order and finalise the flows.
    pub fn merge<I>(&self, partials: I) -> Vec<CompanyFlow>
    where
        I: IntoIterator<Item = BTreeMap<String, CompanyFlags>>,
    {
        let mut merged: BTreeMap<String, CompanyFlags> = BTreeMap::new();
        for partial in partials {
            for (company, flags) in partial {
                let entry = merged.entry(company).or_default();
                *entry = entry.merge(flags);
            }
        }
        merged
            .into_iter()
            .map(|(company, flags)| CompanyFlow::from_flags(company, flags))
            .collect()
    }

    /// Resolve flows for a whole batch, ordered by company name.
    pub fn resolve(&self, emails: &[ClassifiedEmail]) -> Vec<CompanyFlow> {
        let flows = self.merge([self.partial(emails)]);
        debug!(emails = emails.len(), companies = flows.len(), "Resolved company flows");
        flows
    }
}
