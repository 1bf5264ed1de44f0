//! Deterministic status classifier.
//!
//! Scoring is a pure function of `(subject, body, sender)`:
//! 1. Gate: non-job mail short-circuits to `not_job_related`.
//! 2. Per-category match counting over a bounded text window.
//! 3. Score = `min(1, 0.3 + 0.2 × matches)`, `+0.2` when the subject alone matches.
//! 4. The first entry of `RESOLUTION_ORDER` whose threshold is exceeded wins,
//!    regardless of which score is numerically highest.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::rules::{GENERIC_MAIL_PROVIDERS, RuleBook};
use crate::pipeline::types::{
    Classification, ClassifiedEmail, EmailRecord, StatusCategory, UNKNOWN_COMPANY,
};

/// Body characters considered by the job-relatedness gate.
const GATE_BODY_WINDOW: usize = 2000;

/// Body characters considered when scoring categories.
pub const DEFAULT_BODY_WINDOW: usize = 5000;

/// Per-category match counting stops here.
const MATCH_CAP: usize = 3;

/// Exclusion matches needed before the gate may reject an email.
const EXCLUSION_THRESHOLD: usize = 2;

const BASE_SCORE: f64 = 0.3;
const PER_MATCH_SCORE: f64 = 0.2;
const SUBJECT_BOOST: f64 = 0.2;

/// Longest display name accepted as a company name.
const MAX_COMPANY_NAME_CHARS: usize = 100;

/// One row of the resolution table.
#[derive(Debug, Clone, Copy)]
pub struct Resolution {
    pub status: StatusCategory,
    /// Score must be strictly greater than this.
    pub threshold: f64,
    /// Minimum confidence reported when this row wins.
    pub floor: f64,
}

const fn rule(status: StatusCategory, threshold: f64) -> Resolution {
    Resolution {
        status,
        threshold,
        floor: 0.0,
    }
}

/// Status resolution order. Rejection and withdrawal outrank any earlier-stage
/// signal matched in the same email.
pub const RESOLUTION_ORDER: &[Resolution] = &[
    rule(StatusCategory::Rejected, 0.3),
    rule(StatusCategory::Accepted, 0.5),
    rule(StatusCategory::Offer, 0.5),
    rule(StatusCategory::Withdrew, 0.5),
    rule(StatusCategory::Interview5, 0.4),
    rule(StatusCategory::Interview4, 0.4),
    rule(StatusCategory::Interview3, 0.4),
    rule(StatusCategory::Interview2, 0.4),
    rule(StatusCategory::Interview1, 0.4),
    rule(StatusCategory::Confirmation, 0.4),
    Resolution {
        status: StatusCategory::Applied,
        threshold: 0.1,
        floor: 0.3,
    },
];

/// Scores of every category for one email.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryScores {
    scores: HashMap<StatusCategory, f64>,
}

impl CategoryScores {
    pub fn get(&self, status: StatusCategory) -> f64 {
        self.scores.get(&status).copied().unwrap_or(0.0)
    }

    /// Apply `RESOLUTION_ORDER`; falls back to `no_reply` with zero confidence.
    pub fn resolve(&self) -> Classification {
        for row in RESOLUTION_ORDER {
            let score = self.get(row.status);
            if score > row.threshold {
                return Classification {
                    status: row.status,
                    confidence: score.max(row.floor).clamp(0.0, 1.0),
                };
            }
        }
        Classification::unscored(StatusCategory::NoReply)
    }
}

/// Rule-based email classifier.
#[derive(Debug, Clone)]
pub struct PatternClassifier {
    rules: RuleBook,
    body_window: usize,
    display_name: Regex,
    sender_domain: Regex,
}

impl PatternClassifier {
    /// Create a classifier with the built-in rule book.
    pub fn new() -> Result<Self, PipelineError> {
        Self::with_rules(RuleBook::default_rules()?)
    }

    /// Create a classifier over a custom rule book.
    pub fn with_rules(rules: RuleBook) -> Result<Self, PipelineError> {
        Ok(Self {
            rules,
            body_window: DEFAULT_BODY_WINDOW,
            display_name: compile(r"([^<]+)<")?,
            sender_domain: compile(r"@([a-zA-Z0-9.-]+)\.")?,
        })
    }

    /// Change how many body characters are scanned when scoring.
    pub fn with_body_window(mut self, chars: usize) -> Self {
        self.body_window = chars;
        self
    }

    /// Whether an email concerns a job application at all.
    ///
    /// Excludes only when at least two exclusion patterns match and no job
    /// keyword does; otherwise job signals win.
    pub fn is_job_related(&self, subject: &str, body: &str, sender: &str) -> bool {
        let text = format!("{} {} {}", subject, prefix(body, GATE_BODY_WINDOW), sender).to_lowercase();

        let job_matches = self.rules.job_keywords().count_matches(&text, usize::MAX);
        let exclusion_matches = self
            .rules
            .exclusions()
            .count_matches(&text, EXCLUSION_THRESHOLD);
        if exclusion_matches >= EXCLUSION_THRESHOLD && job_matches == 0 {
            debug!(exclusion_matches, "Email excluded by non-job patterns");
            return false;
        }

        job_matches >= 1 || self.rules.is_platform_sender(sender)
    }

    /// Score every category against the bounded text window.
    pub fn score(&self, subject: &str, body: &str, sender: &str) -> CategoryScores {
        let subject_lower = subject.to_lowercase();
        let text = format!(
            "{} {} {}",
            subject_lower,
            sender.to_lowercase(),
            prefix(body, self.body_window).to_lowercase()
        );

        let mut scores = CategoryScores::default();
        for category in self.rules.categories() {
            let matches = category.patterns.count_matches(&text, MATCH_CAP);
            let mut score = 0.0;
            if matches > 0 {
                score = (BASE_SCORE + PER_MATCH_SCORE * matches as f64).min(1.0);
                if !subject_lower.is_empty() && category.patterns.any_match(&subject_lower) {
                    score = (score + SUBJECT_BOOST).min(1.0);
                }
            }
            scores.scores.insert(category.status, score);
        }
        scores
    }

    /// Classify one email's text.
    pub fn classify(&self, subject: &str, body: &str, sender: &str) -> Classification {
        if !self.is_job_related(subject, body, sender) {
            return Classification::unscored(StatusCategory::NotJobRelated);
        }
        self.score(subject, body, sender).resolve()
    }

    /// Guess the employer from the sender field.
    ///
    /// Prefers the display name of `"Name <addr>"`, then the mail domain
    /// unless it belongs to a consumer provider.
    pub fn extract_company_name(&self, sender: &str, _subject: &str) -> Option<String> {
        if let Some(caps) = self.display_name.captures(sender) {
            let name = caps[1]
                .trim()
                .trim_matches('"')
                .trim_matches('\'');
            if !name.is_empty() && name.chars().count() < MAX_COMPANY_NAME_CHARS {
                return Some(name.to_string());
            }
        }

        let caps = self.sender_domain.captures(sender)?;
        let domain = &caps[1];
        if GENERIC_MAIL_PROVIDERS.contains(&domain) {
            return None;
        }
        Some(title_case(&domain.replace('.', " ")))
    }

    /// Classify a whole record and attribute it to a company.
    pub fn classify_record(&self, record: &EmailRecord) -> ClassifiedEmail {
        let classification = self.classify(&record.subject, &record.body, &record.sender);
        let company = self
            .extract_company_name(&record.sender, &record.subject)
            .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

        ClassifiedEmail {
            record: record.clone(),
            status: classification.status,
            confidence: classification.confidence,
            company,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, PipelineError> {
    Regex::new(pattern).map_err(|source| PipelineError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// First `chars` characters of `text`.
fn prefix(text: &str, chars: usize) -> &str {
    match text.char_indices().nth(chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Capitalise the first letter of every alphabetic run.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> PatternClassifier {
        PatternClassifier::new().unwrap()
    }

    fn classify(subject: &str, body: &str) -> Classification {
        classifier().classify(subject, body, "")
    }

    // ── Examples ────────────────────────────────────────────────

    #[test]
    fn classifies_applied() {
        let c = classify("Application submitted", "Thank you for applying to our company");
        assert_eq!(c.status, StatusCategory::Applied);
        assert!(c.confidence > 0.3);
    }

    #[test]
    fn classifies_confirmation() {
        let c = classify(
            "Application Confirmation",
            "We have received your application for the position",
        );
        assert_eq!(c.status, StatusCategory::Confirmation);
        assert!(c.confidence > 0.4);
    }

    #[test]
    fn classifies_first_interview() {
        let c = classify(
            "First Interview Invitation",
            "We would like to invite you for a phone screen interview",
        );
        assert_eq!(c.status, StatusCategory::Interview1);
        assert!(c.confidence > 0.4);
    }

    #[test]
    fn classifies_second_interview() {
        let c = classify(
            "Second Round Interview",
            "Congratulations, we would like to proceed with a technical interview",
        );
        assert_eq!(c.status, StatusCategory::Interview2);
        assert!(c.confidence > 0.4);
    }

    #[test]
    fn classifies_third_interview() {
        let c = classify("Final Interview", "We would like to invite you for an onsite interview");
        assert_eq!(c.status, StatusCategory::Interview3);
        assert!(c.confidence > 0.4);
    }

    #[test]
    fn classifies_offer() {
        let c = classify("Job Offer", "We are pleased to offer you the position");
        assert_eq!(c.status, StatusCategory::Offer);
        assert!(c.confidence > 0.5);
    }

    #[test]
    fn classifies_accepted() {
        let c = classify("Offer Accepted", "I am excited to accept the offer and join your team");
        assert_eq!(c.status, StatusCategory::Accepted);
        assert!(c.confidence > 0.5);
    }

    #[test]
    fn classifies_rejected() {
        let c = classify(
            "Application Status Update",
            "Unfortunately, we have decided not to move forward with your application",
        );
        assert_eq!(c.status, StatusCategory::Rejected);
        assert!(c.confidence > 0.5);
    }

    #[test]
    fn classifies_rejection_variations() {
        for phrase in [
            "we will not be moving forward",
            "not selected for this position",
            "decided to pursue other candidates",
            "not the right fit at this time",
        ] {
            let body = format!("Thank you for your interest. {phrase}.");
            let c = classify("Application Update", &body);
            assert_eq!(c.status, StatusCategory::Rejected, "phrase: {phrase}");
            assert!(c.confidence > 0.4, "phrase: {phrase}");
        }
    }

    #[test]
    fn classifies_withdrew() {
        let c = classify(
            "Withdrawing Application",
            "I would like to withdraw my application for this position",
        );
        assert_eq!(c.status, StatusCategory::Withdrew);
        assert!(c.confidence > 0.5);
    }

    #[test]
    fn newsletter_is_unscored() {
        let c = classify("Newsletter", "Check out our latest products");
        assert!(c.status.is_unscored());
        assert_eq!(c.confidence, 0.0);
    }

    // ── Priority ────────────────────────────────────────────────

    #[test]
    fn rejection_beats_offer() {
        let c = classify(
            "Application Update",
            "We were excited to offer you the position, however after further review \
             we regret to inform you we will not be moving forward.",
        );
        assert_eq!(c.status, StatusCategory::Rejected);
    }

    #[test]
    fn rejection_beats_interview() {
        let c = classify(
            "Interview Update",
            "Thank you for the interview. Unfortunately, we have decided not to move forward",
        );
        assert_eq!(c.status, StatusCategory::Rejected);
    }

    #[test]
    fn offer_beats_interview() {
        let c = classify(
            "Next Steps",
            "We would like to offer you the position after your interviews",
        );
        assert_eq!(c.status, StatusCategory::Offer);
    }

    #[test]
    fn resolution_ignores_numeric_maximum() {
        let mut scores = CategoryScores::default();
        scores.scores.insert(StatusCategory::Interview1, 1.0);
        scores.scores.insert(StatusCategory::Rejected, 0.5);
        assert_eq!(scores.resolve().status, StatusCategory::Rejected);
    }

    #[test]
    fn applied_gets_confidence_floor() {
        let mut scores = CategoryScores::default();
        scores.scores.insert(StatusCategory::Applied, 0.2);
        let c = scores.resolve();
        assert_eq!(c.status, StatusCategory::Applied);
        assert_eq!(c.confidence, 0.3);
    }

    #[test]
    fn thresholds_are_strict() {
        let mut scores = CategoryScores::default();
        scores.scores.insert(StatusCategory::Offer, 0.5);
        assert_eq!(scores.resolve(), Classification::unscored(StatusCategory::NoReply));
    }

    // ── Scoring ─────────────────────────────────────────────────

    #[test]
    fn subject_match_boosts_score() {
        let c = classifier();
        let in_subject = c.score("Phone screen", "", "");
        let in_body = c.score("Hello", "phone screen", "");
        assert!(in_subject.get(StatusCategory::Interview1) > in_body.get(StatusCategory::Interview1));
        assert!((in_body.get(StatusCategory::Interview1) - 0.5).abs() < 1e-9);
        assert!((in_subject.get(StatusCategory::Interview1) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn match_count_is_capped() {
        let c = classifier();
        let scores = c.score(
            "",
            "first interview, initial interview, screening interview, phone screen, video interview",
            "",
        );
        assert!((scores.get(StatusCategory::Interview1) - 0.9).abs() < 1e-9);
    }

    #[test]
    fn body_window_bounds_scoring() {
        let c = classifier().with_body_window(10);
        let body = format!("{}we regret to inform you", " ".repeat(50));
        assert_eq!(c.score("", &body, "").get(StatusCategory::Rejected), 0.0);
    }

    #[test]
    fn confidence_bounds_hold() {
        let c = classifier();
        let cases = [
            ("Application submitted", "Thank you for applying"),
            ("First Interview", "Phone screen invitation"),
            ("Job Offer", "We are pleased to offer"),
            ("Rejected", "Not moving forward"),
            ("Lunch?", "Tacos on friday"),
            ("", ""),
        ];
        for (subject, body) in cases {
            let result = c.classify(subject, body, "");
            assert!((0.0..=1.0).contains(&result.confidence));
            assert_eq!(result.confidence == 0.0, result.status.is_unscored(), "{subject}");
        }
    }

    #[test]
    fn classify_is_deterministic() {
        let c = classifier();
        let a = c.classify("Job Offer", "We are pleased to offer you the position", "hr@acme.com");
        let b = c.classify("Job Offer", "We are pleased to offer you the position", "hr@acme.com");
        assert_eq!(a, b);
    }

    // ── Gate ────────────────────────────────────────────────────

    #[test]
    fn gate_excludes_promotional_mail() {
        let c = classifier();
        assert!(!c.is_job_related(
            "Black Friday sale",
            "Use this coupon for a discount",
            "deals@shop.com"
        ));
    }

    #[test]
    fn gate_keeps_job_mail_despite_exclusions() {
        let c = classifier();
        assert!(c.is_job_related(
            "Newsletter: new job openings",
            "Unsubscribe at any time",
            "news@board.com"
        ));
    }

    #[test]
    fn gate_accepts_platform_sender_without_keywords() {
        let c = classifier();
        assert!(c.is_job_related("Hello", "Some text", "noreply@greenhouse.io"));
        assert!(!c.is_job_related("Hello", "Some text", "friend@example.org"));
    }

    // ── Company extraction ──────────────────────────────────────

    #[test]
    fn company_from_display_name() {
        let c = classifier();
        assert_eq!(
            c.extract_company_name("\"Acme Careers\" <jobs@acme.com>", ""),
            Some("Acme Careers".into())
        );
    }

    #[test]
    fn company_from_domain() {
        let c = classifier();
        assert_eq!(
            c.extract_company_name("hr@techstartup.com", ""),
            Some("Techstartup".into())
        );
        assert_eq!(
            c.extract_company_name("hr@jobs.example-company.co", ""),
            Some("Jobs Example-Company".into())
        );
    }

    #[test]
    fn company_skips_generic_providers() {
        let c = classifier();
        assert_eq!(c.extract_company_name("someone@gmail.com", ""), None);
        assert_eq!(c.extract_company_name("<someone@yahoo.com>", ""), None);
        assert_eq!(c.extract_company_name("no address here", ""), None);
    }

    #[test]
    fn company_rejects_overlong_display_name() {
        let c = classifier();
        let sender = format!("{} <hr@bigcorp.com>", "x".repeat(150));
        assert_eq!(c.extract_company_name(&sender, ""), Some("Bigcorp".into()));
    }

    #[test]
    fn classify_record_defaults_company() {
        let c = classifier();
        let record = EmailRecord::new("Job Offer", "me@gmail.com", "We offer you");
        let classified = c.classify_record(&record);
        assert_eq!(classified.company, UNKNOWN_COMPANY);
        assert_eq!(classified.record.id, record.id);
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        assert_eq!(prefix("héllo", 2), "hé");
        assert_eq!(prefix("abc", 10), "abc");
    }

    #[test]
    fn title_case_matches_word_starts() {
        assert_eq!(title_case("example-company"), "Example-Company");
        assert_eq!(title_case("acme corp"), "Acme Corp");
        assert_eq!(title_case("3m"), "3M");
    }
}
