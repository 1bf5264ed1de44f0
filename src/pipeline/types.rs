//! Shared types for the classification pipeline.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Email record ────────────────────────────────────────────────────

/// One raw email as handed over by the import/storage side.
///
/// Deserialisation is tolerant: missing strings become empty, a missing
/// `id` gets a generated one, and an absent or unparsable `date` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Stable identifier used to match classifier output back to input.
    #[serde(default = "generate_id", deserialize_with = "id_or_generated")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub subject: String,
    /// Raw `From` header, e.g. `"Acme Careers <jobs@acme.com>"`.
    #[serde(rename = "from", default, deserialize_with = "null_as_empty")]
    pub sender: String,
    #[serde(default, deserialize_with = "lenient_date")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub body: String,
    /// Date header exactly as it appeared in the message.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub raw_date: String,
}

impl EmailRecord {
    /// Build a record with a generated id and no date.
    pub fn new(
        subject: impl Into<String>,
        sender: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: generate_id(),
            subject: subject.into(),
            sender: sender.into(),
            date: None,
            body: body.into(),
            raw_date: String::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }
}

fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn id_or_generated<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => generate_id(),
    })
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => parse_date(&s),
        _ => None,
    })
}

/// Parse the date formats seen in mailbox exports.
///
/// Accepts RFC 3339, naive ISO-8601 (taken as UTC), bare dates and
/// RFC 2822 header dates. Anything else is `None`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc2822(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ── Status category ─────────────────────────────────────────────────

/// Role of one email in the application lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusCategory {
    #[serde(rename = "not_job_related")]
    NotJobRelated,
    #[serde(rename = "no_reply")]
    NoReply,
    #[serde(rename = "applied")]
    Applied,
    #[serde(rename = "confirmation")]
    Confirmation,
    #[serde(rename = "interview_1")]
    Interview1,
    #[serde(rename = "interview_2")]
    Interview2,
    #[serde(rename = "interview_3")]
    Interview3,
    #[serde(rename = "interview_4")]
    Interview4,
    #[serde(rename = "interview_5")]
    Interview5,
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "accepted")]
    Accepted,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "withdrew")]
    Withdrew,
}

/// Highest interview stage the category set can express.
pub const MAX_INTERVIEW_STAGE: u8 = 5;

impl StatusCategory {
    pub const ALL: [StatusCategory; 13] = [
        Self::NotJobRelated,
        Self::NoReply,
        Self::Applied,
        Self::Confirmation,
        Self::Interview1,
        Self::Interview2,
        Self::Interview3,
        Self::Interview4,
        Self::Interview5,
        Self::Offer,
        Self::Accepted,
        Self::Rejected,
        Self::Withdrew,
    ];

    /// Wire name, as used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotJobRelated => "not_job_related",
            Self::NoReply => "no_reply",
            Self::Applied => "applied",
            Self::Confirmation => "confirmation",
            Self::Interview1 => "interview_1",
            Self::Interview2 => "interview_2",
            Self::Interview3 => "interview_3",
            Self::Interview4 => "interview_4",
            Self::Interview5 => "interview_5",
            Self::Offer => "offer",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrew => "withdrew",
        }
    }

    /// Interview category for a stage in `1..=5`.
    pub fn interview(stage: u8) -> Option<Self> {
        match stage {
            1 => Some(Self::Interview1),
            2 => Some(Self::Interview2),
            3 => Some(Self::Interview3),
            4 => Some(Self::Interview4),
            5 => Some(Self::Interview5),
            _ => None,
        }
    }

    /// Stage number for interview categories.
    pub fn interview_stage(&self) -> Option<u8> {
        match self {
            Self::Interview1 => Some(1),
            Self::Interview2 => Some(2),
            Self::Interview3 => Some(3),
            Self::Interview4 => Some(4),
            Self::Interview5 => Some(5),
            _ => None,
        }
    }

    /// Categories that always carry a confidence of exactly zero.
    pub fn is_unscored(&self) -> bool {
        matches!(self, Self::NoReply | Self::NotJobRelated)
    }

    pub fn is_job_related(&self) -> bool {
        *self != Self::NotJobRelated
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Classification output ───────────────────────────────────────────

/// Result of classifying one email's text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub status: StatusCategory,
    /// Heuristic score in `[0, 1]`; zero exactly for unscored categories.
    pub confidence: f64,
}

impl Classification {
    pub fn unscored(status: StatusCategory) -> Self {
        Self {
            status,
            confidence: 0.0,
        }
    }
}

/// Company name used when none can be extracted.
pub const UNKNOWN_COMPANY: &str = "Unknown";

/// An email record plus its classification and company attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedEmail {
    #[serde(flatten)]
    pub record: EmailRecord,
    pub status: StatusCategory,
    pub confidence: f64,
    pub company: String,
}

impl ClassifiedEmail {
    /// The fallback used when classifying a record fails.
    pub fn defaulted(record: EmailRecord) -> Self {
        Self {
            record,
            status: StatusCategory::NoReply,
            confidence: 0.0,
            company: UNKNOWN_COMPANY.to_string(),
        }
    }

    pub fn has_known_company(&self) -> bool {
        self.company != UNKNOWN_COMPANY
    }
}
