//! Pattern tables for status classification.
//!
//! Every status category that can be scored owns an ordered list of
//! case-insensitive regex patterns. The job-relatedness gate has two more
//! sets: exclusion patterns (newsletters, receipts, shipping, account mail)
//! and job keywords. All patterns are plain data here and compiled once
//! into a `RuleBook`.

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::PipelineError;
use crate::pipeline::types::StatusCategory;

const APPLIED: &[&str] = &[
    r"application.*submitted",
    r"application.*received",
    r"thank.*for.*your.*application",
    r"we.*received.*your.*application",
    r"application.*sent",
    r"applied.*for",
    r"your.*application",
    r"alert.*application",
    r"candidate-se",
    r"candidate.*se",
    r"aplicar",
    r"novas.*vagas",
    r"job.*opportunity",
    r".*opportunity",
    r"vagas.*em",
    r"job.*alert",
    r"new.*position",
    r"open.*position",
    r"we.*are.*hiring",
    r"looking.*for.*",
];

const CONFIRMATION: &[&str] = &[
    r"confirmation.*application",
    r"application.*confirm",
    r"we.*have.*received.*application",
    r"application.*successfully.*received",
    r"confirm.*receipt.*application",
    r"application.*status.*update",
];

const INTERVIEW_1: &[&str] = &[
    r"first.*interview",
    r"initial.*interview",
    r"screening.*interview",
    r"phone.*screen",
    r"phone.*interview",
    r"video.*screen",
    r"video.*interview",
    r"preliminary.*interview",
    r"first.*round",
    r"round.*1.*interview",
    r"first.*round.*interview",
    r"take.*home.*assessment",
    r"assessment",
];

const INTERVIEW_2: &[&str] = &[
    r"second.*interview",
    r"next.*round.*interview",
    r"second.*round",
    r"round.*2.*interview",
    r"technical.*interview",
    r"panel.*interview",
];

const INTERVIEW_3: &[&str] = &[
    r"third.*interview",
    r"final.*interview",
    r"round.*3.*interview",
    r"third.*round",
    r"onsite.*interview",
    r"on-site.*interview",
];

const INTERVIEW_4: &[&str] = &[
    r"fourth.*interview",
    r"round.*4.*interview",
    r"fourth.*round",
];

const INTERVIEW_5: &[&str] = &[
    r"fifth.*interview",
    r"round.*5.*interview",
    r"fifth.*round",
];

const OFFER: &[&str] = &[
    r"job.*offer",
    r"offer.*position",
    r"pleased.*to.*offer",
    r"delighted.*to.*offer",
    r"excited.*to.*offer",
    r"offer.*employment",
    r"offer.*you.*position",
    r"extend.*offer",
    r"making.*offer",
];

const ACCEPTED: &[&str] = &[
    r"accept.*offer",
    r"accepted.*position",
    r"excited.*to.*join",
    r"looking.*forward.*to.*join",
    r"accept.*job",
    r"acceptance.*offer",
];

// Employer-side language.
const REJECTED: &[&str] = &[
    r"we.*regret.*inform",
    r"we.*regret.*to.*inform",
    r"unfortunately.*not.*selected",
    r"unfortunately.*decided.*not.*to.*proceed",
    r"we.*decided.*not.*to.*proceed",
    r"we.*decided.*not.*proceed",
    r"we.*will.*not.*be.*moving.*forward",
    r"we.*will.*not.*move.*forward",
    r"we.*not.*move.*forward",
    r"we.*decided.*pursue.*other",
    r"decided.*not.*move.*forward",
    r"other.*candidates",
    r"better.*fit.*another",
    r"not.*right.*fit",
    r"not.*fit.*at.*this.*time",
    r"we.*not.*advancing",
    r"not.*selected.*position",
    r"not.*selected.*candidate",
    r"not.*proceed.*with.*your.*application",
    r"not.*moving.*forward.*with.*application",
];

// Candidate-side language.
const WITHDREW: &[&str] = &[
    r"withdraw.*application",
    r"application.*withdrawn",
    r"no.*longer.*interested",
    r"decided.*to.*withdraw",
    r"withdrawing.*application",
    r"i.*withdraw",
    r"i.*no.*longer",
    r"declined.*interview",
    r"declined.*offer",
    r"will.*not.*be.*moving.*forward",
    r"not.*moving.*forward",
    r"decline.*opportunity",
    r"pass.*on.*opportunity",
    r"not.*pursue",
    r"decided.*not.*pursue",
];

/// Category pattern lists, in table order.
pub const STATUS_PATTERNS: &[(StatusCategory, &[&str])] = &[
    (StatusCategory::Applied, APPLIED),
    (StatusCategory::Confirmation, CONFIRMATION),
    (StatusCategory::Interview1, INTERVIEW_1),
    (StatusCategory::Interview2, INTERVIEW_2),
    (StatusCategory::Interview3, INTERVIEW_3),
    (StatusCategory::Interview4, INTERVIEW_4),
    (StatusCategory::Interview5, INTERVIEW_5),
    (StatusCategory::Offer, OFFER),
    (StatusCategory::Accepted, ACCEPTED),
    (StatusCategory::Rejected, REJECTED),
    (StatusCategory::Withdrew, WITHDREW),
];

/// Strong signals that an email is not about a job application.
pub const EXCLUSION_PATTERNS: &[&str] = &[
    r"newsletter",
    r"unsubscribe",
    r"subscription",
    r"promo",
    r"promotion",
    r"black.*friday",
    r"cyber.*monday",
    r"sale",
    r"discount",
    r"coupon",
    r"receipt",
    r"invoice",
    r"payment.*received",
    r"order.*confirmation",
    r"flight.*confirmation",
    r"hotel.*booking",
    r"airbnb.*reservation",
    r"shipping.*confirmation",
    r"package.*delivered",
    r"tracking.*number",
    r"password.*reset",
    r"verify.*email.*address",
    r"account.*security",
    r"instagram.*follow",
    r"facebook.*friend",
    r"twitter.*notification",
];

pub const JOB_KEYWORDS: &[&str] = &[
    r"job",
    r"application",
    r"interview",
    r"recruiter",
    r"hiring",
    r"position",
    r"candidate",
    r"opportunity",
    r"apply",
    r"career",
    r"resume",
    r"cv",
    r"employment",
    r"vacancy",
    r"role",
    r"application.*submitted",
    r"thank.*for.*your.*application",
    r"offer",
    r"rejection",
    r"withdraw.*application",
    r"linkedin",
    r"indeed",
    r"glassdoor",
    r"monster",
    r"ziprecruiter",
    r"ats",
    r"applicant.*tracking",
    r"job.*board",
    r"vaga",
    r"vagas",
    r"emprego",
    r"trabalho",
    r"candidate-se",
    r"aplicar",
    r"engineer.*opportunity",
    r".*engineer.*position",
    r"qa.*opportunity",
    r"automation.*qa",
];

/// Sender fragments of job boards and applicant-tracking systems.
pub const JOB_PLATFORM_SENDERS: &[&str] = &[
    "linkedin",
    "indeed",
    "glassdoor",
    "monster",
    "ziprecruiter",
    "flexjobs",
    "recruiter",
    "hiring",
    "careers",
    "talent",
    "workday",
    "greenhouse",
    "lever",
    "smartrecruiters",
];

/// Consumer mail providers whose domain says nothing about the employer.
pub const GENERIC_MAIL_PROVIDERS: &[&str] =
    &["gmail", "yahoo", "outlook", "hotmail", "icloud", "mail"];

/// An ordered list of compiled case-insensitive patterns.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Regex>,
}

impl PatternSet {
    /// Compile a list of pattern sources.
    pub fn compile(sources: &[&str]) -> Result<Self, PipelineError> {
        let mut set = Self::default();
        for source in sources {
            set.push(source)?;
        }
        Ok(set)
    }

    /// Append one pattern to the end of the set.
    pub fn push(&mut self, source: &str) -> Result<(), PipelineError> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map_err(|source_err| PipelineError::InvalidPattern {
                pattern: source.to_string(),
                source: source_err,
            })?;
        self.patterns.push(regex);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Count matching patterns, stopping once `cap` is reached.
    pub fn count_matches(&self, text: &str, cap: usize) -> usize {
        let mut matches = 0;
        for pattern in &self.patterns {
            if matches >= cap {
                break;
            }
            if pattern.is_match(text) {
                matches += 1;
            }
        }
        matches
    }

    pub fn any_match(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }
}

/// Compiled patterns for one status category.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub status: StatusCategory,
    pub patterns: PatternSet,
}

/// All compiled classification rules.
#[derive(Debug, Clone)]
pub struct RuleBook {
    categories: Vec<CategoryRule>,
    exclusions: PatternSet,
    job_keywords: PatternSet,
    platform_senders: Vec<String>,
}

impl RuleBook {
    /// Compile the built-in pattern tables.
    pub fn default_rules() -> Result<Self, PipelineError> {
        let categories = STATUS_PATTERNS
            .iter()
            .map(|(status, sources)| {
                Ok(CategoryRule {
                    status: *status,
                    patterns: PatternSet::compile(sources)?,
                })
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        let rules = Self {
            categories,
            exclusions: PatternSet::compile(EXCLUSION_PATTERNS)?,
            job_keywords: PatternSet::compile(JOB_KEYWORDS)?,
            platform_senders: JOB_PLATFORM_SENDERS.iter().map(|s| s.to_string()).collect(),
        };
        debug!(
            categories = rules.categories.len(),
            exclusions = rules.exclusions.len(),
            job_keywords = rules.job_keywords.len(),
            "Compiled classification rules"
        );
        Ok(rules)
    }

    /// A rule book with no patterns (for testing).
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
            exclusions: PatternSet::default(),
            job_keywords: PatternSet::default(),
            platform_senders: Vec::new(),
        }
    }

    /// Add a custom pattern to a category, creating the category if needed.
    pub fn add_pattern(
        &mut self,
        status: StatusCategory,
        pattern: &str,
    ) -> Result<(), PipelineError> {
        match self.categories.iter_mut().find(|c| c.status == status) {
            Some(rule) => rule.patterns.push(pattern),
            None => {
                let mut patterns = PatternSet::default();
                patterns.push(pattern)?;
                self.categories.push(CategoryRule { status, patterns });
                Ok(())
            }
        }
    }

    pub fn categories(&self) -> &[CategoryRule] {
        &self.categories
    }

    pub fn exclusions(&self) -> &PatternSet {
        &self.exclusions
    }

    pub fn job_keywords(&self) -> &PatternSet {
        &self.job_keywords
    }

    /// Whether the sender belongs to a known job board or ATS.
    pub fn is_platform_sender(&self, sender: &str) -> bool {
        let sender = sender.to_lowercase();
        self.platform_senders.iter().any(|p| sender.contains(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_compile() {
        let rules = RuleBook::default_rules().unwrap();
        assert_eq!(rules.categories().len(), STATUS_PATTERNS.len());
        assert_eq!(rules.exclusions().len(), EXCLUSION_PATTERNS.len());
        assert_eq!(rules.job_keywords().len(), JOB_KEYWORDS.len());
    }

    #[test]
    fn unscored_categories_have_no_patterns() {
        assert!(
            STATUS_PATTERNS
                .iter()
                .all(|(status, _)| !status.is_unscored())
        );
    }

    #[test]
    fn patterns_are_case_insensitive() {
        let set = PatternSet::compile(&["phone.*screen"]).unwrap();
        assert!(set.any_match("PHONE SCREEN tomorrow"));
    }

    #[test]
    fn count_matches_stops_at_cap() {
        let set = PatternSet::compile(&["a", "b", "c", "d", "e"]).unwrap();
        assert_eq!(set.count_matches("abcde", 3), 3);
        assert_eq!(set.count_matches("abcde", 10), 5);
        assert_eq!(set.count_matches("zzz", 3), 0);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = PatternSet::compile(&["(unclosed"]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPattern { .. }));
    }

    #[test]
    fn platform_sender_detection() {
        let rules = RuleBook::default_rules().unwrap();
        assert!(rules.is_platform_sender("jobs-noreply@LinkedIn.com"));
        assert!(rules.is_platform_sender("no-reply@us.greenhouse-mail.io"));
        assert!(!rules.is_platform_sender("friend@example.org"));
    }

    #[test]
    fn add_pattern_extends_or_creates_category() {
        let mut rules = RuleBook::empty();
        rules.add_pattern(StatusCategory::Offer, r"offer letter").unwrap();
        rules.add_pattern(StatusCategory::Offer, r"compensation package").unwrap();
        rules.add_pattern(StatusCategory::Rejected, r"not a match").unwrap();
        assert_eq!(rules.categories().len(), 2);
        assert_eq!(rules.categories()[0].patterns.len(), 2);
    }

    #[test]
    fn empty_rules_have_nothing() {
        let rules = RuleBook::empty();
        assert!(rules.categories().is_empty());
        assert!(rules.exclusions().is_empty());
        assert!(!rules.is_platform_sender("recruiter@linkedin.com"));
    }
}
