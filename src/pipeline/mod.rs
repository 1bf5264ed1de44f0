//! Email classification pipeline.
//!
//! Raw `EmailRecord`s flow through:
//! 1. `DateFilter::apply()`: optional date window
//! 2. `PatternClassifier::classify()`: gate, per-category scoring, priority resolution
//! 3. `classify_all()` / `classify_parallel()`: batch driver with per-record failure isolation
//!
//! No ML and no network: every decision is a deterministic rule application.

pub mod batch;
pub mod classifier;
pub mod filter;
pub mod rules;
pub mod types;

pub use batch::{BatchFailure, BatchOutcome, RecordClassifier, classify_all, classify_parallel};
pub use classifier::PatternClassifier;
pub use filter::DateFilter;
pub use types::{ClassifiedEmail, EmailRecord, StatusCategory};
