//! Sisifus: job-application funnel analytics over classified email.

pub mod analytics;
pub mod config;
pub mod error;
pub mod export;
pub mod funnel;
pub mod pipeline;
