use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use chrono::Utc;

use sisifus::analytics::AnalyticsReport;
use sisifus::config::AnalyticsConfig;
use sisifus::export;
use sisifus::funnel::{CompanyFlowResolver, FlowGraphBuilder};
use sisifus::pipeline::{DateFilter, PatternClassifier, classify_parallel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AnalyticsConfig::from_env()?;

    eprintln!("📬 Sisifus v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Input: {}", config.input_path.display());
    eprintln!("   Output: {}", config.output_dir.display());
    eprintln!("   Workers: {}", config.workers);

    // ── Load + filter ───────────────────────────────────────────────────
    let records = export::load_records(&config.input_path)
        .await
        .with_context(|| format!("Failed to load {}", config.input_path.display()))?;

    let filter = DateFilter::new(config.months, config.year);
    if filter.is_active() {
        eprintln!(
            "   Filter: months={:?} year={:?}",
            filter.months, filter.year
        );
    }
    let records = filter.apply(records, Utc::now());
    let loaded = records.len();

    // ── Classify ────────────────────────────────────────────────────────
    let classifier = Arc::new(
        PatternClassifier::new()
            .context("Failed to compile classification rules")?
            .with_body_window(config.body_window),
    );

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing classified records");
                interrupt.store(true, Ordering::Relaxed);
            }
        });
    }

    let outcome = classify_parallel(classifier, records, config.workers, interrupt).await;

    // ── Resolve + report ────────────────────────────────────────────────
    let flows = CompanyFlowResolver.resolve(&outcome.emails);
    let report = AnalyticsReport::build(&outcome.emails, &flows);
    let graph = FlowGraphBuilder.build(&flows, report.summary.source_counts());

    let written = export::write_outputs(&config.output_dir, &report, &graph, &outcome.emails)
        .await
        .with_context(|| format!("Failed to write outputs to {}", config.output_dir.display()))?;

    let summary = &report.summary;
    eprintln!();
    eprintln!("   Classified: {}/{}", outcome.emails.len(), loaded);
    if outcome.failure_count() > 0 {
        eprintln!("   Failures (defaulted): {}", outcome.failure_count());
    }
    if outcome.interrupted {
        eprintln!("   Interrupted: partial results written");
    }
    eprintln!("   Applications: {}", summary.total_applications);
    eprintln!("   Companies: {}", summary.total_companies);
    eprintln!(
        "   Interviews: {}  Offers: {}  Accepted: {}  Rejected: {}",
        summary.interviews_count, summary.offers_count, summary.accepted_count, summary.rejected_count
    );
    eprintln!("   Confident: {:.2}%", summary.accuracy_percentage);
    for path in &written {
        eprintln!("   Wrote {}", path.display());
    }

    Ok(())
}
