mod dataset;
mod insights;
mod markets;
mod models;
mod patterns;
mod recommendations;
mod simulator;
mod stats;

use std::io::{BufWriter, Write, stderr, stdout};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::dataset::{CohortSnapshot, DayRange, FilterCriteria, compare_cohorts, load_from_path};
use crate::insights::InsightEngine;
use crate::models::{AmountBin, DeclineReason};
use crate::recommendations::RecommendationEngine;
use crate::simulator::{RerouteRequest, SimulationOutcome, Simulator};

#[derive(Debug, Parser)]
#[command(
    name = "payment-insight-engine",
    about = "Anomaly insights, recommended actions and routing what-ifs over a payments batch"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print KPIs, detected insights and recommended actions for a batch
    Report(ReportArgs),
    /// Estimate the impact of re-routing traffic between two processors
    Simulate(SimulateArgs),
    /// Compare two day-range cohorts of the same batch
    Compare(CompareArgs),
}

#[derive(Debug, Args)]
struct ReportArgs {
    /// Input batch (.csv or .json)
    input: PathBuf,
    /// Day-of-month window, e.g. 1-30
    #[arg(long)]
    days: Option<DayRange>,
    /// Keep only these countries (repeatable)
    #[arg(long = "country")]
    countries: Vec<String>,
    /// Keep only these processors (repeatable)
    #[arg(long = "processor")]
    processors: Vec<String>,
    /// Keep only these payment methods (repeatable)
    #[arg(long = "method")]
    methods: Vec<String>,
    /// Keep only these amount brackets, e.g. $50-200 (repeatable)
    #[arg(long = "amount-bin")]
    amount_bins: Vec<AmountBin>,
    /// Keep approved rows plus declines with these reasons (repeatable)
    #[arg(long = "reason")]
    decline_reasons: Vec<DeclineReason>,
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Input batch (.csv or .json)
    input: PathBuf,
    /// Processor to route away from
    #[arg(long)]
    source: String,
    /// Processor to route onto
    #[arg(long)]
    target: String,
    /// Days to re-route, e.g. 18-18
    #[arg(long, default_value = "1-31")]
    days: DayRange,
    /// Limit to these countries (repeatable, blank = all)
    #[arg(long = "country")]
    countries: Vec<String>,
    /// Limit to these payment methods (repeatable, blank = all)
    #[arg(long = "method")]
    methods: Vec<String>,
}

#[derive(Debug, Args)]
struct CompareArgs {
    /// Input batch (.csv or .json)
    input: PathBuf,
    #[arg(long, default_value = "1-15")]
    period_a: DayRange,
    #[arg(long, default_value = "16-30")]
    period_b: DayRange,
}

fn main() -> Result<()> {
    setup_logging();

    match Cli::parse().command {
        Command::Report(args) => run_report(args),
        Command::Simulate(args) => run_simulate(args),
        Command::Compare(args) => run_compare(args),
    }
}

fn setup_logging() {
    //NOTE: stdout carries the report, so all logging goes to stderr.
    let terminal_log = fmt::layer().with_target(false).with_writer(stderr);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(terminal_log)
        .init();
}

fn run_report(args: ReportArgs) -> Result<()> {
    let dataset = load_from_path(&args.input)?;
    let criteria = FilterCriteria {
        days: args.days,
        countries: args.countries,
        processors: args.processors,
        methods: args.methods,
        amount_bins: args.amount_bins,
        decline_reasons: args.decline_reasons,
    };
    let subset = dataset.filter(&criteria);

    if subset.is_empty() {
        info!("Selection matched no transactions");
    }

    info!(loaded = dataset.len(), selected = subset.len(), "Evaluating batch");

    let findings = InsightEngine::new().evaluate(&subset);
    let recommendations = RecommendationEngine::new().evaluate(&subset);

    let mut output = BufWriter::new(stdout().lock());

    let kpis = subset.kpis();
    writeln!(output, "Transactions: {} ({} approved, {} declined)", kpis.total, kpis.approved, kpis.declined)?;
    match kpis.approval_rate {
        Some(rate) => writeln!(output, "Approval rate: {rate:.1}%")?,
        None => writeln!(output, "Approval rate: n/a")?,
    }
    writeln!(output, "Volume: ${}", kpis.volume.round_dp(2))?;

    writeln!(output)?;
    writeln!(output, "Insights ({})", findings.len())?;
    if findings.is_empty() {
        writeln!(output, "  No anomalies detected in the current selection.")?;
    }
    for finding in &findings {
        writeln!(output, "  [{}] {}: {}", finding.severity, finding.title, finding.text)?;
    }

    writeln!(output)?;
    writeln!(output, "Recommendations ({})", recommendations.len())?;
    if recommendations.is_empty() {
        writeln!(output, "  Nothing to suggest for the current selection.")?;
    }
    for recommendation in &recommendations {
        writeln!(
            output,
            "  [{}] {}: {}",
            recommendation.priority, recommendation.action, recommendation.detail
        )?;
    }

    output.flush()?;

    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    let dataset = load_from_path(&args.input)?;
    let request = RerouteRequest {
        source: args.source,
        target: args.target,
        days: args.days,
        countries: args.countries,
        methods: args.methods,
    };

    let outcome = Simulator::new().simulate(&dataset, &request)?;
    let mut output = BufWriter::new(stdout().lock());

    match outcome {
        SimulationOutcome::NoMatches => {
            writeln!(
                output,
                "No transactions found for {} during days {} with the selected filters.",
                request.source, request.days
            )?;
        }
        SimulationOutcome::Estimated(report) => {
            writeln!(
                output,
                "Re-route {} -> {} (days {})",
                request.source, request.target, request.days
            )?;
            writeln!(output, "Transactions affected: {}", report.affected)?;
            writeln!(
                output,
                "Actual approvals: {} ({:.1}%)",
                report.actual_approvals, report.actual_rate
            )?;
            writeln!(
                output,
                "Simulated approvals: {:.0} ({:.1}%)",
                report.simulated_approvals, report.simulated_rate
            )?;
            writeln!(output, "Approval rate delta: {:+.1}pp", report.rate_delta)?;
            writeln!(
                output,
                "Estimated recovered revenue: ${:.0}",
                report.recovered_revenue
            )?;
        }
    }

    output.flush()?;

    Ok(())
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let dataset = load_from_path(&args.input)?;
    let comparison = compare_cohorts(&dataset, args.period_a, args.period_b);

    let mut output = BufWriter::new(stdout().lock());

    write_cohort(&mut output, "Period A", &comparison.period_a)?;
    write_cohort(&mut output, "Period B", &comparison.period_b)?;

    match comparison.rate_delta() {
        Some(delta) => writeln!(output, "Approval rate delta (A - B): {delta:+.1}pp")?,
        None => writeln!(output, "Approval rate delta (A - B): n/a")?,
    }
    writeln!(output, "Volume delta (A - B): ${}", comparison.volume_delta().round_dp(2))?;

    output.flush()?;

    Ok(())
}

fn write_cohort(output: &mut impl Write, label: &str, cohort: &CohortSnapshot) -> Result<()> {
    let kpis = &cohort.kpis;
    let rate = kpis
        .approval_rate
        .map_or("n/a".to_string(), |rate| format!("{rate:.1}%"));

    writeln!(
        output,
        "{label} (days {}): {} txns, {} approval, ${} volume",
        cohort.range,
        kpis.total,
        rate,
        kpis.volume.round_dp(2)
    )?;

    write_dimension(output, "By processor", &cohort.by_processor)?;
    write_dimension(output, "By country", &cohort.by_country)?;
    write_dimension(output, "By method", &cohort.by_method)?;

    if !cohort.decline_counts.is_empty() {
        let ranked: Vec<String> = cohort
            .decline_counts
            .iter()
            .map(|(reason, count)| format!("{reason} ({count})"))
            .collect();
        writeln!(output, "  Top declines: {}", ranked.join(", "))?;
    }

    Ok(())
}

fn write_dimension(
    output: &mut impl Write,
    label: &str,
    summaries: &[(String, stats::Summary)],
) -> Result<()> {
    if summaries.is_empty() {
        return Ok(());
    }

    let cells: Vec<String> = summaries
        .iter()
        .map(|(value, summary)| {
            let rate = summary
                .rate()
                .map_or("n/a".to_string(), |rate| format!("{rate:.1}%"));
            format!("{value} {rate} ({})", summary.total)
        })
        .collect();

    writeln!(output, "  {label}: {}", cells.join(", "))?;

    Ok(())
}
