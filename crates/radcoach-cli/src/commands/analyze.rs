//! The `radcoach analyze` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use radcoach_core::engine::ProgressReporter;
use radcoach_core::model::{CaseLibrary, Submission};
use radcoach_core::parser;
use radcoach_core::report::{AnalysisReport, BatchReport};
use radcoach_extractors::{build_engine, load_config_from};
use radcoach_report::write_html_report;

use crate::OutputFormat;

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_analysis_start(&self, case_id: &str) {
        eprintln!("  Analyzing: {case_id}");
    }

    fn on_analysis_complete(&self, report: &AnalysisReport) {
        eprintln!(
            "  Done: {} score {}/100 ({}ms)",
            report.case_id, report.feedback.overall_score, report.processing_time_ms
        );
    }

    fn on_analysis_error(&self, case_id: &str, error: &str) {
        eprintln!("  ERROR: {case_id}: {error}");
    }

    fn on_batch_complete(&self, total: usize, completed: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {completed}/{total} analyzed, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub struct AnalyzeArgs {
    pub cases: PathBuf,
    pub case: Option<String>,
    pub text: Option<String>,
    pub text_file: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

pub async fn execute(args: AnalyzeArgs) -> Result<()> {
    let mut config = load_config_from(args.config.as_deref())?;
    if let Some(parallelism) = args.parallelism {
        config.parallelism = parallelism;
    }
    anyhow::ensure!(config.parallelism >= 1, "parallelism must be at least 1");

    let libraries = parser::load_case_libraries(&args.cases)?;
    let work = plan_work(&libraries, &args)?;
    anyhow::ensure!(
        !work.is_empty(),
        "no cases with a sample report in {}; pass --case with --text or --text-file",
        args.cases.display()
    );

    let engine = build_engine(&config)?;
    let reporter = ConsoleReporter;

    let mut batches = Vec::new();
    for (library, submissions) in work {
        eprintln!(
            "radcoach v{}: analyzing {} report(s) from '{}'",
            env!("CARGO_PKG_VERSION"),
            submissions.len(),
            library.name
        );
        batches.push(engine.analyze_batch(library, &submissions, &reporter).await);
    }

    print_batches(&batches, args.format)?;

    if let Some(output) = &args.output {
        save_reports(&batches, output)?;
    }

    Ok(())
}

/// Pair each library with the submissions to analyze.
fn plan_work<'a>(
    libraries: &'a [CaseLibrary],
    args: &AnalyzeArgs,
) -> Result<Vec<(&'a CaseLibrary, Vec<Submission>)>> {
    let Some(case_id) = &args.case else {
        let mut work = Vec::new();
        for library in libraries {
            let submissions = library.sample_submissions();
            if submissions.is_empty() {
                tracing::warn!("library '{}' has no sample reports, skipping", library.id);
                continue;
            }
            work.push((library, submissions));
        }
        return Ok(work);
    };

    let (library, case) = libraries
        .iter()
        .find_map(|l| l.get(case_id).map(|c| (l, c)))
        .with_context(|| format!("case '{case_id}' not found in {}", args.cases.display()))?;

    let report_text = match (&args.text, &args.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report text from {}", path.display()))?,
        (None, None) => case
            .sample_report
            .clone()
            .filter(|r| !r.trim().is_empty())
            .with_context(|| {
                format!("case '{case_id}' has no sample report; pass --text or --text-file")
            })?,
    };

    Ok(vec![(
        library,
        vec![Submission {
            case_id: case.id.clone(),
            report_text,
        }],
    )])
}

fn print_batches(batches: &[BatchReport], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = if let [batch] = batches {
                serde_json::to_string_pretty(batch)
            } else {
                serde_json::to_string_pretty(batches)
            };
            println!("{}", json.context("failed to serialize report")?);
        }
        OutputFormat::Markdown => {
            for batch in batches {
                println!("{}", batch.to_markdown());
            }
        }
        OutputFormat::Text => {
            for batch in batches {
                for analysis in &batch.analyses {
                    print_feedback(analysis);
                }
                for failure in &batch.failures {
                    println!("{}: FAILED: {}", failure.case_id, failure.error);
                }
                print_summary(batch);
            }
        }
    }
    Ok(())
}

fn print_feedback(analysis: &AnalysisReport) {
    let feedback = &analysis.feedback;
    println!(
        "== {} :: score {}/100 ==",
        analysis.case_id, feedback.overall_score
    );
    if analysis.comparison.is_exact_match() {
        println!("All findings match the gold standard.");
    }

    let sections: [(&str, &[String]); 5] = [
        ("Correct observations", &feedback.correct_observations),
        ("Missed findings", &feedback.missed_findings),
        ("Misinterpretations", &feedback.misinterpretations),
        ("Clarity and style", &feedback.clarity_and_style),
        ("Tips", &feedback.tips),
    ];
    for (title, items) in sections {
        println!("{title}:");
        if items.is_empty() {
            println!("  (none)");
        }
        for item in items {
            println!("  - {item}");
        }
    }
    for d in &feedback.diagnostics {
        println!("  ! {}: {}", d.kind, d.message);
    }
    println!();
}

fn print_summary(batch: &BatchReport) {
    if batch.analyses.len() < 2 {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Case",
        "Score",
        "Exact",
        "Correct",
        "Missed",
        "Misinterpreted",
        "Style",
    ]);

    for a in &batch.analyses {
        let feedback = &a.feedback;
        table.add_row(vec![
            Cell::new(&a.case_id),
            Cell::new(feedback.overall_score),
            Cell::new(if a.comparison.is_exact_match() { "yes" } else { "no" }),
            Cell::new(feedback.correct_observations.len()),
            Cell::new(feedback.missed_findings.len()),
            Cell::new(feedback.misinterpretations.len()),
            Cell::new(feedback.clarity_and_style.len()),
        ]);
    }

    println!("{table}");
    println!(
        "Mean score: {:.1} (min {}, max {}, {} perfect)",
        batch.aggregate.mean_score,
        batch.aggregate.min_score,
        batch.aggregate.max_score,
        batch.aggregate.perfect_count
    );
}

fn save_reports(batches: &[BatchReport], output: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("failed to create output directory {}", output.display()))?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    for batch in batches {
        let stem = if batches.len() == 1 {
            format!("report-{timestamp}")
        } else {
            format!("report-{}-{timestamp}", batch.library.id)
        };

        let json_path = output.join(format!("{stem}.json"));
        batch.save_json(&json_path)?;
        eprintln!("Results saved to: {}", json_path.display());

        let html_path = output.join(format!("{stem}.html"));
        write_html_report(batch, &html_path)?;
        eprintln!("HTML report: {}", html_path.display());
    }
    Ok(())
}
