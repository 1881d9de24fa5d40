//! HTML report generator.
//!
//! Produces one self-contained page per batch with CSS/JS inlined.

use anyhow::{Context, Result};
use std::path::Path;

use radcoach_core::report::{AnalysisReport, BatchReport};
use radcoach_core::statistics::FindingFrequency;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn score_class(score: u32) -> &'static str {
    match score {
        80.. => "good",
        50..=79 => "fair",
        _ => "poor",
    }
}

/// Render a batch report as HTML.
pub fn generate_html(report: &BatchReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>radcoach report: {}</title>\n",
        html_escape(&report.library.name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>radcoach report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Library: <strong>{}</strong> | {} cases | {} analyzed | {} failed | {}</p>\n",
        html_escape(&report.library.name),
        report.library.case_count,
        report.analyses.len(),
        report.failures.len(),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    push_dashboard(&mut html, report);
    push_results_table(&mut html, &report.analyses);

    if !report.failures.is_empty() {
        html.push_str("<section class=\"failures\">\n<h2>Failures</h2>\n<ul>\n");
        for f in &report.failures {
            html.push_str(&format!(
                "<li class=\"poor\"><strong>{}</strong>: {}</li>\n",
                html_escape(&f.case_id),
                html_escape(&f.error)
            ));
        }
        html.push_str("</ul>\n</section>\n");
    }

    html.push_str("<section class=\"feedback\">\n<h2>Feedback</h2>\n");
    for analysis in &report.analyses {
        push_feedback(&mut html, analysis);
    }
    html.push_str("</section>\n");

    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &BatchReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn push_dashboard(html: &mut String, report: &BatchReport) {
    let stats = &report.aggregate;

    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\">\n");
    html.push_str(
        "<thead><tr><th>Analyzed</th><th>Mean score</th><th>Min</th><th>Max</th><th>Perfect</th><th>Duration</th></tr></thead>\n",
    );
    html.push_str(&format!(
        "<tbody><tr><td>{}</td><td class=\"{}\">{:.1}</td><td>{}</td><td>{}</td><td>{}</td><td>{}ms</td></tr></tbody>\n",
        stats.analyzed,
        score_class(stats.mean_score.round() as u32),
        stats.mean_score,
        stats.min_score,
        stats.max_score,
        stats.perfect_count,
        report.duration_ms,
    ));
    html.push_str("</table>\n");

    if !report.analyses.is_empty() {
        html.push_str(&generate_bar_chart(&report.analyses));
    }

    push_frequency_list(html, "Most missed", &stats.most_missed);
    push_frequency_list(html, "Most misinterpreted", &stats.most_misinterpreted);

    html.push_str("</section>\n");
}

fn push_frequency_list(html: &mut String, title: &str, items: &[FindingFrequency]) {
    if items.is_empty() {
        return;
    }
    html.push_str(&format!("<h3>{title}</h3>\n<ol class=\"frequency\">\n"));
    for item in items {
        html.push_str(&format!(
            "<li>{} <span class=\"count\">({})</span></li>\n",
            html_escape(&item.finding_type),
            item.count
        ));
    }
    html.push_str("</ol>\n");
}

fn push_results_table(html: &mut String, analyses: &[AnalysisReport]) {
    html.push_str("<section class=\"results\">\n");
    html.push_str("<h2>Results</h2>\n");
    html.push_str("<table class=\"results-table\" id=\"results\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable(0)\">Case</th><th onclick=\"sortTable(1)\">Score</th><th onclick=\"sortTable(2)\">Correct</th><th onclick=\"sortTable(3)\">Missed</th><th onclick=\"sortTable(4)\">Misinterpreted</th><th onclick=\"sortTable(5)\">Style</th></tr></thead>\n");
    html.push_str("<tbody>\n");

    for a in analyses {
        let feedback = &a.feedback;
        let class = score_class(feedback.overall_score);
        html.push_str(&format!(
            "<tr><td><a href=\"#case-{id}\">{id}</a></td><td class=\"{class}\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            feedback.overall_score,
            feedback.correct_observations.len(),
            feedback.missed_findings.len(),
            feedback.misinterpretations.len(),
            feedback.clarity_and_style.len(),
            id = html_escape(&a.case_id),
        ));
    }

    html.push_str("</tbody></table>\n");
    html.push_str("</section>\n");
}

fn push_feedback(html: &mut String, analysis: &AnalysisReport) {
    let feedback = &analysis.feedback;
    let id = html_escape(&analysis.case_id);

    html.push_str(&format!("<article id=\"case-{id}\">\n"));
    html.push_str(&format!(
        "<h3>{id} <span class=\"score {}\">{}/100</span></h3>\n",
        score_class(feedback.overall_score),
        feedback.overall_score
    ));
    html.push_str(&format!(
        "<p class=\"meta\">Gold standard: {}</p>\n",
        if analysis.gold_standard.is_empty() {
            "<em>none</em>".to_string()
        } else {
            html_escape(&analysis.gold_standard.join(", "))
        }
    ));

    let sections: [(&str, &str, &[String]); 5] = [
        ("Correct observations", "good", &feedback.correct_observations),
        ("Missed findings", "poor", &feedback.missed_findings),
        ("Misinterpretations", "poor", &feedback.misinterpretations),
        ("Clarity and style", "fair", &feedback.clarity_and_style),
        ("Tips", "", &feedback.tips),
    ];
    for (title, class, items) in sections {
        if items.is_empty() {
            continue;
        }
        html.push_str(&format!("<h4>{title}</h4>\n<ul class=\"{class}\">\n"));
        for item in items {
            html.push_str(&format!("<li>{}</li>\n", html_escape(item)));
        }
        html.push_str("</ul>\n");
    }

    if !feedback.diagnostics.is_empty() {
        html.push_str("<h4>Diagnostics</h4>\n<ul class=\"diagnostics\">\n");
        for d in &feedback.diagnostics {
            html.push_str(&format!(
                "<li><code>{}</code> {}</li>\n",
                d.kind,
                html_escape(&d.message)
            ));
        }
        html.push_str("</ul>\n");
    }

    if !analysis.extractor_runs.is_empty() {
        html.push_str("<details>\n<summary>Extractors</summary>\n<table>\n");
        html.push_str("<thead><tr><th>Extractor</th><th>Status</th><th>Candidates</th><th>Attempts</th><th>Duration</th></tr></thead>\n<tbody>\n");
        for run in &analysis.extractor_runs {
            let status = match &run.error {
                Some(e) => format!("failed: {}", html_escape(e)),
                None => "ok".to_string(),
            };
            html.push_str(&format!(
                "<tr><td>{}</td><td class=\"{}\">{}</td><td>{}</td><td>{}</td><td>{}ms</td></tr>\n",
                html_escape(&run.extractor),
                if run.succeeded { "good" } else { "poor" },
                status,
                run.candidates.len(),
                run.attempts,
                run.duration_ms,
            ));
        }
        html.push_str("</tbody></table>\n</details>\n");
    }

    html.push_str("</article>\n");
}

fn generate_bar_chart(analyses: &[AnalysisReport]) -> String {
    let bar_height = 24;
    let max_width = 400;
    let padding = 8;
    let label_width = 200;

    let total_height = analyses.len() * (bar_height + padding) + padding;

    let mut svg = format!(
        "<svg width=\"{}\" height=\"{}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        label_width + max_width + 60,
        total_height
    );

    for (i, a) in analyses.iter().enumerate() {
        let score = a.feedback.overall_score.min(100) as usize;
        let y = i * (bar_height + padding) + padding;
        let width = score * max_width / 100;

        let color = match score_class(a.feedback.overall_score) {
            "good" => "#22c55e",
            "fair" => "#eab308",
            _ => "#ef4444",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"14\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            label_width - 10,
            y + bar_height / 2,
            html_escape(&a.case_id)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{}\" rx=\"4\"/>\n",
            label_width, y, width, bar_height, color
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{}</text>\n",
            label_width + width + 8,
            y + bar_height / 2,
            score
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --good: #dcfce7; --fair: #fef9c3; --poor: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --good: #064e3b; --fair: #713f12; --poor: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.good { background: var(--good); }
.fair { background: var(--fair); }
.poor { background: var(--poor); }
.score { padding: 0.1rem 0.5rem; border-radius: 4px; font-size: 0.9rem; }
.count { color: #6b7280; }
article { border-top: 1px solid var(--border); padding: 1rem 0; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(col) {
  const table = document.getElementById('results');
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    const na = parseFloat(va), nb = parseFloat(vb);
    const cmp = isNaN(na) || isNaN(nb) ? va.localeCompare(vb) : na - nb;
    return asc ? cmp : -cmp;
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
