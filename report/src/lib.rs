//! Console rendering for a finished run. Everything here renders to a
//! `String` so the output is testable; the binary prints the result.
//! No analysis decisions live in this crate.

pub mod export;

use metrics_frame::{excerpt, FrameSummary, MetricsFrame};
use postlens_core::{AnalysisPayload, AnalysisReport, RunMetadata};
use prettytable::{row, Table};
use std::fmt::Write;

pub use export::{save_results, SavedAnalysis, SavedPaths};

const BANNER_WIDTH: usize = 60;
const EXCERPT_TABLE_ROWS: usize = 10;
const TABLE_TEXT_CHARS: usize = 60;
const SECTION_CHARS: usize = 400;
const ROLLUP_CHARS: usize = 600;
const HISTOGRAM_WIDTH: usize = 40;

pub fn banner() -> String {
    let line = "=".repeat(BANNER_WIDTH);
    format!("{line}\nPOSTLENS - PROFILE CONTENT ANALYSIS\n{line}\n")
}

/// Top posts by engagement as a console table.
pub fn render_frame_excerpt(frame: &MetricsFrame) -> String {
    let mut table = Table::new();
    table.add_row(row!["Post", "Posted", "Score", "Kind", "Category"]);
    for post in frame.top_by_engagement(EXCERPT_TABLE_ROWS) {
        table.add_row(row![
            excerpt(&post.text, TABLE_TEXT_CHARS),
            post.created_at.format("%Y-%m-%d %H:%M"),
            format!("{:.1}", post.engagement_score),
            post.kind.as_str(),
            post.category.as_str(),
        ]);
    }
    format!("TOP POSTS BY ENGAGEMENT\n{table}")
}

pub fn render_category_summary(summary: &FrameSummary) -> String {
    let mut table = Table::new();
    table.add_row(row!["Category", "Posts", "Mean", "Best", "Top post"]);
    for category in &summary.categories {
        table.add_row(row![
            category.name,
            category.count,
            format!("{:.1}", category.mean_engagement),
            format!("{:.1}", category.max_engagement),
            excerpt(&category.top_excerpt, TABLE_TEXT_CHARS),
        ]);
    }
    format!(
        "CATEGORY BREAKDOWN ({} posts, mean engagement {:.1})\n{table}",
        summary.total_posts, summary.mean_engagement
    )
}

/// Analysis sections with CLI-friendly truncation. Failed categories are
/// listed explicitly rather than silently dropped.
pub fn render_analysis(report: &AnalysisReport) -> String {
    let mut out = String::new();
    let rule = "-".repeat(50);
    let _ = writeln!(out, "ANALYSIS RESULTS for @{}", report.handle);
    let _ = writeln!(
        out,
        "Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    for (name, payload) in &report.sections {
        let limit = if matches!(name.as_str(), "recommendations" | "content_strategy") {
            ROLLUP_CHARS
        } else {
            SECTION_CHARS
        };
        let _ = writeln!(out, "\n{}\n{rule}", section_title(name));
        let _ = writeln!(out, "{}", excerpt(&render_payload(payload), limit));
    }

    for (name, reason) in &report.failures {
        let _ = writeln!(out, "\n{}\n{rule}", section_title(name));
        let _ = writeln!(out, "[analysis unavailable: {reason}]");
    }

    out
}

/// Hour-of-day engagement histogram as a console bar chart. Hours with
/// no posts are omitted.
pub fn render_hour_histogram(frame: &MetricsFrame) -> String {
    let mut buckets = [0.0f64; 24];
    for post in frame.rows() {
        buckets[post.hour as usize % 24] += post.engagement_score;
    }
    let max = buckets.iter().cloned().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return "ENGAGEMENT BY HOUR\n(no engagement data)\n".to_string();
    }

    let mut out = String::from("ENGAGEMENT BY HOUR\n");
    for (hour, &total) in buckets.iter().enumerate() {
        if total <= 0.0 {
            continue;
        }
        let width = ((total / max) * HISTOGRAM_WIDTH as f64).ceil() as usize;
        let _ = writeln!(out, "{hour:>2}:00 | {} {total:.1}", "#".repeat(width.max(1)));
    }
    out
}

pub fn render_run_footer(metadata: &RunMetadata) -> String {
    let elapsed = metadata.finished_at - metadata.started_at;
    format!(
        "Run {}: {} post(s), {} repl(y/ies), {} API request(s), {} rate-limit wait(s), {}s elapsed\n",
        metadata.run_id,
        metadata.post_count,
        metadata.reply_count,
        metadata.requests_issued,
        metadata.rate_limit_waits,
        elapsed.num_seconds()
    )
}

fn section_title(name: &str) -> String {
    name.replace('_', " ").to_uppercase()
}

fn render_payload(payload: &AnalysisPayload) -> String {
    match payload {
        AnalysisPayload::Raw(text) => text.clone(),
        AnalysisPayload::Structured(map) => {
            serde_json::to_string_pretty(map).unwrap_or_else(|_| "{}".to_string())
        }
    }
}
