//! Markdown session report
//!
//! One `session-<id>.md` file per session: metadata, totals, per-source task
//! outcomes and the error log.

use crate::crawler::CrawlResult;
use crate::output::OutputResult;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes the report of a closed session into `output_dir`
///
/// # Arguments
///
/// * `output_dir` - Directory for session artifacts; created if missing
/// * `result` - The closed session
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the written report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_session_report(output_dir: &Path, result: &CrawlResult) -> OutputResult<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("session-{}.md", result.session_id));

    let mut file = File::create(&path)?;
    file.write_all(format_session_report(result).as_bytes())?;

    Ok(path)
}

/// Formats a session result as markdown
pub fn format_session_report(result: &CrawlResult) -> String {
    let mut md = String::new();

    md.push_str("# Vespers Crawl Session\n\n");

    md.push_str("## Session Information\n\n");
    md.push_str(&format!("- **Session ID**: {}\n", result.session_id));
    md.push_str(&format!("- **Status**: {}\n", result.status));
    md.push_str(&format!(
        "- **Duration**: {} ms ({:.2} seconds)\n",
        result.duration_ms,
        result.duration_ms as f64 / 1000.0
    ));
    if result.dry_run {
        md.push_str("- **Mode**: dry run (nothing saved)\n");
    }
    if let Some(fatal) = &result.fatal_error {
        md.push_str(&format!("- **Fatal Error**: {}\n", fatal));
    }
    md.push('\n');

    let totals = &result.totals;
    md.push_str("## Totals\n\n");
    md.push_str("| Found | New | Duplicate | Updated | Errors |\n");
    md.push_str("|-------|-----|-----------|---------|--------|\n");
    md.push_str(&format!(
        "| {} | {} | {} | {} | {} |\n\n",
        totals.found, totals.new, totals.duplicate, totals.updated, totals.errors
    ));

    if !result.tasks.is_empty() {
        md.push_str("## Sources\n\n");
        md.push_str("| Source | Jurisdiction | Status | Attempts | Candidates |\n");
        md.push_str("|--------|--------------|--------|----------|------------|\n");
        for task in &result.tasks {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                task.source_id, task.jurisdiction, task.status, task.attempts, task.candidates
            ));
        }
        md.push('\n');
    }

    if !result.errors.is_empty() {
        md.push_str(&format!("## Errors ({})\n\n", result.errors.len()));
        for error in &result.errors {
            md.push_str(&format!("- `{}` **{}**", error.kind, error.source));
            if let Some(url) = &error.url {
                md.push_str(&format!(" <{}>", url));
            }
            md.push_str(&format!(": {}\n", error.message));
        }
        md.push('\n');
    }

    md.push_str("---\n\n");
    md.push_str("*Generated by Vespers*\n");

    md
}
