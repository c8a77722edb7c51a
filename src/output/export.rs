//! Machine-readable session exports
//!
//! Alongside the markdown report every session writes, into `output_dir`:
//! - `session-<id>-churches.json` and `session-<id>-churches.csv`: every
//!   committed candidate with its classification
//! - `session-<id>-errors.json`: the error log
//! - `session-<id>-summary.json`: status, totals and per-source outcomes
//!
//! Dry runs write them too; they are the only record of what a dry run saw.

use crate::crawler::{Classification, CrawlResult};
use crate::output::OutputResult;
use crate::record::CandidateRecord;
use crate::state::SessionTotals;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// CSV header, in field order of [`ExportedRecord`]
const CSV_COLUMNS: [&str; 15] = [
    "outcome",
    "church_id",
    "source_id",
    "name",
    "jurisdiction",
    "address",
    "city",
    "state",
    "zip_code",
    "clergy_contact",
    "website",
    "contact_phone",
    "contact_email",
    "source_url",
    "dedup_key",
];

/// One classified candidate as exported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedRecord {
    /// `new`, `duplicate` or `updated`
    pub outcome: String,
    /// Stored row the candidate landed in; absent for dry-run inserts
    pub church_id: Option<i64>,
    pub source_id: String,
    pub name: String,
    pub jurisdiction: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub clergy_contact: Option<String>,
    pub website: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub source_url: Option<String>,
    pub dedup_key: String,
}

impl ExportedRecord {
    /// Builds the export row for a committed candidate
    pub fn new(candidate: &CandidateRecord, classification: &Classification) -> Self {
        let church_id = match classification {
            Classification::New(record) => Some(record.id).filter(|id| *id > 0),
            Classification::Duplicate { existing_id } | Classification::Update { existing_id, .. } => {
                Some(*existing_id)
            }
        };

        Self {
            outcome: classification.label().to_string(),
            church_id,
            source_id: candidate.source_id.clone(),
            name: candidate.name.clone(),
            jurisdiction: candidate.jurisdiction.clone(),
            address: candidate.address.clone(),
            city: candidate.city.clone(),
            state: candidate.state.clone(),
            zip_code: candidate.zip_code.clone(),
            clergy_contact: candidate.clergy_contact.clone(),
            website: candidate.website.clone(),
            contact_phone: candidate.contact_phone.clone(),
            contact_email: candidate.contact_email.clone(),
            source_url: candidate.source_url.clone(),
            dedup_key: candidate.dedup_key(),
        }
    }
}

#[derive(Serialize)]
struct SourceOutcome<'a> {
    source_id: &'a str,
    jurisdiction: &'a str,
    status: &'a str,
    attempts: u32,
    candidates: usize,
    error: Option<&'a str>,
}

#[derive(Serialize)]
struct SessionExport<'a> {
    session_id: &'a str,
    status: &'a str,
    dry_run: bool,
    duration_ms: u64,
    fatal_error: Option<&'a str>,
    totals: SessionTotals,
    sources: Vec<SourceOutcome<'a>>,
}

/// Writes every export of a closed session into `output_dir`
///
/// # Returns
///
/// * `Ok(Vec<PathBuf>)` - Paths written, in the order listed in the module docs
/// * `Err(OutputError)` - A file could not be written
pub fn write_session_exports(output_dir: &Path, result: &CrawlResult) -> OutputResult<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let file = |suffix: &str| output_dir.join(format!("session-{}-{}", result.session_id, suffix));

    let churches_json = file("churches.json");
    serde_json::to_writer_pretty(BufWriter::new(File::create(&churches_json)?), &result.records)?;

    let churches_csv = file("churches.csv");
    write_csv(&churches_csv, &result.records)?;

    let errors_json = file("errors.json");
    serde_json::to_writer_pretty(BufWriter::new(File::create(&errors_json)?), &result.errors)?;

    let summary_json = file("summary.json");
    let summary = SessionExport {
        session_id: &result.session_id,
        status: result.status.to_db_string(),
        dry_run: result.dry_run,
        duration_ms: result.duration_ms,
        fatal_error: result.fatal_error.as_deref(),
        totals: result.totals,
        sources: result
            .tasks
            .iter()
            .map(|task| SourceOutcome {
                source_id: &task.source_id,
                jurisdiction: &task.jurisdiction,
                status: task.status.as_str(),
                attempts: task.attempts,
                candidates: task.candidates,
                error: task.error.as_deref(),
            })
            .collect(),
    };
    serde_json::to_writer_pretty(BufWriter::new(File::create(&summary_json)?), &summary)?;

    Ok(vec![churches_json, churches_csv, errors_json, summary_json])
}

/// Writes records as CSV; the header is written even when there are none
fn write_csv(path: &Path, records: &[ExportedRecord]) -> OutputResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(CSV_COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ChurchRecord;
    use crate::state::SessionStatus;
    use tempfile::TempDir;

    fn candidate() -> CandidateRecord {
        let mut candidate = CandidateRecord::new("oca", "Holy Trinity", "Orthodox Church in America");
        candidate.city = Some("Boston".to_string());
        candidate.state = Some("MA".to_string());
        candidate.clergy_contact = Some("Father John Smith".to_string());
        candidate
    }

    fn result(records: Vec<ExportedRecord>) -> CrawlResult {
        CrawlResult {
            session_id: "7a2e".to_string(),
            status: SessionStatus::Completed,
            totals: SessionTotals {
                found: records.len() as u64,
                new: records.len() as u64,
                ..Default::default()
            },
            duration_ms: 40,
            tasks: Vec::new(),
            errors: Vec::new(),
            fatal_error: None,
            dry_run: true,
            records,
            report_path: None,
            export_paths: Vec::new(),
        }
    }

    #[test]
    fn test_church_id_per_outcome() {
        let mut inserted = ChurchRecord::from_candidate(&candidate(), "7a2e");
        inserted.id = 12;
        let stored = ExportedRecord::new(&candidate(), &Classification::New(inserted.clone()));
        assert_eq!(stored.outcome, "new");
        assert_eq!(stored.church_id, Some(12));

        // Dry-run inserts carry a placeholder id
        inserted.id = -1;
        let dry = ExportedRecord::new(&candidate(), &Classification::New(inserted));
        assert_eq!(dry.church_id, None);

        let duplicate = ExportedRecord::new(&candidate(), &Classification::Duplicate { existing_id: 4 });
        assert_eq!(duplicate.outcome, "duplicate");
        assert_eq!(duplicate.church_id, Some(4));
        assert_eq!(duplicate.dedup_key, candidate().dedup_key());
    }

    #[test]
    fn test_exports_written() {
        let dir = TempDir::new().unwrap();
        let record = ExportedRecord::new(&candidate(), &Classification::Duplicate { existing_id: 4 });

        let paths = write_session_exports(dir.path(), &result(vec![record.clone()])).unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));

        let json = fs::read_to_string(&paths[0]).unwrap();
        let parsed: Vec<ExportedRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vec![record]);

        let csv = fs::read_to_string(&paths[1]).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_COLUMNS.join(",").as_str()));
        let row = lines.next().unwrap();
        assert!(row.starts_with("duplicate,4,oca,Holy Trinity,Orthodox Church in America,,Boston,MA,"));
        assert!(lines.next().is_none());

        let summary = fs::read_to_string(&paths[3]).unwrap();
        assert!(summary.contains("\"status\": \"completed\""));
        assert!(summary.contains("\"dry_run\": true"));
    }

    #[test]
    fn test_empty_session_still_gets_csv_header() {
        let dir = TempDir::new().unwrap();

        let paths = write_session_exports(dir.path(), &result(Vec::new())).unwrap();

        assert_eq!(fs::read_to_string(&paths[1]).unwrap().trim_end(), CSV_COLUMNS.join(","));
        assert_eq!(fs::read_to_string(&paths[0]).unwrap().trim(), "[]");
    }
}
