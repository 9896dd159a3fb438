//! Persistence of a finished run: the analysis report (with run
//! metadata) as JSON and the metrics frame as CSV, both under a
//! `results/` directory.

use chrono::Utc;
use metrics_frame::MetricsFrame;
use postlens_core::{AnalysisReport, CoreError, RunMetadata};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Shape of the saved JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct SavedAnalysis<'a> {
    pub metadata: &'a RunMetadata,
    pub report: &'a AnalysisReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPaths {
    pub analysis: PathBuf,
    pub frame: PathBuf,
}

/// Writes `analysis_<handle>_<timestamp>.json` and
/// `frame_<handle>_<timestamp>.csv` under `dir`, creating it if needed.
pub fn save_results(
    dir: &Path,
    report: &AnalysisReport,
    metadata: &RunMetadata,
    frame: &MetricsFrame,
) -> Result<SavedPaths, CoreError> {
    fs::create_dir_all(dir)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let analysis_path = dir.join(format!("analysis_{}_{timestamp}.json", report.handle));
    let frame_path = dir.join(format!("frame_{}_{timestamp}.csv", report.handle));

    let document = SavedAnalysis { metadata, report };
    let json = serde_json::to_string_pretty(&document)?;
    fs::write(&analysis_path, json)?;
    fs::write(&frame_path, frame.to_csv())?;

    info!(
        "saved analysis to {} and frame to {}",
        analysis_path.display(),
        frame_path.display()
    );
    Ok(SavedPaths {
        analysis: analysis_path,
        frame: frame_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use postlens_core::{AnalysisMode, AnalysisPayload};
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("postlens-test-{}", Uuid::new_v4()))
    }

    fn metadata() -> RunMetadata {
        let now = Utc::now();
        RunMetadata {
            run_id: Uuid::new_v4(),
            handle: "alice".to_string(),
            started_at: now,
            finished_at: now,
            post_count: 1,
            reply_count: 0,
            requests_issued: 2,
            rate_limit_waits: 0,
        }
    }

    #[test]
    fn saves_json_and_csv_under_the_target_directory() {
        let dir = scratch_dir();
        let mut report = AnalysisReport::new("alice".to_string(), AnalysisMode::Standard);
        report.sections.insert(
            "content_strategy".to_string(),
            AnalysisPayload::Raw("post more threads".to_string()),
        );

        let paths = save_results(&dir, &report, &metadata(), &MetricsFrame::build(&[])).unwrap();

        let json = fs::read_to_string(&paths.analysis).unwrap();
        assert!(json.contains("post more threads"));
        assert!(json.contains("requests_issued"));

        let csv = fs::read_to_string(&paths.frame).unwrap();
        assert!(csv.starts_with("post_id,text,created_at"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn filenames_carry_the_handle() {
        let dir = scratch_dir();
        let report = AnalysisReport::new("bob".to_string(), AnalysisMode::Standard);
        let paths = save_results(&dir, &report, &metadata(), &MetricsFrame::build(&[])).unwrap();

        let name = paths.analysis.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("analysis_bob_"));
        assert!(name.ends_with(".json"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
