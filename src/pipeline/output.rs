use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::common::constants::OUTPUT_COLUMNS;
use crate::common::error::{BuildError, Result};
use crate::common::types::EnforcementRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// What was written where
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: usize,
    /// Hex SHA-256 of the file contents
    pub sha256: String,
}

/// Render rows as CSV. The header is always present, even with no rows.
pub fn render_csv(rows: &[EnforcementRow]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(OUTPUT_COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| BuildError::Io(e.into_error()))
}

pub fn render_json(rows: &[EnforcementRow]) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec_pretty(rows)?;
    bytes.push(b'\n');
    Ok(bytes)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Write all rows to `path` in one go, creating parent directories as needed
pub fn write_rows(rows: &[EnforcementRow], path: &Path, format: OutputFormat) -> Result<WriteReport> {
    let bytes = match format {
        OutputFormat::Csv => render_csv(rows)?,
        OutputFormat::Json => render_json(rows)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;

    let report = WriteReport {
        path: path.to_path_buf(),
        rows: rows.len(),
        bytes: bytes.len(),
        sha256: sha256_hex(&bytes),
    };
    info!(
        path = %report.path.display(),
        rows = report.rows,
        sha256 = %report.sha256,
        "Wrote enforcement rows"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{AppealOutcome, Decision, PolicyCategory, UserResponse};

    fn row() -> EnforcementRow {
        EnforcementRow {
            id: "rtp_1".to_string(),
            ts: "2025-08-08T23:54:00Z".to_string(),
            policy_category: PolicyCategory::NonviolentWrongdoing,
            confidence: 0.15,
            decision: Decision::Allow,
            rationale: "rtp: benign/low-tox".to_string(),
            slice: "EN".to_string(),
            language: "en".to_string(),
            latency_ms: 141,
            cost_cents: 1,
            user_response: UserResponse::None,
            appeal_outcome: AppealOutcome::None,
        }
    }

    #[test]
    fn test_csv_header_and_row() {
        let csv = String::from_utf8(render_csv(&[row()]).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "id,ts,policy_category,confidence,decision,rationale,slice,language,latencyMs,costCents,user_response,appeal_outcome"
        );
        assert_eq!(
            lines[1],
            "rtp_1,2025-08-08T23:54:00Z,NONVIOLENT_WRONGDOING,0.15,allow,rtp: benign/low-tox,EN,en,141,1,none,none"
        );
    }

    #[test]
    fn test_empty_csv_still_has_header() {
        let csv = String::from_utf8(render_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("id,ts,"));
    }

    #[test]
    fn test_json_uses_column_names() {
        let json: serde_json::Value = serde_json::from_slice(&render_json(&[row()]).unwrap()).unwrap();
        assert_eq!(json[0]["latencyMs"], 141);
        assert_eq!(json[0]["costCents"], 1);
        assert_eq!(json[0]["policy_category"], "NONVIOLENT_WRONGDOING");
    }

    #[test]
    fn test_write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/enforcement.csv");
        let report = write_rows(&[row()], &path, OutputFormat::Csv).unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(report.rows, 1);
        assert_eq!(report.bytes, written.len());
        assert_eq!(report.sha256, sha256_hex(&written));
        assert_eq!(report.sha256.len(), 64);
    }
}
