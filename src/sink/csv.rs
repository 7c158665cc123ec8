//! Tabular export of call outcomes.
//!
//! The file is only ever appended to. The header row is written when the
//! file is created (or found empty) and never again.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::CallRecordSink;
use crate::calls::CallRecord;

pub const CALL_COLUMNS: [&str; 10] = [
    "Full Name",
    "Phone Number",
    "Email",
    "Position Applied",
    "Response",
    "Has Laptop",
    "Expected Salary",
    "Notice Period",
    "Working Hours",
    "Recording Link",
];

pub struct CsvCallSink {
    path: PathBuf,
}

impl CsvCallSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn needs_header(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        }
    }
}

fn to_columns(row: &CallRecord) -> [String; 10] {
    [
        row.full_name.clone(),
        // leading quote keeps spreadsheets from reading the number as numeric
        format!("'{}", row.phone_number),
        row.email.clone(),
        row.position_applied.clone(),
        row.response.clone(),
        row.analysis.has_laptop.clone(),
        row.analysis.expected_salary.clone(),
        row.analysis.notice_period.clone(),
        row.analysis.working_hours.clone(),
        row.analysis.recording_link.clone(),
    ]
}

#[async_trait]
impl CallRecordSink for CsvCallSink {
    async fn append(&self, rows: &[CallRecord]) -> Result<()> {
        let header = self.needs_header().await;

        let mut writer = ::csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        if header {
            writer.write_record(CALL_COLUMNS)?;
        }
        for row in rows {
            writer.write_record(to_columns(row))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to encode CSV rows: {}", e))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        debug!(rows = rows.len(), header, "Appended call rows to {}", self.path.display());
        Ok(())
    }
}
