//! CSV export of aligned records
//!
//! Header is `ID,<LabelA>_Text,<LabelB>_Text`, for example
//! `ID,English_Text,Khmer_Text`. Output is UTF-8 without a byte-order mark.

use crate::error::AlignResult;
use crate::services::record_assembler::AlignedRecord;
use bitext_common::config::OutputFormat;
use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};

/// Default destination when no output path is configured
///
/// CSV files get a timestamped name so runs never overwrite each other;
/// SQLite runs share one database keyed by run id.
pub fn default_output_path(format: OutputFormat, now: DateTime<Local>) -> PathBuf {
    match format {
        OutputFormat::Csv => {
            PathBuf::from("output").join(format!("aligned_{}.csv", now.format("%Y%m%d_%H%M%S")))
        }
        OutputFormat::Sqlite => PathBuf::from("databases").join("aligned.db"),
    }
}

/// Write records as CSV to any writer
pub fn write_csv_to<W: io::Write>(
    writer: W,
    records: &[AlignedRecord],
    label_a: &str,
    label_b: &str,
) -> AlignResult<()> {
    let mut csv = csv::Writer::from_writer(writer);

    csv.write_record([
        "ID".to_string(),
        format!("{}_Text", label_a),
        format!("{}_Text", label_b),
    ])?;

    for record in records {
        csv.write_record([
            record.id.to_string().as_str(),
            record.text_a.as_str(),
            record.text_b.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Write records to a CSV file, creating parent directories
pub fn write_csv(
    path: &Path,
    records: &[AlignedRecord],
    label_a: &str,
    label_b: &str,
) -> AlignResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = std::fs::File::create(path)?;
    write_csv_to(file, records, label_a, label_b)?;

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Wrote CSV"
    );

    Ok(())
}
