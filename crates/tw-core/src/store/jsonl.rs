//! JSONL persistence.
//!
//! Predictions are loaded from a JSONL export (one record per line).
//! Evaluation and trust records are appended to JSONL files so a run's
//! outputs survive the process; the append path flushes after every record.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use tw_common::{Error, Result};

use crate::schema::PredictionRecord;
use crate::store::InMemoryPredictionStore;

/// Load a JSONL prediction export into an in-memory store.
///
/// Lines that fail to parse are rejected with the line number; a partially
/// loaded store is never returned.
pub fn load_predictions(path: &Path) -> Result<InMemoryPredictionStore> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: PredictionRecord = serde_json::from_str(&line).map_err(|e| {
            Error::Computation(format!(
                "{}:{}: malformed prediction record: {}",
                path.display(),
                lineno + 1,
                e
            ))
        })?;
        records.push(record);
    }
    let store = InMemoryPredictionStore::new();
    store.extend(records);
    Ok(store)
}

/// Append-only JSONL writer for run outputs.
pub struct JsonlWriter {
    writer: BufWriter<File>,
}

impl JsonlWriter {
    /// Open for append, creating the file and parent directory if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonlWriter {
            writer: BufWriter::new(file),
        })
    }

    /// Append one record as a single JSON line and flush.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}
