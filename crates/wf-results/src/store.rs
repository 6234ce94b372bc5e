//! JSON-lines storage: one `StepRecord` per line.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::types::StepRecord;
use crate::{ResultsError, ResultsResult};

/// Streaming writer for a results file.
pub struct JsonlWriter {
    out: BufWriter<File>,
    written: usize,
}

impl JsonlWriter {
    pub fn append(&mut self, record: &StepRecord) -> ResultsResult<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush buffered records to disk.
    pub fn finish(mut self) -> ResultsResult<usize> {
        self.out.flush()?;
        Ok(self.written)
    }
}

#[derive(Debug, Clone)]
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create (or truncate) the file and return a writer.
    pub fn create(&self) -> ResultsResult<JsonlWriter> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path)?;
        Ok(JsonlWriter {
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn save(&self, records: &[StepRecord]) -> ResultsResult<()> {
        let mut writer = self.create()?;
        for record in records {
            writer.append(record)?;
        }
        writer.finish()?;
        Ok(())
    }

    pub fn load(&self) -> ResultsResult<Vec<StepRecord>> {
        if !self.path.exists() {
            return Err(ResultsError::NotFound {
                path: self.path.display().to_string(),
            });
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| ResultsError::Malformed {
                line: i + 1,
                message: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}
