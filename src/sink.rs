use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// A row source addressable by column name. Unknown columns render as empty cells.
pub trait Tabular {
    fn value(&self, column: &str) -> Option<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Truncate, then header and every row
    Fresh,
    /// Header only when the file does not exist yet, rows appended otherwise
    Append,
}

/// Accumulates rows against a fixed header and writes them in insertion order.
///
/// Rows are never merged or deduplicated; keeping identifiers unique is the
/// caller's job.
pub struct TabularSink {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TabularSink {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push<R: Tabular + ?Sized>(&mut self, record: &R) {
        let row = self
            .columns
            .iter()
            .map(|c| record.value(c).unwrap_or_default().to_string())
            .collect();
        self.rows.push(row);
    }

    pub fn extend<'a, R, I>(&mut self, records: I)
    where
        R: Tabular + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        for record in records {
            self.push(record);
        }
    }

    pub fn write(&self, path: impl AsRef<Path>, mode: WriteMode) -> Result<()> {
        let path = path.as_ref();
        let write_header = match mode {
            WriteMode::Fresh => true,
            WriteMode::Append => !path.exists(),
        };

        let file = match mode {
            WriteMode::Fresh => File::create(path),
            WriteMode::Append => OpenOptions::new().create(true).append(true).open(path),
        }
        .with_context(|| format!("Failed to open output file: {}", path.display()))?;

        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(128 * 1024, file));

        if write_header {
            writer.write_record(&self.columns)?;
        }
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush output file: {}", path.display()))?;

        info!(
            path = %path.display(),
            rows = self.rows.len(),
            header = write_header,
            "Wrote CSV"
        );
        Ok(())
    }
}

/// Reads a CSV file back as header-keyed rows. Short rows yield empty strings
/// for their missing cells.
pub fn read_rows(path: impl AsRef<Path>) -> Result<(Vec<String>, Vec<HashMap<String, String>>)> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open input file: {}", path.display()))?;
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(BufReader::new(file));
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.with_context(|| format!("Malformed row in {}", path.display()))?;
        let row = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        rows.push(row);
    }
    Ok((headers, rows))
}
