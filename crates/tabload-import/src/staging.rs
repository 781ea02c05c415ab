//! Staging file writer
//!
//! Rows pulled from the source are resolved column by column, coerced, and
//! appended to a delimited file that the target then ingests with a single
//! bulk load. The file's first record is the target column list.

use futures::StreamExt;
use indexmap::IndexMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tabload_core::{Row, RowStream, Value};

use crate::coercion::{StagingValue, convert};
use crate::model::{Formatting, ImportJob, JobField, LineCleaning, LineValidation};
use crate::{ConfigError, ImportError, Result};

/// One assembled staging record: target column name to coerced value
pub type StagingRecord = IndexMap<String, StagingValue>;

/// MIME type of the produced file
pub const CONTENT_TYPE: &str = "text/csv";

enum WriterState {
    Unopened,
    Open(csv::Writer<File>),
    Closed,
}

/// Writes the rows of one job run to its staging file
pub struct StagingWriter {
    path: PathBuf,
    fields: Vec<JobField>,
    formatting: Formatting,
    escape: u8,
    line_cleaning: Option<LineCleaning>,
    line_validation: Option<LineValidation>,
    state: WriterState,
    lines_written: u64,
}

impl StagingWriter {
    /// Prepare a writer for `job`; nothing is touched on disk until `open`
    pub fn new(job: &ImportJob, path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            path: path.into(),
            fields: job.ordered_fields()?,
            formatting: job.formatting,
            escape: Formatting::DEFAULT_ESCAPE as u8,
            line_cleaning: job.line_cleaning.clone(),
            line_validation: job.line_validation.clone(),
            state: WriterState::Unopened,
            lines_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    /// Target column names in file order
    pub fn columns(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.target_name().to_string())
            .collect()
    }

    /// Rows appended so far, header excluded
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Create the file and write the header record
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            WriterState::Unopened => {}
            WriterState::Open(_) => return Err(ImportError::WriterState("already open")),
            WriterState::Closed => return Err(ImportError::WriterState("closed")),
        }

        let delimiter = format_byte("delimiter", self.formatting.delimiter())?;
        let enclosure = format_byte("enclosure", self.formatting.enclosure())?;
        self.escape = format_byte("escape", self.formatting.escape())?;

        let file = File::create(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote(enclosure)
            .double_quote(true)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);
        writer.write_record(self.columns())?;

        tracing::debug!(path = %self.path.display(), columns = self.fields.len(), "opened staging file");
        self.state = WriterState::Open(writer);
        Ok(())
    }

    /// Resolve, coerce and append one source row.
    ///
    /// Returns `false` when the line validation rejected the row.
    pub fn write(&mut self, row: &Row) -> Result<bool> {
        if !matches!(self.state, WriterState::Open(_)) {
            return Err(ImportError::WriterState(match self.state {
                WriterState::Unopened => "not open",
                _ => "closed",
            }));
        }

        let mut record = StagingRecord::with_capacity(self.fields.len());
        for field in &self.fields {
            let raw = resolve(field, row);
            let value = convert(raw, field.spec())?;
            record.insert(field.target_name().to_string(), value);
        }

        if let Some(cleaning) = &self.line_cleaning
            && let Some(changes) = cleaning(&record)
        {
            let unknown: Vec<String> = changes
                .keys()
                .filter(|k| !record.contains_key(k.as_str()))
                .cloned()
                .collect();
            if !unknown.is_empty() {
                return Err(ConfigError::UnknownLineColumns(unknown).into());
            }
            record.extend(changes);
        }

        if let Some(validation) = &self.line_validation
            && !validation(&record)
        {
            tracing::trace!("staging line rejected by validation");
            return Ok(false);
        }

        let escape = self.escape;
        let fields: Vec<Vec<u8>> = record
            .values()
            .map(|value| match value.to_bytes() {
                // the loader reads `<escape>N` as NULL
                None => vec![escape, b'N'],
                Some(bytes) => double_escape(&bytes, escape),
            })
            .collect();

        let WriterState::Open(writer) = &mut self.state else {
            return Err(ImportError::WriterState("not open"));
        };
        writer.write_record(&fields)?;
        self.lines_written += 1;
        Ok(true)
    }

    /// Write every row of `rows`, returning the number of lines appended
    pub async fn write_stream(&mut self, mut rows: RowStream) -> Result<u64> {
        while let Some(row) = rows.next().await {
            self.write(&row?)?;
        }
        Ok(self.lines_written)
    }

    /// Flush and release the file
    pub fn close(&mut self) -> Result<()> {
        if let WriterState::Open(writer) = &mut self.state {
            writer.flush()?;
            tracing::debug!(path = %self.path.display(), lines = self.lines_written, "closed staging file");
        }
        self.state = WriterState::Closed;
        Ok(())
    }
}

fn resolve(field: &JobField, row: &Row) -> Value {
    match field {
        JobField::Plain(plain) => {
            let raw = row
                .get_by_name(plain.source_name())
                .cloned()
                .unwrap_or(Value::Null);
            match &plain.cleaning {
                Some(cleaning) => cleaning(raw),
                None => raw,
            }
        }
        JobField::Calculated(calculated) => (calculated.compute)(row),
    }
}

fn format_byte(option: &'static str, c: char) -> Result<u8> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ConfigError::InvalidFormatting {
            option,
            value: c.to_string(),
        }
        .into())
    }
}

/// The loader unescapes values, so a literal escape byte is written twice
fn double_escape(bytes: &[u8], escape: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    for &b in bytes {
        out.push(b);
        if b == escape {
            out.push(b);
        }
    }
    out
}
