//! Lazy line-delimited JSON reader
//!
//! Yields one [`LineRecord`] per physical line. Blank, malformed, or
//! non-UTF-8 lines come back as [`LineRecord::Skip`] instead of ending the
//! sequence; only a hard I/O error ends it early.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Lines};
use std::marker::PhantomData;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub enum LineRecord<T> {
    Record(T),
    Skip,
}

impl<T> LineRecord<T> {
    pub fn into_record(self) -> Option<T> {
        match self {
            LineRecord::Record(record) => Some(record),
            LineRecord::Skip => None,
        }
    }
}

pub struct JsonLines<R, T = Value> {
    lines: Lines<R>,
    line_number: u64,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonLines<BufReader<File>, T> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead, T: DeserializeOwned> JsonLines<R, T> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            _record: PhantomData,
        }
    }

    /// Physical lines consumed so far, skipped ones included.
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }
}

impl<R: BufRead, T: DeserializeOwned> Iterator for JsonLines<R, T> {
    type Item = LineRecord<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(err) if err.kind() == ErrorKind::InvalidData => {
                self.line_number += 1;
                debug!(line = self.line_number, "skipping non-UTF-8 line");
                return Some(LineRecord::Skip);
            }
            Err(err) => {
                debug!(line = self.line_number, error = %err, "read failed; ending scan");
                return None;
            }
        };
        self.line_number += 1;

        if line.trim().is_empty() {
            return Some(LineRecord::Skip);
        }

        match serde_json::from_str(&line) {
            Ok(record) => Some(LineRecord::Record(record)),
            Err(err) => {
                debug!(line = self.line_number, error = %err, "skipping malformed line");
                Some(LineRecord::Skip)
            }
        }
    }
}
