//! Static tabular dataset read from CSV
//!
//! Cells are kept as text and coerced per column on demand. Empty cells and the
//! usual missing-value spellings read as missing.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("Dataset has no header row")]
    MissingHeader,

    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),
}

const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

/// In-memory table with a header row
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    headers: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    /// Read a CSV file with a header row
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;
        Self::from_csv_reader(reader)
    }

    /// Read CSV text from any reader
    pub fn from_reader<R: Read>(input: R) -> Result<Self, DatasetError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DatasetError> {
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() || headers.iter().all(String::is_empty) {
            return Err(DatasetError::MissingHeader);
        }

        let mut index = HashMap::with_capacity(headers.len());
        for (i, name) in headers.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(DatasetError::DuplicateColumn(name.clone()));
            }
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let row = (0..headers.len())
                .map(|i| record.get(i).and_then(normalize_cell))
                .collect();
            rows.push(row);
        }

        Ok(Self {
            headers,
            index,
            rows,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Raw text of one cell
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = *self.index.get(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Column as text; `None` when the column does not exist
    pub fn text_column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let col = *self.index.get(name)?;
        Some(self.rows.iter().map(|row| row[col].as_deref()).collect())
    }

    /// Column coerced to numbers; unparseable cells read as missing
    pub fn numeric_column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let col = *self.index.get(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[col].as_deref().and_then(parse_number))
                .collect(),
        )
    }
}

fn normalize_cell(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if MISSING_MARKERS.contains(&lowered.as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Parse a finite number
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}
