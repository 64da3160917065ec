//! Single-row feature alignment
//!
//! Reshapes an arbitrary caller record into exactly the column set, order and
//! types the trained pipeline expects. Alignment is total: missing fields,
//! unparseable numbers and malformed amenity values are absorbed by defaults.
//! The only rejected input is a payload that is not a mapping at all.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::amenities::{indicator, parse_amenities};
use crate::errors::{CoreError, Result};
use crate::metadata::{FeatureMetadata, AMENITIES_COUNT, AMENITIES_FIELD};
use crate::record::{RawRecord, RawValue};

/// Fill value for missing categorical entries
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// One aligned cell
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            Cell::Number(_) => None,
        }
    }
}

/// A single row whose columns match the feature list exactly, in order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    columns: Vec<String>,
    values: Vec<Cell>,
}

impl AlignedRow {
    /// Pair column names with values; the two must have equal length
    pub fn new(columns: Vec<String>, values: Vec<Cell>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(CoreError::Inference(format!(
                "row has {} columns but {} values",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Working-table slot while a row is being aligned
#[derive(Debug, Clone)]
enum Slot {
    /// Value as supplied by the caller
    Raw(RawValue),
    /// Inserted because an expected feature was absent
    Defaulted,
    Number(f64),
    Text(String),
}

/// Aligns raw records against a metadata record
#[derive(Debug, Clone, Copy)]
pub struct FeatureAligner<'a> {
    metadata: &'a FeatureMetadata,
}

impl<'a> FeatureAligner<'a> {
    pub fn new(metadata: &'a FeatureMetadata) -> Self {
        Self { metadata }
    }

    /// Validate that `value` is a mapping, then align it
    pub fn align_json(&self, value: &Value) -> Result<AlignedRow> {
        let record = RawRecord::from_json(value)?;
        Ok(self.align(&record))
    }

    /// Align a record. Never fails.
    pub fn align(&self, record: &RawRecord) -> AlignedRow {
        let meta = self.metadata;

        let tokens = parse_amenities(record.get(AMENITIES_FIELD));
        let flag_columns: Vec<(String, u8)> = meta
            .amenity_flags
            .iter()
            .map(|flag| (FeatureMetadata::flag_column(flag), indicator(&tokens, flag)))
            .collect();

        // Seed from whatever the caller supplied
        let mut table: HashMap<&str, Slot> = HashMap::with_capacity(meta.features.len());
        for name in meta
            .features
            .iter()
            .chain(meta.numeric.iter())
            .chain(meta.categorical.iter())
        {
            if let Some(value) = record.get(name) {
                table.insert(name, Slot::Raw(value.clone()));
            }
        }

        for name in &meta.features {
            table.entry(name).or_insert(Slot::Defaulted);
        }

        // Derived amenity columns always replace caller-supplied values
        table.insert(AMENITIES_COUNT, Slot::Number(tokens.len() as f64));
        for (column, hit) in &flag_columns {
            table.insert(column.as_str(), Slot::Number(f64::from(*hit)));
        }

        for name in &meta.numeric {
            let coerced = match table.get(name.as_str()) {
                Some(Slot::Raw(value)) => value.to_number(),
                Some(Slot::Number(n)) => Some(*n),
                Some(Slot::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
                Some(Slot::Defaulted) => Some(0.0),
                None => None,
            };
            let filled = fill_missing(&[coerced])[0];
            table.insert(name, Slot::Number(filled));
        }

        for name in &meta.categorical {
            let text = match table.get(name.as_str()) {
                Some(Slot::Raw(value)) => value.to_text(),
                Some(Slot::Number(n)) => Some(RawValue::Float(*n).to_string()),
                Some(Slot::Text(s)) => Some(s.clone()),
                Some(Slot::Defaulted) | None => None,
            };
            let text = text.unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            table.insert(name, Slot::Text(text));
        }

        // Stragglers only appear with a feature list the partition does not cover
        for name in &meta.features {
            table.entry(name).or_insert(Slot::Defaulted);
        }

        let values = meta
            .features
            .iter()
            .map(|name| match table.remove(name.as_str()) {
                Some(slot) => slot_to_cell(slot),
                None => Cell::Number(0.0),
            })
            .collect();

        AlignedRow {
            columns: meta.features.clone(),
            values,
        }
    }
}

/// Cell for a column outside both partitions keeps the caller's native type
fn slot_to_cell(slot: Slot) -> Cell {
    match slot {
        Slot::Number(n) => Cell::Number(n),
        Slot::Text(s) => Cell::Text(s),
        Slot::Defaulted => Cell::Number(0.0),
        Slot::Raw(RawValue::Text(s)) => Cell::Text(s),
        Slot::Raw(value @ RawValue::List(_)) => Cell::Text(value.to_string()),
        Slot::Raw(value) => Cell::Number(value.to_number().unwrap_or(0.0)),
    }
}

/// Median-fill a numeric column.
///
/// An all-missing column fills with `0`; otherwise missing entries take the
/// median of the present ones. On a single row this degenerates to the value
/// itself, or `0` when it is missing.
pub fn fill_missing(column: &[Option<f64>]) -> Vec<f64> {
    let mut present: Vec<f64> = column.iter().flatten().copied().collect();
    let fill = median(&mut present).unwrap_or(0.0);
    column.iter().map(|v| v.unwrap_or(fill)).collect()
}

/// Median of a slice (sorted in place); `None` when empty
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
