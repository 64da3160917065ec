//! Training table preparation
//!
//! Cleans the raw housing CSV, derives the amenity columns and produces aligned
//! rows in the fixed feature order, plus the price target.

use propval_core::align::{fill_missing, AlignedRow, Cell, UNKNOWN_CATEGORY};
use propval_core::amenities::{indicator, parse_amenity_text};
use propval_core::metadata::{AMENITIES_COUNT, AMENITIES_FIELD};
use propval_core::{CandidateMetrics, Dataset, FeatureMetadata};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::deterministic::shuffled_indices;
use crate::errors::TrainerError;

/// Regression target
pub const TARGET_COLUMN: &str = "Price_in_Lakhs";

pub const CATEGORICAL_COLUMNS: &[&str] = &[
    "Locality",
    "Property_Type",
    "Furnished_Status",
    "Parking_Space",
    "Facing",
    "Owner_Type",
    "Availability_Status",
];

/// Numeric inputs read from the CSV, before the derived amenity columns
pub const BASE_NUMERIC_COLUMNS: &[&str] = &[
    "BHK",
    "Size_in_SqFt",
    "Floor_No",
    "Total_Floors",
    "Age_of_Property",
    "Nearby_Schools",
    "Nearby_Hospitals",
    "Public_Transport_Accessibility",
    "Security",
];

pub const AMENITY_FLAGS: &[&str] = &["pool", "gym", "garden", "clubhouse", "playground"];

const SECURITY_COLUMN: &str = "Security";
const TRANSPORT_COLUMN: &str = "Public_Transport_Accessibility";

/// Column layout the pipeline is fit on
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpec {
    pub categorical: Vec<String>,
    pub numeric: Vec<String>,
    pub amenity_flags: Vec<String>,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        let amenity_flags: Vec<String> = AMENITY_FLAGS.iter().map(|f| f.to_string()).collect();
        let mut numeric: Vec<String> = BASE_NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect();
        numeric.push(AMENITIES_COUNT.to_string());
        numeric.extend(amenity_flags.iter().map(|f| FeatureMetadata::flag_column(f)));

        Self {
            categorical: CATEGORICAL_COLUMNS.iter().map(|c| c.to_string()).collect(),
            numeric,
            amenity_flags,
        }
    }
}

impl FeatureSpec {
    /// Categorical block first, numeric block second
    pub fn features(&self) -> Vec<String> {
        self.categorical.iter().chain(self.numeric.iter()).cloned().collect()
    }

    /// Metadata record persisted beside the winning pipeline
    pub fn to_metadata(
        &self,
        best_model: &str,
        results: BTreeMap<String, CandidateMetrics>,
    ) -> FeatureMetadata {
        FeatureMetadata {
            best_model: best_model.to_string(),
            features: self.features(),
            categorical: self.categorical.clone(),
            numeric: self.numeric.clone(),
            amenity_flags: self.amenity_flags.clone(),
            results,
        }
    }
}

/// Aligned rows with their targets
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<AlignedRow>,
    pub targets: Vec<f64>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn select(&self, indices: &[usize]) -> Self {
        Self {
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Seeded shuffle, then hold out `test_fraction` of the rows (at least one)
    pub fn split(&self, test_fraction: f64, seed: i64) -> Result<(Self, Self), TrainerError> {
        if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
            return Err(TrainerError::Training(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        if self.len() < 2 {
            return Err(TrainerError::Dataset(format!(
                "need at least 2 rows to split, have {}",
                self.len()
            )));
        }

        let order = shuffled_indices(self.len(), seed);
        let n_test = ((self.len() as f64 * test_fraction).ceil() as usize).clamp(1, self.len() - 1);
        let (test, train) = order.split_at(n_test);
        Ok((self.select(train), self.select(test)))
    }
}

/// Clean the raw table and derive every feature column.
///
/// Rows without a usable target are dropped. Missing numeric cells take the
/// column median, missing categorical cells become `Unknown`.
pub fn prepare(dataset: &Dataset, spec: &FeatureSpec) -> Result<TrainingSet, TrainerError> {
    let targets = dataset
        .numeric_column(TARGET_COLUMN)
        .ok_or_else(|| TrainerError::Dataset(format!("missing target column '{TARGET_COLUMN}'")))?;

    let keep: Vec<usize> = targets
        .iter()
        .enumerate()
        .filter_map(|(i, t)| t.map(|_| i))
        .collect();
    let dropped = dataset.len() - keep.len();
    if dropped > 0 {
        warn!(dropped, "rows without a usable target dropped");
    }
    if keep.is_empty() {
        return Err(TrainerError::Dataset("no rows with a usable target".to_string()));
    }

    let tokens: Vec<Vec<String>> = keep
        .iter()
        .map(|&i| {
            dataset
                .cell(i, AMENITIES_FIELD)
                .map(parse_amenity_text)
                .unwrap_or_default()
        })
        .collect();

    let mut columns: BTreeMap<&str, Vec<Cell>> = BTreeMap::new();

    for name in &spec.categorical {
        let values = keep
            .iter()
            .map(|&i| {
                Cell::Text(
                    dataset
                        .cell(i, name)
                        .unwrap_or(UNKNOWN_CATEGORY)
                        .to_string(),
                )
            })
            .collect();
        columns.insert(name, values);
    }

    for name in &spec.numeric {
        let raw: Vec<Option<f64>> = if name == AMENITIES_COUNT {
            tokens.iter().map(|t| Some(t.len() as f64)).collect()
        } else if let Some(flag) = spec
            .amenity_flags
            .iter()
            .find(|flag| FeatureMetadata::flag_column(flag) == *name)
        {
            tokens.iter().map(|t| Some(f64::from(indicator(t, flag)))).collect()
        } else {
            keep.iter().map(|&i| numeric_cell(dataset, i, name)).collect()
        };

        if raw.iter().all(Option::is_none) {
            debug!(column = %name, "numeric column absent or empty, filled with 0");
        }
        columns.insert(name, fill_missing(&raw).into_iter().map(Cell::Number).collect());
    }

    let features = spec.features();
    let rows = (0..keep.len())
        .map(|r| {
            let values = features
                .iter()
                .map(|name| {
                    columns
                        .get(name.as_str())
                        .map(|column| column[r].clone())
                        .unwrap_or(Cell::Number(0.0))
                })
                .collect();
            AlignedRow::new(features.clone(), values)
                .map_err(|e| TrainerError::Dataset(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TrainingSet {
        rows,
        targets: keep.iter().filter_map(|&i| targets[i]).collect(),
    })
}

/// Cleaned numeric cell: `Security` maps Yes/No, transport truncates to an integer
fn numeric_cell(dataset: &Dataset, row: usize, column: &str) -> Option<f64> {
    let text = dataset.cell(row, column);
    match column {
        SECURITY_COLUMN => Some(match text {
            Some("Yes") => 1.0,
            Some("No") => 0.0,
            other => other
                .and_then(propval_core::dataset::parse_number)
                .filter(|n| *n == 0.0 || *n == 1.0)
                .unwrap_or(0.0),
        }),
        TRANSPORT_COLUMN => text.and_then(propval_core::dataset::parse_number).map(f64::trunc),
        _ => text.and_then(propval_core::dataset::parse_number),
    }
}
