//! Dropdown listings and aggregate analytics over the static dataset
//!
//! Pure functions of an immutable [`Dataset`]; the same table always yields
//! the same report.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::amenities::parse_amenity_text;
use crate::dataset::{parse_number, Dataset};
use crate::metadata::AMENITIES_FIELD;

/// Target column for every price aggregate
pub const PRICE_COLUMN: &str = "Price_in_Lakhs";
pub const SIZE_COLUMN: &str = "Size_in_SqFt";
pub const BHK_COLUMN: &str = "BHK";
pub const LOCALITY_COLUMN: &str = "Locality";
pub const SECURITY_COLUMN: &str = "Security";

/// Columns listed by [`dropdowns`], in response order
pub const DROPDOWN_COLUMNS: &[&str] = &[
    "Locality",
    "Property_Type",
    "Furnished_Status",
    "Parking_Space",
    "Facing",
    "Owner_Type",
    "Availability_Status",
    "BHK",
    "Size_in_SqFt",
    "Floor_No",
    "Total_Floors",
    "Age_of_Property",
    "Nearby_Schools",
    "Nearby_Hospitals",
    "Public_Transport_Accessibility",
];

/// Histogram upper edges (right-closed) and labels; the last bin is open-ended
pub const PRICE_BINS: &[(f64, &str)] = &[
    (25.0, "0-25"),
    (50.0, "25-50"),
    (75.0, "50-75"),
    (100.0, "75-100"),
    (150.0, "100-150"),
    (200.0, "150-200"),
    (300.0, "200-300"),
    (f64::INFINITY, "300+"),
];

pub const TOP_LOCALITIES: usize = 10;
pub const SCATTER_LIMIT: usize = 5000;

/// String-keyed map that serialises in insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// One scatter-plot point
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ScatterPoint {
    #[serde(rename = "Size_in_SqFt")]
    pub size: f64,
    #[serde(rename = "Price_in_Lakhs")]
    pub price: f64,
}

/// Aggregate report behind the analytics endpoint
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AnalyticsReport {
    pub price_distribution: OrderedMap<usize>,
    pub bhk_avg_price: OrderedMap<f64>,
    pub locality_avg_price: OrderedMap<f64>,
    pub scatter_data: Vec<ScatterPoint>,
}

/// Build every aggregate in one pass over the needed columns
pub fn analytics(dataset: &Dataset) -> AnalyticsReport {
    let prices = column_or_missing(dataset.numeric_column(PRICE_COLUMN), dataset.len());
    let sizes = column_or_missing(dataset.numeric_column(SIZE_COLUMN), dataset.len());

    AnalyticsReport {
        price_distribution: price_distribution(&prices),
        bhk_avg_price: bhk_avg_price(dataset, &prices),
        locality_avg_price: locality_avg_price(dataset, &prices),
        scatter_data: scatter(&sizes, &prices),
    }
}

fn column_or_missing(column: Option<Vec<Option<f64>>>, len: usize) -> Vec<Option<f64>> {
    column.unwrap_or_else(|| vec![None; len])
}

/// Fixed-edge histogram. Every non-missing price lands in exactly one bin.
pub fn price_distribution(prices: &[Option<f64>]) -> OrderedMap<usize> {
    let mut counts = vec![0usize; PRICE_BINS.len()];
    for price in prices.iter().flatten() {
        let bin = PRICE_BINS
            .iter()
            .position(|(upper, _)| price <= upper)
            .unwrap_or(PRICE_BINS.len() - 1);
        counts[bin] += 1;
    }
    OrderedMap(
        PRICE_BINS
            .iter()
            .zip(counts)
            .map(|((_, label), count)| (label.to_string(), count))
            .collect(),
    )
}

/// Mean price per BHK, keys ascending numerically
fn bhk_avg_price(dataset: &Dataset, prices: &[Option<f64>]) -> OrderedMap<f64> {
    let Some(bhk) = dataset.numeric_column(BHK_COLUMN) else {
        return OrderedMap::default();
    };

    let mut groups: Vec<(f64, Mean)> = Vec::new();
    for (key, price) in bhk.iter().zip(prices) {
        let (Some(key), Some(price)) = (key, price) else {
            continue;
        };
        match groups.iter_mut().find(|(k, _)| *k == *key) {
            Some((_, mean)) => mean.push(*price),
            None => groups.push((*key, Mean::of(*price))),
        }
    }
    groups.sort_by(|a, b| a.0.total_cmp(&b.0));

    OrderedMap(
        groups
            .into_iter()
            .map(|(key, mean)| (number_label(key), mean.value()))
            .collect(),
    )
}

/// Top localities by mean price, descending; ties by name
fn locality_avg_price(dataset: &Dataset, prices: &[Option<f64>]) -> OrderedMap<f64> {
    let Some(localities) = dataset.text_column(LOCALITY_COLUMN) else {
        return OrderedMap::default();
    };

    let mut groups: HashMap<&str, Mean> = HashMap::new();
    for (locality, price) in localities.iter().zip(prices) {
        if let (Some(locality), Some(price)) = (locality, price) {
            groups
                .entry(*locality)
                .and_modify(|mean| mean.push(*price))
                .or_insert_with(|| Mean::of(*price));
        }
    }

    let mut ranked: Vec<(String, f64)> = groups
        .into_iter()
        .map(|(name, mean)| (name.to_string(), mean.value()))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_LOCALITIES);
    OrderedMap(ranked)
}

fn scatter(sizes: &[Option<f64>], prices: &[Option<f64>]) -> Vec<ScatterPoint> {
    sizes
        .iter()
        .zip(prices)
        .filter_map(|(size, price)| {
            Some(ScatterPoint {
                size: (*size)?,
                price: (*price)?,
            })
        })
        .take(SCATTER_LIMIT)
        .collect()
}

/// Sorted distinct values per dropdown column, plus `Security` and amenity tokens.
///
/// A column whose every present cell is numeric lists numbers; anything else
/// lists text. Columns absent from the dataset are left out.
pub fn dropdowns(dataset: &Dataset) -> BTreeMap<String, Vec<Value>> {
    let mut out = BTreeMap::new();

    for &column in DROPDOWN_COLUMNS {
        if let Some(cells) = dataset.text_column(column) {
            out.insert(column.to_string(), distinct_values(&cells));
        }
    }

    out.insert(
        SECURITY_COLUMN.to_string(),
        vec![Value::from(0), Value::from(1)],
    );

    let amenities: BTreeSet<String> = dataset
        .text_column(AMENITIES_FIELD)
        .unwrap_or_default()
        .into_iter()
        .flatten()
        .flat_map(parse_amenity_text)
        .collect();
    out.insert(
        AMENITIES_FIELD.to_string(),
        amenities.into_iter().map(Value::from).collect(),
    );

    out
}

fn distinct_values(cells: &[Option<&str>]) -> Vec<Value> {
    let present: Vec<&str> = cells.iter().flatten().copied().collect();
    let numbers: Option<Vec<f64>> = present.iter().map(|cell| parse_number(cell)).collect();

    match numbers {
        Some(mut numbers) => {
            numbers.sort_by(f64::total_cmp);
            numbers.dedup();
            numbers.into_iter().map(number_value).collect()
        }
        None => {
            let distinct: BTreeSet<&str> = present.into_iter().collect();
            distinct.into_iter().map(Value::from).collect()
        }
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn number_label(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        (n as i64).to_string()
    } else {
        n.to_string()
    }
}

/// Running arithmetic mean
#[derive(Debug, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn of(value: f64) -> Self {
        Self {
            sum: value,
            count: 1,
        }
    }

    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        self.sum / self.count as f64
    }
}
