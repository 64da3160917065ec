//! End-to-end training: CSV in, servable artifacts out

use anyhow::Result;
use propval_core::{ArtifactPaths, ContextHandle};
use propval_trainer::{train_from_csv, BoostingConfig, ForestConfig, TrainingParams};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const LOCALITIES: &[(&str, f64)] = &[("Dwarka", 10.0), ("Rohini", 0.0), ("Saket", 60.0), ("Vasant Kunj", 45.0)];
const AMENITIES: &[&str] = &["Pool, Gym", "Garden", "", "clubhouse,playground,gym", "Lift"];

/// Synthetic housing table with a learnable price
fn create_synthetic_dataset() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        "Locality,Property_Type,BHK,Size_in_SqFt,Floor_No,Total_Floors,Age_of_Property,\
         Furnished_Status,Parking_Space,Facing,Nearby_Schools,Nearby_Hospitals,\
         Public_Transport_Accessibility,Security,Owner_Type,Availability_Status,Amenities,Price_in_Lakhs"
    )?;

    for i in 0..120usize {
        let (locality, premium) = LOCALITIES[i % LOCALITIES.len()];
        let bhk = 1 + i % 4;
        let size = 450 + (i * 53) % 1800;
        let amenities = AMENITIES[i % AMENITIES.len()];
        let security = if i % 2 == 0 { "Yes" } else { "No" };
        let price = size as f64 * 0.06 + bhk as f64 * 5.0 + premium;
        writeln!(
            file,
            "{locality},Apartment,{bhk},{size},{},{},{},Furnished,1,North,{},{},{},{security},Owner,Ready,\"{amenities}\",{price:.2}",
            i % 10,
            10 + i % 5,
            i % 20,
            i % 6,
            i % 4,
            1 + i % 5,
        )?;
    }
    // Unusable target row is dropped, not fatal
    writeln!(file, "Dwarka,Apartment,2,900,1,10,3,Furnished,1,North,2,2,3,Yes,Owner,Ready,,")?;

    file.flush()?;
    Ok(file)
}

fn small_params() -> TrainingParams {
    TrainingParams {
        boosting: BoostingConfig {
            num_trees: 40,
            max_depth: 4,
            min_samples_leaf: 2,
            ..BoostingConfig::default()
        },
        forest: ForestConfig {
            num_trees: 12,
            max_depth: 8,
            min_samples_leaf: 1,
            quant_step: 1000,
        },
        ..TrainingParams::default()
    }
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let file = create_synthetic_dataset()?;

    let first = train_from_csv(file.path(), small_params())?;
    let second = train_from_csv(file.path(), small_params())?;

    assert_eq!(first.metadata, second.metadata, "Metadata should be identical");
    assert_eq!(
        first.artifact.hash_hex()?,
        second.artifact.hash_hex()?,
        "Artifact digest should be identical"
    );
    Ok(())
}

#[test]
fn test_trained_artifacts_are_servable() -> Result<()> {
    let file = create_synthetic_dataset()?;
    let outcome = train_from_csv(file.path(), small_params())?;

    let dir = tempfile::tempdir()?;
    let persisted = outcome.persist(dir.path())?;
    assert!(dir.path().join("best_model.hash").exists());

    let meta: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&persisted.metadata_path)?)?;
    assert_eq!(meta["best_model"], json!(outcome.ranking[0].name));
    assert_eq!(meta["amenity_flags"], json!(["pool", "gym", "garden", "clubhouse", "playground"]));
    assert_eq!(meta["features"].as_array().map(Vec::len), Some(22));
    assert!(meta["results"][&outcome.ranking[0].name]["Test_R2"].is_f64());

    let handle = ContextHandle::open(ArtifactPaths::new(&persisted.model_path, &persisted.metadata_path))?;
    let cheap = handle.predict_price(&json!({"Locality": "Rohini", "BHK": 1, "Size_in_SqFt": 500}))?;
    let pricey = handle.predict_price(&json!({
        "Locality": "Saket",
        "BHK": "4",
        "Size_in_SqFt": 2200,
        "Amenities": ["Pool", "Gym"]
    }))?;

    assert!(cheap.is_finite() && pricey.is_finite());
    assert!(pricey > cheap, "expected {pricey} > {cheap}");
    Ok(())
}
