use proptest::prelude::*;
use propval_core::align::{Cell, FeatureAligner, UNKNOWN_CATEGORY};
use propval_core::FeatureMetadata;
use serde_json::{json, Map, Value};

// Property-based tests for single-row feature alignment
// Any record must align to the full feature list without raising

const CATEGORICAL: &[&str] = &["Locality", "Property_Type", "Facing"];
const NUMERIC: &[&str] = &["BHK", "Size_in_SqFt", "Floor_No", "Security"];
const FLAGS: &[&str] = &["pool", "gym", "garden", "clubhouse", "playground"];

fn metadata() -> FeatureMetadata {
    let mut numeric: Vec<String> = NUMERIC.iter().map(|s| s.to_string()).collect();
    numeric.push("Amenities_count".to_string());
    numeric.extend(FLAGS.iter().map(|f| format!("has_{f}")));

    let categorical: Vec<String> = CATEGORICAL.iter().map(|s| s.to_string()).collect();
    let features = categorical.iter().chain(numeric.iter()).cloned().collect();

    FeatureMetadata {
        best_model: "GradientBoosting".to_string(),
        features,
        categorical,
        numeric,
        amenity_flags: FLAGS.iter().map(|s| s.to_string()).collect(),
        results: Default::default(),
    }
}

fn arbitrary_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(Value::from),
        "[ a-zA-Z0-9.,-]{0,12}".prop_map(Value::from),
    ]
}

fn arbitrary_field_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        4 => arbitrary_scalar(),
        1 => prop::collection::vec(arbitrary_scalar(), 0..4).prop_map(Value::from),
    ]
}

fn known_key() -> impl Strategy<Value = String> {
    let keys: Vec<String> = CATEGORICAL
        .iter()
        .chain(NUMERIC.iter())
        .map(|s| s.to_string())
        .chain(["Amenities".to_string(), "Colour".to_string()])
        .collect();
    prop::sample::select(keys)
}

fn arbitrary_record() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(known_key(), arbitrary_field_value(), 0..8)
        .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<_, _>>()))
}

fn amenity_tokens() -> impl Strategy<Value = Vec<String>> {
    let vocabulary: Vec<String> = FLAGS
        .iter()
        .map(|s| s.to_string())
        .chain(["lift".to_string(), "Power Backup".to_string()])
        .collect();
    prop::collection::vec(
        (prop::sample::select(vocabulary), any::<bool>(), " {0,2}")
            .prop_map(|(token, upper, pad)| {
                let token = if upper { token.to_uppercase() } else { token };
                format!("{pad}{token}{pad}")
            }),
        0..6,
    )
}

proptest! {
    #[test]
    fn aligned_row_always_matches_feature_order(record in arbitrary_record()) {
        let meta = metadata();
        let row = FeatureAligner::new(&meta).align_json(&record).unwrap();

        prop_assert_eq!(row.columns(), meta.features.as_slice());
        prop_assert_eq!(row.len(), meta.features.len());
    }

    #[test]
    fn numeric_columns_are_always_finite_numbers(record in arbitrary_record()) {
        let meta = metadata();
        let row = FeatureAligner::new(&meta).align_json(&record).unwrap();

        for name in &meta.numeric {
            let value = row.get(name).and_then(Cell::as_number);
            prop_assert!(value.map_or(false, f64::is_finite), "{} = {:?}", name, value);
        }
        for name in &meta.categorical {
            prop_assert!(row.get(name).and_then(Cell::as_text).is_some());
        }
    }

    #[test]
    fn amenity_text_and_list_agree(tokens in amenity_tokens()) {
        let meta = metadata();
        let aligner = FeatureAligner::new(&meta);

        let as_text = aligner.align_json(&json!({"Amenities": tokens.join(",")})).unwrap();
        let as_list = aligner.align_json(&json!({"Amenities": tokens})).unwrap();

        prop_assert_eq!(as_text.get("Amenities_count"), as_list.get("Amenities_count"));
        for flag in FLAGS {
            let column = format!("has_{flag}");
            prop_assert_eq!(as_text.get(&column), as_list.get(&column));
        }
    }

    #[test]
    fn unparseable_numeric_fails_open(text in "[a-zA-Z ]{1,10}") {
        let meta = metadata();
        let row = FeatureAligner::new(&meta)
            .align_json(&json!({"Size_in_SqFt": text}))
            .unwrap();
        prop_assert_eq!(row.get("Size_in_SqFt"), Some(&Cell::Number(0.0)));
    }

    #[test]
    fn absent_categorical_is_unknown(record in arbitrary_record()) {
        let meta = metadata();
        let row = FeatureAligner::new(&meta).align_json(&record).unwrap();

        for name in CATEGORICAL {
            if record.get(*name).map_or(true, Value::is_null) {
                prop_assert_eq!(
                    row.get(name).and_then(Cell::as_text),
                    Some(UNKNOWN_CATEGORY)
                );
            }
        }
    }

    #[test]
    fn alignment_is_deterministic(record in arbitrary_record()) {
        let meta = metadata();
        let aligner = FeatureAligner::new(&meta);
        prop_assert_eq!(
            aligner.align_json(&record).unwrap(),
            aligner.align_json(&record).unwrap()
        );
    }
}

proptest! {
    #[test]
    fn non_mapping_input_is_rejected(value in arbitrary_field_value()) {
        let meta = metadata();
        let err = FeatureAligner::new(&meta).align_json(&value).unwrap_err();
        prop_assert!(err.is_client_error());
    }
}
