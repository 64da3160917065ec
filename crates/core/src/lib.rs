//! Property price serving core
//!
//! Turns loosely-typed caller records into model-ready rows and scores them
//! against a fitted pipeline, with the metadata, pipeline and reporting
//! dataset held in one atomically swappable serving context.
//!
//! Modules:
//! - `metadata`: Feature contract written by training, read at startup
//! - `record`: Raw caller input as a tagged value union
//! - `amenities`: Amenity token parsing shared by every consumer
//! - `align`: Single-row feature alignment with lenient defaulting
//! - `ensemble`: Integer-only tree ensemble evaluator
//! - `pipeline`: Preprocessor + ensemble artifact and the scoring trait
//! - `canonical`: Canonical JSON and BLAKE3 digests
//! - `dataset`: CSV table behind the reporting endpoints
//! - `reporting`: Dropdown listings and analytics
//! - `context`: Serving context, prediction, comparison and reload

pub mod align;
pub mod amenities;
pub mod canonical;
pub mod context;
pub mod dataset;
pub mod ensemble;
pub mod errors;
pub mod metadata;
pub mod pipeline;
pub mod record;
pub mod reporting;

pub use align::{AlignedRow, Cell, FeatureAligner, UNKNOWN_CATEGORY};
pub use context::{ArtifactPaths, Comparison, ContextHandle, Higher, ServingContext};
pub use dataset::{Dataset, DatasetError};
pub use ensemble::{ModelError, TreeEnsemble, SCALE};
pub use errors::{CoreError, Result};
pub use metadata::{CandidateMetrics, FeatureMetadata};
pub use pipeline::{PipelineArtifact, Preprocessor, PricePipeline};
pub use record::{RawRecord, RawValue};
pub use reporting::{analytics, dropdowns, AnalyticsReport};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
