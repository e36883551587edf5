//! phenomatch-core — facial morphology analysis and phenotype matching.
//!
//! Classifies a 468-point face mesh into anthropometric indices and shape
//! categories, and ranks a reference phenotype catalog against an identity
//! embedding with optional morphology blending.

pub mod dataset;
pub mod geometry;
pub mod matcher;
pub mod morphology;
pub mod profile;
pub mod resources;
pub mod types;

pub use dataset::{Catalog, DataSource, DatasetError, PhenotypeEntry};
pub use geometry::{Landmark, LANDMARK_COUNT};
pub use matcher::{HybridMatcher, MatchError, MatchQuery, Matcher, DEFAULT_TOP_N};
pub use morphology::{analyze as analyze_morphology, MorphologyResult};
pub use profile::{MorphologyProfile, ProfileMap};
pub use types::{Embedding, MatchResult, Sex, EMBEDDING_DIM};
