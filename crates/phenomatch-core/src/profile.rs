//! Reference morphology profiles and morphology agreement scoring.
//!
//! A profile file maps `"{name}_{sex}"` to a flat object holding the eight
//! index values and the seven categorical labels. Fields are read
//! individually: a field with the wrong JSON type is skipped, never fatal.

use crate::geometry::Landmark;
use crate::morphology::{self, FeatureKey, IndexKey, IndexScale, MorphologyResult};
use crate::types::Sex;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Index difference at which a large-scale index earns zero points.
pub const LARGE_INDEX_TOLERANCE: f64 = 15.0;
/// Index difference at which a small-scale index earns zero points.
pub const SMALL_INDEX_TOLERANCE: f64 = 0.15;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("failed to read profiles {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("profiles are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("profile document must be a JSON object")]
    NotAnObject,
}

/// Reference morphology for one phenotype and sex.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorphologyProfile {
    pub indices: BTreeMap<IndexKey, f64>,
    pub features: BTreeMap<FeatureKey, String>,
}

impl MorphologyProfile {
    /// Read the usable fields of one profile object.
    pub fn from_json(fields: &Map<String, Value>) -> Self {
        let indices = IndexKey::ALL
            .iter()
            .filter_map(|&key| Some((key, fields.get(key.as_str())?.as_f64()?)))
            .collect();
        let features = FeatureKey::ALL
            .iter()
            .filter_map(|&key| {
                let label = fields.get(key.as_str())?.as_str()?;
                Some((key, label.to_string()))
            })
            .collect();
        Self { indices, features }
    }

    /// Build a reference profile from an analysis of a reference portrait.
    pub fn from_result(result: &MorphologyResult) -> Self {
        let indices = IndexKey::ALL
            .iter()
            .map(|&key| (key, result.raw_indices.get(key)))
            .collect();
        let features = FeatureKey::ALL
            .iter()
            .map(|&key| (key, result.features.label(key).to_string()))
            .collect();
        Self { indices, features }
    }

    pub fn to_json(&self) -> Value {
        let mut fields = Map::new();
        for (key, value) in &self.indices {
            fields.insert(key.as_str().to_string(), Value::from(*value));
        }
        for (key, label) in &self.features {
            fields.insert(key.as_str().to_string(), Value::from(label.as_str()));
        }
        Value::Object(fields)
    }
}

/// Profile key for a phenotype name and sex, e.g. `Nordic_m`.
pub fn profile_key(name: &str, sex: Sex) -> String {
    format!("{name}_{}", sex.tag())
}

/// All reference profiles, keyed by [`profile_key`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileMap {
    profiles: HashMap<String, MorphologyProfile>,
}

impl ProfileMap {
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let text = std::fs::read_to_string(path).map_err(|e| ProfileError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&text)
    }

    /// Parse a profile document. Entries that are not objects are skipped.
    pub fn from_json_str(text: &str) -> Result<Self, ProfileError> {
        let Value::Object(doc) = serde_json::from_str::<Value>(text)? else {
            return Err(ProfileError::NotAnObject);
        };

        let mut profiles = HashMap::with_capacity(doc.len());
        for (key, value) in doc {
            match value {
                Value::Object(fields) => {
                    profiles.insert(key, MorphologyProfile::from_json(&fields));
                }
                _ => tracing::debug!(key = %key, "skipping non-object profile entry"),
            }
        }
        Ok(Self { profiles })
    }

    pub fn insert(&mut self, key: String, profile: MorphologyProfile) {
        self.profiles.insert(key, profile);
    }

    pub fn get(&self, name: &str, sex: Sex) -> Option<&MorphologyProfile> {
        self.profiles.get(&profile_key(name, sex))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Analyze reference landmark sets keyed by profile key.
    ///
    /// Sets too short to analyze are skipped with a warning.
    pub fn from_landmark_sets<I>(sets: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Landmark>)>,
    {
        let mut map = Self::default();
        for (key, landmarks) in sets {
            match morphology::analyze(&landmarks) {
                Some(result) => map.insert(key, MorphologyProfile::from_result(&result)),
                None => tracing::warn!(
                    key = %key,
                    landmarks = landmarks.len(),
                    "too few landmarks; profile skipped"
                ),
            }
        }
        map
    }

    /// Serialize as a profile document with keys in sorted order.
    pub fn to_json(&self) -> Value {
        let sorted: BTreeMap<_, _> = self.profiles.iter().collect();
        Value::Object(
            sorted
                .into_iter()
                .map(|(key, profile)| (key.clone(), profile.to_json()))
                .collect(),
        )
    }
}

/// Agreement between a user's morphology and a reference profile, 0–100.
///
/// Each index earns `max(0, 1 − |Δ| / tolerance)` points and each
/// categorical feature earns 1 on an exact label match. Only fields the
/// profile defines are counted. Returns 0 when nothing is comparable.
pub fn morphology_similarity(user: &MorphologyResult, reference: &MorphologyProfile) -> f64 {
    let mut points = 0.0;
    let mut compared = 0usize;

    for (&key, &ref_value) in &reference.indices {
        let tolerance = match key.scale() {
            IndexScale::Large => LARGE_INDEX_TOLERANCE,
            IndexScale::Small => SMALL_INDEX_TOLERANCE,
        };
        let diff = (user.raw_indices.get(key) - ref_value).abs();
        points += (1.0 - diff / tolerance).max(0.0);
        compared += 1;
    }

    for (&key, label) in &reference.features {
        if user.features.label(key) == label {
            points += 1.0;
        }
        compared += 1;
    }

    if compared == 0 {
        return 0.0;
    }
    points / compared as f64 * 100.0
}
