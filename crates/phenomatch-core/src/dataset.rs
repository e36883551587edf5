//! Reference phenotype catalog: decoding and in-memory layout.
//!
//! The dataset file is a JSON list of groups. Each group is a list whose
//! last element holds the subtype entries and whose first element, when
//! the group has more than one element, is the group's basic entry.
//! An entry is `[name, male_b64, female_b64]`, each embedding being 128
//! little-endian f32 values encoded with the standard base64 alphabet.

use crate::profile::ProfileMap;
use crate::types::{Embedding, Sex, EMBEDDING_DIM};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

const EMBEDDING_BYTES: usize = EMBEDDING_DIM * std::mem::size_of::<f32>();

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("group {index}: {reason}")]
    MalformedGroup { index: usize, reason: &'static str },
    #[error("entry {name}: invalid base64 embedding: {source}")]
    Base64 {
        name: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("entry {name}: expected {expected}-byte embedding, got {actual}")]
    EmbeddingLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Where a catalog is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSource {
    pub dataset: PathBuf,
    /// Optional morphology profile file. Failure to load it is not fatal.
    pub profiles: Option<PathBuf>,
}

impl DataSource {
    pub fn new(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            profiles: None,
        }
    }

    pub fn with_profiles(mut self, profiles: impl Into<PathBuf>) -> Self {
        self.profiles = Some(profiles.into());
        self
    }
}

/// One reference phenotype with its per-sex embeddings.
#[derive(Debug, Clone)]
pub struct PhenotypeEntry {
    pub name: String,
    pub male: Embedding,
    pub female: Embedding,
    pub group_name: String,
    pub is_basic: bool,
}

impl PhenotypeEntry {
    pub fn embedding(&self, sex: Sex) -> &Embedding {
        match sex {
            Sex::Male => &self.male,
            Sex::Female => &self.female,
        }
    }
}

type RawEntry = (String, String, String);

#[derive(Deserialize)]
#[serde(untagged)]
enum GroupItem {
    Entry(RawEntry),
    Subtypes(Vec<RawEntry>),
}

/// Counts describing a loaded catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSummary {
    pub groups: usize,
    pub basic: usize,
    pub subtypes: usize,
    pub profiles: usize,
}

/// Read-only catalog of phenotype entries plus optional reference profiles.
///
/// Built once and shared behind an `Arc`; nothing mutates it after load.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<PhenotypeEntry>,
    profiles: Option<ProfileMap>,
    groups: usize,
}

impl Catalog {
    /// Load the dataset (fatal on failure) and the profile file (non-fatal).
    pub fn load(source: &DataSource) -> Result<Self, DatasetError> {
        let text = std::fs::read_to_string(&source.dataset).map_err(|e| DatasetError::Io {
            path: source.dataset.clone(),
            source: e,
        })?;
        let mut catalog = Self::from_json_str(&text)?;

        if let Some(path) = &source.profiles {
            match ProfileMap::load(path) {
                Ok(profiles) => {
                    tracing::info!(
                        path = %path.display(),
                        count = profiles.len(),
                        "morphology profiles loaded"
                    );
                    catalog.profiles = Some(profiles);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "morphology profiles unavailable; scoring by embedding only"
                    );
                }
            }
        }

        tracing::info!(
            path = %source.dataset.display(),
            entries = catalog.entries.len(),
            groups = catalog.groups,
            "phenotype catalog loaded"
        );
        Ok(catalog)
    }

    /// Decode a dataset document, flattening groups into entries.
    pub fn from_json_str(text: &str) -> Result<Self, DatasetError> {
        let groups: Vec<Vec<GroupItem>> = serde_json::from_str(text)?;
        let mut entries = Vec::new();

        for (index, group) in groups.iter().enumerate() {
            let Some(GroupItem::Subtypes(subtypes)) = group.last() else {
                return Err(DatasetError::MalformedGroup {
                    index,
                    reason: "last element must be a list of subtype entries",
                });
            };

            let group_name = if group.len() > 1 {
                let GroupItem::Entry(basic) = &group[0] else {
                    return Err(DatasetError::MalformedGroup {
                        index,
                        reason: "first element must be the basic entry",
                    });
                };
                entries.push(decode_entry(basic, None, true)?);
                Some(basic.0.as_str())
            } else {
                None
            };

            for sub in subtypes {
                entries.push(decode_entry(sub, group_name, false)?);
            }
        }

        Ok(Self {
            entries,
            profiles: None,
            groups: groups.len(),
        })
    }

    /// Attach reference profiles, replacing any already present.
    pub fn with_profiles(mut self, profiles: ProfileMap) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn entries(&self) -> &[PhenotypeEntry] {
        &self.entries
    }

    pub fn profiles(&self) -> Option<&ProfileMap> {
        self.profiles.as_ref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> CatalogSummary {
        let basic = self.entries.iter().filter(|e| e.is_basic).count();
        CatalogSummary {
            groups: self.groups,
            basic,
            subtypes: self.entries.len() - basic,
            profiles: self.profiles.as_ref().map_or(0, ProfileMap::len),
        }
    }
}

fn decode_entry(
    raw: &RawEntry,
    group_name: Option<&str>,
    is_basic: bool,
) -> Result<PhenotypeEntry, DatasetError> {
    let (name, male, female) = raw;
    Ok(PhenotypeEntry {
        name: name.clone(),
        male: decode_embedding(name, male)?,
        female: decode_embedding(name, female)?,
        group_name: group_name.unwrap_or(name.as_str()).to_string(),
        is_basic,
    })
}

/// Decode one base64 embedding into 128 little-endian f32 values.
pub fn decode_embedding(name: &str, encoded: &str) -> Result<Embedding, DatasetError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| DatasetError::Base64 {
            name: name.to_string(),
            source: e,
        })?;

    if bytes.len() != EMBEDDING_BYTES {
        return Err(DatasetError::EmbeddingLength {
            name: name.to_string(),
            expected: EMBEDDING_BYTES,
            actual: bytes.len(),
        });
    }

    let values = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(Embedding::new(values))
}

/// Encode an embedding in the dataset's base64 layout.
pub fn encode_embedding(embedding: &Embedding) -> String {
    let bytes: Vec<u8> = embedding
        .values
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    general_purpose::STANDARD.encode(bytes)
}

/// Path of `file_name` in the dataset's directory.
pub fn sibling_profiles(dataset: &Path, file_name: &str) -> PathBuf {
    dataset
        .parent()
        .map_or_else(|| PathBuf::from(file_name), |dir| dir.join(file_name))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_embedding_bit_exact() {
        let original = fixtures::embedding(42);
        let decoded = decode_embedding("x", &encode_embedding(&original)).unwrap();
        assert_eq!(decoded.dim(), EMBEDDING_DIM);
        for (a, b) in decoded.values.iter().zip(&original.values) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_decode_embedding_little_endian_layout() {
        let mut bytes = vec![0u8; EMBEDDING_BYTES];
        // 1.0f32 = 0x3F800000, little-endian in the first slot.
        bytes[..4].copy_from_slice(&[0x00, 0x00, 0x80, 0x3F]);
        let encoded = general_purpose::STANDARD.encode(&bytes);
        let e = decode_embedding("x", &encoded).unwrap();
        assert_eq!(e.values[0], 1.0);
        assert!(e.values[1..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_decode_embedding_rejects_wrong_length() {
        let encoded = general_purpose::STANDARD.encode([0u8; 16]);
        let err = decode_embedding("Short", &encoded).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::EmbeddingLength { expected: 512, actual: 16, .. }
        ));
    }

    #[test]
    fn test_decode_embedding_rejects_bad_base64() {
        let err = decode_embedding("Bad", "not base64!").unwrap_err();
        assert!(matches!(err, DatasetError::Base64 { .. }));
    }

    #[test]
    fn test_flatten_groups() {
        let catalog = Catalog::from_json_str(&fixtures::dataset_json()).unwrap();
        let flat: Vec<_> = catalog
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.group_name.as_str(), e.is_basic))
            .collect();
        assert_eq!(
            flat,
            [
                ("Nordic", "Nordic", true),
                ("Trondelag", "Nordic", false),
                ("Faelid", "Nordic", false),
                ("Mediterranean", "Mediterranean", true),
                ("Atlantid", "Mediterranean", false),
                ("Ainuid", "Ainuid", false),
            ]
        );
    }

    #[test]
    fn test_entry_embedding_by_sex() {
        let catalog = Catalog::from_json_str(&fixtures::dataset_json()).unwrap();
        let nordic = &catalog.entries()[0];
        assert_eq!(nordic.embedding(Sex::Male), &fixtures::embedding(1));
        assert_eq!(nordic.embedding(Sex::Female), &fixtures::embedding(2));
    }

    #[test]
    fn test_summary_counts() {
        let summary = Catalog::from_json_str(&fixtures::dataset_json())
            .unwrap()
            .summary();
        assert_eq!(
            summary,
            CatalogSummary { groups: 3, basic: 2, subtypes: 4, profiles: 0 }
        );
    }

    #[test]
    fn test_group_without_subtype_list_is_rejected() {
        let json = serde_json::json!([[fixtures::entry("Lonely", 1, 2)]]).to_string();
        let err = Catalog::from_json_str(&json).unwrap_err();
        assert!(matches!(err, DatasetError::MalformedGroup { index: 0, .. }));
    }

    #[test]
    fn test_empty_group_is_rejected() {
        let err = Catalog::from_json_str("[[]]").unwrap_err();
        assert!(matches!(err, DatasetError::MalformedGroup { index: 0, .. }));
    }

    #[test]
    fn test_not_json_is_rejected() {
        assert!(matches!(
            Catalog::from_json_str("{oops").unwrap_err(),
            DatasetError::Json(_)
        ));
    }

    #[test]
    fn test_load_missing_dataset_is_io_error() {
        let err = Catalog::load(&DataSource::new("/nonexistent/list.json")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn test_load_with_missing_profiles_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("list.json");
        std::fs::write(&dataset, fixtures::dataset_json()).unwrap();

        let source = DataSource::new(&dataset).with_profiles(dir.path().join("missing.json"));
        let catalog = Catalog::load(&source).unwrap();
        assert_eq!(catalog.len(), 6);
        assert!(catalog.profiles().is_none());
    }

    #[test]
    fn test_sibling_profiles_path() {
        let p = sibling_profiles(Path::new("/data/list.json"), "morphology-profiles.json");
        assert_eq!(p, PathBuf::from("/data/morphology-profiles.json"));
    }
}
