//! Catalog ranking by blended embedding and morphology similarity.

use crate::dataset::Catalog;
use crate::morphology::MorphologyResult;
use crate::profile::{morphology_similarity, MorphologyProfile};
use crate::types::{Embedding, MatchResult, Sex, EMBEDDING_DIM};
use thiserror::Error;

/// Number of results returned when the caller does not ask for a count.
pub const DEFAULT_TOP_N: usize = 25;
/// Weight of the embedding score in a blended score.
pub const EMBEDDING_WEIGHT: f64 = 0.9;
/// Weight of the morphology score in a blended score.
pub const MORPHOLOGY_WEIGHT: f64 = 0.1;

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("expected {expected}-dim embedding, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One ranking request.
#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub embedding: Embedding,
    pub sex: Sex,
    pub top_n: usize,
    pub morphology: Option<MorphologyResult>,
}

impl MatchQuery {
    pub fn new(embedding: impl Into<Embedding>, sex: Sex) -> Self {
        Self {
            embedding: embedding.into(),
            sex,
            top_n: DEFAULT_TOP_N,
            morphology: None,
        }
    }

    pub fn top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn morphology(mut self, morphology: Option<MorphologyResult>) -> Self {
        self.morphology = morphology;
        self
    }
}

/// Strategy for ranking a catalog against a query.
pub trait Matcher {
    fn rank(&self, catalog: &Catalog, query: &MatchQuery) -> Vec<MatchResult>;
}

/// Cosine similarity ranking, blended with morphology agreement for
/// entries that have a reference profile.
///
/// Every catalog entry is scored on every call; nothing is pre-filtered.
pub struct HybridMatcher;

impl HybridMatcher {
    /// Score of a single entry against the query.
    pub fn score(
        embedding_score: f64,
        morphology: Option<&MorphologyResult>,
        profile: Option<&MorphologyProfile>,
    ) -> f64 {
        match (morphology, profile) {
            (Some(user), Some(reference)) => {
                let morph_score = morphology_similarity(user, reference);
                embedding_score * EMBEDDING_WEIGHT + morph_score * MORPHOLOGY_WEIGHT
            }
            _ => embedding_score,
        }
    }
}

impl Matcher for HybridMatcher {
    fn rank(&self, catalog: &Catalog, query: &MatchQuery) -> Vec<MatchResult> {
        let profiles = catalog.profiles();
        let morphology = query.morphology.as_ref();

        let mut results: Vec<MatchResult> = catalog
            .entries()
            .iter()
            .map(|entry| {
                let embedding_score =
                    entry.embedding(query.sex).similarity(&query.embedding) * 100.0;
                let profile = profiles.and_then(|p| p.get(&entry.name, query.sex));
                MatchResult {
                    name: entry.name.clone(),
                    score: Self::score(embedding_score, morphology, profile),
                    group_name: entry.group_name.clone(),
                    is_basic: entry.is_basic,
                    sex: query.sex,
                }
            })
            .collect();

        // Stable: equal scores keep catalog order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(query.top_n);
        results
    }
}

impl Catalog {
    /// Rank the catalog with [`HybridMatcher`].
    pub fn match_phenotypes(&self, query: &MatchQuery) -> Result<Vec<MatchResult>, MatchError> {
        if query.embedding.dim() != EMBEDDING_DIM {
            return Err(MatchError::DimensionMismatch {
                expected: EMBEDDING_DIM,
                actual: query.embedding.dim(),
            });
        }
        let results = HybridMatcher.rank(self, query);
        tracing::debug!(
            sex = %query.sex,
            top_n = query.top_n,
            hybrid = query.morphology.is_some() && self.profiles().is_some(),
            returned = results.len(),
            "catalog ranked"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures;
    use crate::morphology::{self, IndexKey};
    use crate::profile::{profile_key, ProfileMap};
    use rand::Rng;

    fn catalog() -> Catalog {
        Catalog::from_json_str(&fixtures::dataset_json()).unwrap()
    }

    fn user_morphology() -> MorphologyResult {
        morphology::analyze(&morphology::fixtures::frontal_face()).unwrap()
    }

    fn random_embedding(rng: &mut impl Rng) -> Embedding {
        Embedding::new((0..EMBEDDING_DIM).map(|_| rng.gen_range(-1.0..1.0)).collect())
    }

    #[test]
    fn test_own_embedding_ranks_first() {
        let query = MatchQuery::new(fixtures::embedding(1), Sex::Male);
        let results = catalog().match_phenotypes(&query).unwrap();
        assert_eq!(results[0].name, "Nordic");
        assert!((results[0].score - 100.0).abs() < 1e-6);
        assert!(results[0].is_basic);
        assert_eq!(results[0].sex, Sex::Male);
    }

    #[test]
    fn test_sex_selects_embedding() {
        // Nordic's female embedding, queried as female.
        let query = MatchQuery::new(fixtures::embedding(2), Sex::Female);
        let results = catalog().match_phenotypes(&query).unwrap();
        assert_eq!(results[0].name, "Nordic");
        assert_eq!(results[0].sex, Sex::Female);
    }

    #[test]
    fn test_every_entry_scored_and_sorted() {
        let mut rng = rand::thread_rng();
        let c = catalog();
        for _ in 0..20 {
            let query = MatchQuery::new(random_embedding(&mut rng), Sex::Female);
            let results = c.match_phenotypes(&query).unwrap();
            assert_eq!(results.len(), c.len());
            assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn test_truncates_to_top_n() {
        let c = catalog();
        for top_n in [0, 1, 3, 6, 25] {
            let query = MatchQuery::new(fixtures::embedding(3), Sex::Male).top_n(top_n);
            let results = c.match_phenotypes(&query).unwrap();
            assert_eq!(results.len(), top_n.min(c.len()));
        }
    }

    #[test]
    fn test_idempotent() {
        let mut profiles = ProfileMap::default();
        for entry in catalog().entries() {
            let mut profile = MorphologyProfile::from_result(&user_morphology());
            profile.indices.insert(IndexKey::FacialIndex, 110.0);
            profiles.insert(profile_key(&entry.name, Sex::Male), profile);
        }
        let c = catalog().with_profiles(profiles);

        let mut rng = rand::thread_rng();
        let query = MatchQuery::new(random_embedding(&mut rng), Sex::Male)
            .morphology(Some(user_morphology()));
        assert_eq!(c.match_phenotypes(&query).unwrap(), c.match_phenotypes(&query).unwrap());
    }

    #[test]
    fn test_equal_scores_keep_catalog_order() {
        let zero = Embedding::new(vec![0.0; EMBEDDING_DIM]);
        let results = catalog()
            .match_phenotypes(&MatchQuery::new(zero, Sex::Male))
            .unwrap();
        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            ["Nordic", "Trondelag", "Faelid", "Mediterranean", "Atlantid", "Ainuid"]
        );
        assert!(results.iter().all(|r| r.score == 0.0));
    }

    #[test]
    fn test_blended_score_is_exact() {
        let user = user_morphology();
        let mut profile = MorphologyProfile::from_result(&user);
        // Partial agreement: facialIndex off by 7.5 and a mismatched face shape.
        profile.indices.insert(IndexKey::FacialIndex, 102.5);
        profile
            .features
            .insert(morphology::FeatureKey::FaceShape, "oval".to_string());

        let mut profiles = ProfileMap::default();
        profiles.insert(profile_key("Trondelag", Sex::Male), profile.clone());
        let c = catalog().with_profiles(profiles);

        let target = fixtures::embedding(1);
        let query = MatchQuery::new(target.clone(), Sex::Male).morphology(Some(user.clone()));
        let results = c.match_phenotypes(&query).unwrap();
        let trondelag = results.iter().find(|r| r.name == "Trondelag").unwrap();

        let embedding_score = fixtures::embedding(3).similarity(&target) * 100.0;
        let morph_score = morphology_similarity(&user, &profile);
        assert!(morph_score > 0.0 && morph_score < 100.0);
        assert_eq!(trondelag.score, embedding_score * 0.9 + morph_score * 0.1);
        let (lo, hi) = (embedding_score.min(morph_score), embedding_score.max(morph_score));
        assert!(trondelag.score > lo && trondelag.score < hi);
    }

    #[test]
    fn test_missing_profile_keeps_embedding_score() {
        let mut profiles = ProfileMap::default();
        profiles.insert(
            profile_key("Trondelag", Sex::Male),
            MorphologyProfile::from_result(&user_morphology()),
        );
        let c = catalog().with_profiles(profiles);

        let target = fixtures::embedding(7);
        let query = MatchQuery::new(target.clone(), Sex::Male).morphology(Some(user_morphology()));
        let results = c.match_phenotypes(&query).unwrap();

        // No "Atlantid_m" profile.
        let atlantid = results.iter().find(|r| r.name == "Atlantid").unwrap();
        assert_eq!(atlantid.score, fixtures::embedding(9).similarity(&target) * 100.0);
    }

    #[test]
    fn test_without_user_morphology_profiles_are_ignored() {
        let mut profiles = ProfileMap::default();
        profiles.insert(
            profile_key("Nordic", Sex::Male),
            MorphologyProfile::from_result(&user_morphology()),
        );
        let c = catalog().with_profiles(profiles);
        let target = fixtures::embedding(5);
        let results = c.match_phenotypes(&MatchQuery::new(target.clone(), Sex::Male)).unwrap();
        let nordic = results.iter().find(|r| r.name == "Nordic").unwrap();
        assert_eq!(nordic.score, fixtures::embedding(1).similarity(&target) * 100.0);
    }

    #[test]
    fn test_profile_for_other_sex_is_not_used() {
        let mut profiles = ProfileMap::default();
        profiles.insert(
            profile_key("Nordic", Sex::Female),
            MorphologyProfile::from_result(&user_morphology()),
        );
        let c = catalog().with_profiles(profiles);
        let target = fixtures::embedding(5);
        let query = MatchQuery::new(target.clone(), Sex::Male).morphology(Some(user_morphology()));
        let results = c.match_phenotypes(&query).unwrap();
        let nordic = results.iter().find(|r| r.name == "Nordic").unwrap();
        assert_eq!(nordic.score, fixtures::embedding(1).similarity(&target) * 100.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let query = MatchQuery::new(vec![1.0; 64], Sex::Male);
        assert!(matches!(
            catalog().match_phenotypes(&query),
            Err(MatchError::DimensionMismatch { actual: 64, .. })
        ));
    }

    #[test]
    fn test_empty_catalog_returns_empty() {
        let query = MatchQuery::new(fixtures::embedding(1), Sex::Male);
        assert!(Catalog::default().match_phenotypes(&query).unwrap().is_empty());
    }
}
