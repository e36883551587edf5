//! Facial morphology analysis over a 468-point face mesh.
//!
//! Derives raw distances from fixed landmark pairs, turns them into
//! anthropometric indices, and classifies seven facial regions with the
//! ordered tables in [`rules`].

/// Closed enum with a canonical string label per variant.
macro_rules! labelled {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $label:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

pub mod features;
pub mod rules;

use crate::geometry::{distance, Landmark, LANDMARK_COUNT};
use features::{Feature, Features, IndexClass, LipFeature};
use rules::{EyeOpening, FaceOutline};
use serde::Serialize;

labelled! {
    /// Names of the eight anthropometric indices, as used in profile files.
    pub enum IndexKey {
        FacialIndex => "facialIndex",
        NasalIndex => "nasalIndex",
        MouthFaceRatio => "mouthFaceRatio",
        InterocularRatio => "interocularRatio",
        EyeAspectRatio => "eyeAspectRatio",
        LipFullnessRatio => "lipFullnessRatio",
        JawFaceRatio => "jawFaceRatio",
        ForeheadRatio => "foreheadRatio",
    }
}

labelled! {
    /// Names of the seven categorical features, as used in profile files.
    pub enum FeatureKey {
        FaceShape => "faceShape",
        NoseType => "noseType",
        EyeShape => "eyeShape",
        LipType => "lipType",
        JawType => "jawType",
        ForeheadType => "foreheadType",
        CheekboneType => "cheekboneType",
    }
}

/// Magnitude class of an index, which sets its comparison tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexScale {
    /// Percentage-style indices (tens of units).
    Large,
    /// Unitless ratios well below 1.
    Small,
}

impl IndexKey {
    pub const fn scale(self) -> IndexScale {
        match self {
            IndexKey::EyeAspectRatio | IndexKey::LipFullnessRatio => IndexScale::Small,
            _ => IndexScale::Large,
        }
    }
}

// Landmark pairs (MediaPipe face-mesh numbering).
const FACE_WIDTH: (usize, usize) = (234, 454);
const FACE_HEIGHT: (usize, usize) = (10, 152);
const JAW_WIDTH: (usize, usize) = (172, 397);
const CHEEKBONE_WIDTH: (usize, usize) = (123, 352);
const FOREHEAD_WIDTH: (usize, usize) = (71, 301);
const NOSE_WIDTH: (usize, usize) = (48, 278);
const NOSE_LENGTH: (usize, usize) = (6, 2);
const EYE_WIDTH_LEFT: (usize, usize) = (33, 133);
const EYE_WIDTH_RIGHT: (usize, usize) = (362, 263);
const EYE_HEIGHT_LEFT: (usize, usize) = (159, 145);
const EYE_HEIGHT_RIGHT: (usize, usize) = (386, 374);
const INTEROCULAR: (usize, usize) = (133, 362);
const LIP_WIDTH: (usize, usize) = (61, 291);
const UPPER_LIP: (usize, usize) = (0, 13);
const LOWER_LIP: (usize, usize) = (14, 17);
const FOREHEAD_HEIGHT: (usize, usize) = (10, 6);
// Inner eye corner vs. the lid point just below it, per side.
const INNER_CORNER_LEFT: (usize, usize) = (133, 155);
const INNER_CORNER_RIGHT: (usize, usize) = (362, 382);

/// Raw distances in normalized landmark units.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    pub face_width: f64,
    pub face_height: f64,
    pub jaw_width: f64,
    pub cheekbone_width: f64,
    pub forehead_width: f64,
    pub nose_width: f64,
    pub nose_length: f64,
    pub avg_eye_width: f64,
    pub avg_eye_height: f64,
    pub interocular_dist: f64,
    pub lip_width: f64,
    pub upper_lip_height: f64,
    pub lower_lip_height: f64,
    pub total_lip_height: f64,
    pub forehead_height: f64,
}

/// The eight anthropometric indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIndices {
    pub facial_index: f64,
    pub nasal_index: f64,
    pub mouth_face_ratio: f64,
    pub interocular_ratio: f64,
    pub eye_aspect_ratio: f64,
    pub lip_fullness_ratio: f64,
    pub jaw_face_ratio: f64,
    pub forehead_ratio: f64,
}

impl RawIndices {
    pub fn get(&self, key: IndexKey) -> f64 {
        match key {
            IndexKey::FacialIndex => self.facial_index,
            IndexKey::NasalIndex => self.nasal_index,
            IndexKey::MouthFaceRatio => self.mouth_face_ratio,
            IndexKey::InterocularRatio => self.interocular_ratio,
            IndexKey::EyeAspectRatio => self.eye_aspect_ratio,
            IndexKey::LipFullnessRatio => self.lip_fullness_ratio,
            IndexKey::JawFaceRatio => self.jaw_face_ratio,
            IndexKey::ForeheadRatio => self.forehead_ratio,
        }
    }
}

/// An index value with its descriptive bucket, for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DescribedIndex {
    pub value: f64,
    pub class: IndexClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indices {
    pub facial_index: DescribedIndex,
    pub nasal_index: DescribedIndex,
    pub mouth_face_ratio: DescribedIndex,
    pub interocular_ratio: DescribedIndex,
}

/// Output of one morphology analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MorphologyResult {
    pub raw_indices: RawIndices,
    pub measurements: Measurements,
    pub indices: Indices,
    pub features: Features,
}

/// Analyze a face-mesh landmark set.
///
/// Returns `None` when fewer than 468 landmarks are supplied. No other
/// validation is performed; degenerate geometry yields non-finite indices.
pub fn analyze(landmarks: &[Landmark]) -> Option<MorphologyResult> {
    if landmarks.len() < LANDMARK_COUNT {
        tracing::debug!(count = landmarks.len(), "too few landmarks for morphology analysis");
        return None;
    }

    let d = |(i, j): (usize, usize)| distance(landmarks, i, j);

    let upper_lip_height = d(UPPER_LIP);
    let lower_lip_height = d(LOWER_LIP);
    let m = Measurements {
        face_width: d(FACE_WIDTH),
        face_height: d(FACE_HEIGHT),
        jaw_width: d(JAW_WIDTH),
        cheekbone_width: d(CHEEKBONE_WIDTH),
        forehead_width: d(FOREHEAD_WIDTH),
        nose_width: d(NOSE_WIDTH),
        nose_length: d(NOSE_LENGTH),
        avg_eye_width: (d(EYE_WIDTH_LEFT) + d(EYE_WIDTH_RIGHT)) / 2.0,
        avg_eye_height: (d(EYE_HEIGHT_LEFT) + d(EYE_HEIGHT_RIGHT)) / 2.0,
        interocular_dist: d(INTEROCULAR),
        lip_width: d(LIP_WIDTH),
        upper_lip_height,
        lower_lip_height,
        total_lip_height: upper_lip_height + lower_lip_height,
        forehead_height: d(FOREHEAD_HEIGHT),
    };

    let raw = RawIndices {
        facial_index: m.face_height / m.face_width * 100.0,
        nasal_index: m.nose_width / m.nose_length * 100.0,
        mouth_face_ratio: m.lip_width / m.face_width * 100.0,
        interocular_ratio: m.interocular_dist / m.face_width * 100.0,
        eye_aspect_ratio: m.avg_eye_height / m.avg_eye_width,
        lip_fullness_ratio: m.total_lip_height / m.lip_width,
        jaw_face_ratio: m.jaw_width / m.cheekbone_width * 100.0,
        forehead_ratio: m.forehead_height / m.face_height * 100.0,
    };

    let features = classify(landmarks, &m, &raw);

    let indices = Indices {
        facial_index: DescribedIndex {
            value: raw.facial_index,
            class: rules::FACIAL_INDEX_CLASS.classify(raw.facial_index),
        },
        nasal_index: DescribedIndex {
            value: raw.nasal_index,
            class: rules::NASAL_INDEX_CLASS.classify(raw.nasal_index),
        },
        mouth_face_ratio: DescribedIndex {
            value: raw.mouth_face_ratio,
            class: IndexClass::Percent,
        },
        interocular_ratio: DescribedIndex {
            value: raw.interocular_ratio,
            class: IndexClass::Percent,
        },
    };

    Some(MorphologyResult {
        raw_indices: raw,
        measurements: m,
        indices,
        features,
    })
}

fn classify(landmarks: &[Landmark], m: &Measurements, raw: &RawIndices) -> Features {
    let outline = FaceOutline {
        facial_index: raw.facial_index,
        jaw_face_ratio: raw.jaw_face_ratio,
        cheekbone_width: m.cheekbone_width,
        forehead_width: m.forehead_width,
        jaw_width: m.jaw_width,
    };

    let opening = EyeOpening {
        aspect_ratio: raw.eye_aspect_ratio,
        epicanthic_fold: inner_corner_offset(landmarks) < rules::EPICANTHIC_FOLD_MAX_OFFSET,
    };

    let lip_balance = m.upper_lip_height / m.lower_lip_height;
    let cheek_over_jaw = m.cheekbone_width / m.jaw_width;

    Features {
        face_shape: Feature {
            value: rules::face_shape(&outline),
            metric: raw.facial_index,
        },
        nose_type: Feature {
            value: rules::NOSE_TYPE.classify(raw.nasal_index),
            metric: raw.nasal_index,
        },
        eye_shape: Feature {
            value: rules::eye_shape(&opening),
            metric: raw.eye_aspect_ratio,
        },
        lip_type: LipFeature {
            value: rules::LIP_TYPE.classify(raw.lip_fullness_ratio),
            balance: rules::LIP_BALANCE.classify(lip_balance),
            metric: raw.lip_fullness_ratio,
        },
        jaw_type: Feature {
            value: rules::JAW_TYPE.classify(raw.jaw_face_ratio),
            metric: raw.jaw_face_ratio,
        },
        forehead_type: Feature {
            value: rules::FOREHEAD_TYPE.classify(raw.forehead_ratio),
            metric: raw.forehead_ratio,
        },
        cheekbone_type: Feature {
            value: rules::CHEEKBONE_TYPE.classify(cheek_over_jaw),
            metric: cheek_over_jaw,
        },
    }
}

/// Mean vertical offset between each inner eye corner and the lid point below it.
fn inner_corner_offset(landmarks: &[Landmark]) -> f64 {
    let dy = |(i, j): (usize, usize)| (landmarks[i].y - landmarks[j].y).abs();
    (dy(INNER_CORNER_LEFT) + dy(INNER_CORNER_RIGHT)) / 2.0
}


#[cfg(test)]
mod tests {
    use super::features::*;
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < EPS,
            "got {actual}, expected {expected}"
        );
    }

    #[test]
    fn test_too_few_landmarks_returns_none() {
        let pts = vec![Landmark::default(); LANDMARK_COUNT - 1];
        assert!(analyze(&pts).is_none());
        assert!(analyze(&[]).is_none());
    }

    #[test]
    fn test_extra_landmarks_are_accepted() {
        // Refined meshes carry 478 points; only the first 468 are read.
        let mut pts = fixtures::frontal_face();
        pts.extend(std::iter::repeat(Landmark::default()).take(10));
        assert!(analyze(&pts).is_some());
    }

    #[test]
    fn test_golden_raw_indices() {
        let result = analyze(&fixtures::frontal_face()).unwrap();
        let raw = &result.raw_indices;
        assert_close(raw.facial_index, 95.0);
        assert_close(raw.nasal_index, 64.0);
        assert_close(raw.mouth_face_ratio, 25.0);
        assert_close(raw.interocular_ratio, 25.0);
        assert_close(raw.eye_aspect_ratio, 0.2);
        assert_close(raw.lip_fullness_ratio, 0.3);
        assert_close(raw.jaw_face_ratio, 600.0 / 7.0);
        assert_close(raw.forehead_ratio, 2500.0 / 76.0);
    }

    #[test]
    fn test_golden_measurements() {
        let m = analyze(&fixtures::frontal_face()).unwrap().measurements;
        assert_close(m.face_width, 0.8);
        assert_close(m.face_height, 0.76);
        assert_close(m.jaw_width, 0.6);
        assert_close(m.cheekbone_width, 0.7);
        assert_close(m.forehead_width, 0.6);
        assert_close(m.nose_width, 0.16);
        assert_close(m.nose_length, 0.25);
        assert_close(m.avg_eye_width, 0.15);
        assert_close(m.avg_eye_height, 0.03);
        assert_close(m.interocular_dist, 0.2);
        assert_close(m.lip_width, 0.2);
        assert_close(m.upper_lip_height, 0.02);
        assert_close(m.lower_lip_height, 0.04);
        assert_close(m.total_lip_height, 0.06);
        assert_close(m.forehead_height, 0.25);
    }

    #[test]
    fn test_golden_features() {
        let f = analyze(&fixtures::frontal_face()).unwrap().features;
        assert_eq!(f.face_shape.value, FaceShape::Diamond);
        assert_eq!(f.nose_type.value, NoseType::Mesorrhine);
        assert_eq!(f.eye_shape.value, EyeShape::Narrow);
        assert_eq!(f.lip_type.value, LipType::Full);
        assert_eq!(f.lip_type.balance, LipBalance::LowerDominant);
        assert_eq!(f.jaw_type.value, JawType::Medium);
        assert_eq!(f.forehead_type.value, ForeheadType::Medium);
        assert_eq!(f.cheekbone_type.value, CheekboneType::Prominent);
        assert_close(f.cheekbone_type.metric, 0.7 / 0.6);
    }

    #[test]
    fn test_golden_descriptive_indices() {
        let indices = analyze(&fixtures::frontal_face()).unwrap().indices;
        assert_eq!(indices.facial_index.class, IndexClass::Leptoprosopic);
        assert_eq!(indices.nasal_index.class, IndexClass::Mesorrhine);
        assert_eq!(indices.mouth_face_ratio.class, IndexClass::Percent);
        assert_eq!(indices.interocular_ratio.class, IndexClass::Percent);
    }

    #[test]
    fn test_flat_inner_corners_mark_monolid() {
        let mut pts = fixtures::frontal_face();
        pts[155].y = 0.402;
        pts[382].y = 0.402;
        let f = analyze(&pts).unwrap().features;
        assert_eq!(f.eye_shape.value, EyeShape::Monolid);
    }

    #[test]
    fn test_serialized_key_sets() {
        let json = serde_json::to_value(analyze(&fixtures::frontal_face()).unwrap()).unwrap();
        let raw = json["rawIndices"].as_object().unwrap();
        assert_eq!(raw.len(), IndexKey::ALL.len());
        for key in IndexKey::ALL {
            assert!(raw.contains_key(key.as_str()), "missing {key}");
        }
        let features = json["features"].as_object().unwrap();
        assert_eq!(features.len(), FeatureKey::ALL.len());
        for key in FeatureKey::ALL {
            assert!(features.contains_key(key.as_str()), "missing {key}");
        }
        assert_eq!(json["measurements"].as_object().unwrap().len(), 15);
        assert_eq!(json["features"]["cheekboneType"]["value"], "prominent");
        assert_eq!(json["features"]["lipType"]["balance"], "lower_dominant");
    }

    #[test]
    fn test_feature_labels_by_key() {
        let f = analyze(&fixtures::frontal_face()).unwrap().features;
        assert_eq!(f.label(FeatureKey::FaceShape), "diamond");
        assert_eq!(f.label(FeatureKey::EyeShape), "narrow");
        assert_eq!(f.label(FeatureKey::LipType), "full");
    }

    #[test]
    fn test_index_scales() {
        let small: Vec<_> = IndexKey::ALL
            .iter()
            .filter(|k| k.scale() == IndexScale::Small)
            .collect();
        assert_eq!(small, [&IndexKey::EyeAspectRatio, &IndexKey::LipFullnessRatio]);
    }
}
