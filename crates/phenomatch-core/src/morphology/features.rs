//! Categorical classifications produced by the morphology analyzer.
//!
//! Every category serializes as its canonical lowercase label. Reference
//! profiles store the same labels, so categorical agreement is a plain
//! string comparison.

use serde::Serialize;

labelled! {
    /// Overall face outline.
    pub enum FaceShape {
        Oblong => "oblong",
        Square => "square",
        Round => "round",
        Diamond => "diamond",
        Heart => "heart",
        Oval => "oval",
    }
}

labelled! {
    /// Nose breadth class by nasal index.
    pub enum NoseType {
        Leptorrhine => "leptorrhine",
        Mesorrhine => "mesorrhine",
        Platyrrhine => "platyrrhine",
        Hyperplatyrrhine => "hyperplatyrrhine",
    }
}

labelled! {
    pub enum EyeShape {
        Monolid => "monolid",
        Narrow => "narrow",
        Almond => "almond",
        Round => "round",
    }
}

labelled! {
    /// Lip fullness relative to mouth width.
    pub enum LipType {
        Thin => "thin",
        Medium => "medium",
        Full => "full",
    }
}

labelled! {
    /// Upper/lower lip height balance.
    pub enum LipBalance {
        LowerDominant => "lower_dominant",
        Balanced => "balanced",
        UpperDominant => "upper_dominant",
    }
}

labelled! {
    pub enum JawType {
        Narrow => "narrow",
        Medium => "medium",
        Square => "square",
    }
}

labelled! {
    pub enum ForeheadType {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
}

labelled! {
    pub enum CheekboneType {
        Flat => "flat",
        Prominent => "prominent",
        VeryProminent => "very_prominent",
    }
}

labelled! {
    /// Descriptive bucket attached to a displayed index.
    ///
    /// Facial and nasal indices use their own anthropometric ladders;
    /// the width ratios are shown as plain percentages.
    pub enum IndexClass {
        Hyperleptoprosopic => "hyperleptoprosopic",
        Leptoprosopic => "leptoprosopic",
        Mesoprosopic => "mesoprosopic",
        Euryprosopic => "euryprosopic",
        Hypereuryprosopic => "hypereuryprosopic",
        Leptorrhine => "leptorrhine",
        Mesorrhine => "mesorrhine",
        Platyrrhine => "platyrrhine",
        Hyperplatyrrhine => "hyperplatyrrhine",
        Percent => "percent",
    }
}

/// A classification together with the metric its rule ladder inspected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Feature<T> {
    pub value: T,
    pub metric: f64,
}

/// Lip classification: fullness plus the independent balance subclass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LipFeature {
    pub value: LipType,
    pub balance: LipBalance,
    pub metric: f64,
}

/// The seven regional classifications of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub face_shape: Feature<FaceShape>,
    pub nose_type: Feature<NoseType>,
    pub eye_shape: Feature<EyeShape>,
    pub lip_type: LipFeature,
    pub jaw_type: Feature<JawType>,
    pub forehead_type: Feature<ForeheadType>,
    pub cheekbone_type: Feature<CheekboneType>,
}

impl Features {
    /// Canonical label of the classification stored under `key`.
    pub fn label(&self, key: super::FeatureKey) -> &'static str {
        use super::FeatureKey;
        match key {
            FeatureKey::FaceShape => self.face_shape.value.as_str(),
            FeatureKey::NoseType => self.nose_type.value.as_str(),
            FeatureKey::EyeShape => self.eye_shape.value.as_str(),
            FeatureKey::LipType => self.lip_type.value.as_str(),
            FeatureKey::JawType => self.jaw_type.value.as_str(),
            FeatureKey::ForeheadType => self.forehead_type.value.as_str(),
            FeatureKey::CheekboneType => self.cheekbone_type.value.as_str(),
        }
    }
}
