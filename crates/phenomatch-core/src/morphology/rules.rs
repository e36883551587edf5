//! Ordered classification tables.
//!
//! Rules are evaluated top to bottom and the first admitting rule wins.
//! Several tables overlap (a face can satisfy both the square and the
//! diamond predicates), so table order is part of the output contract.

use super::features::{
    CheekboneType, EyeShape, FaceShape, ForeheadType, IndexClass, JawType, LipBalance, LipType,
    NoseType,
};

/// Comparison applied by one ladder step. Both bounds are strict.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Below(f64),
    Above(f64),
}

impl Bound {
    fn admits(self, value: f64) -> bool {
        match self {
            Bound::Below(limit) => value < limit,
            Bound::Above(limit) => value > limit,
        }
    }
}

/// Single-metric threshold ladder.
#[derive(Debug)]
pub struct Ladder<T: 'static> {
    pub steps: &'static [(Bound, T)],
    pub otherwise: T,
}

impl<T: Copy> Ladder<T> {
    pub fn classify(&self, value: f64) -> T {
        self.steps
            .iter()
            .find(|(bound, _)| bound.admits(value))
            .map(|&(_, result)| result)
            .unwrap_or(self.otherwise)
    }
}

/// Multi-metric rule: a predicate over an input record and its result.
pub struct Rule<I, T> {
    pub when: fn(&I) -> bool,
    pub then: T,
}

/// Evaluate `rules` in order, falling back to `otherwise`.
pub fn first_match<I, T: Copy>(rules: &[Rule<I, T>], input: &I, otherwise: T) -> T {
    rules
        .iter()
        .find(|rule| (rule.when)(input))
        .map(|rule| rule.then)
        .unwrap_or(otherwise)
}

// --- Face shape ---

/// Inputs inspected by the face-shape rules.
#[derive(Debug, Clone, Copy)]
pub struct FaceOutline {
    pub facial_index: f64,
    pub jaw_face_ratio: f64,
    pub cheekbone_width: f64,
    pub forehead_width: f64,
    pub jaw_width: f64,
}

fn is_oblong(f: &FaceOutline) -> bool {
    f.facial_index > 100.0 && f.jaw_face_ratio < 85.0
}

fn is_square(f: &FaceOutline) -> bool {
    f.facial_index > 93.0 && f.jaw_face_ratio > 90.0
}

fn is_round(f: &FaceOutline) -> bool {
    f.facial_index < 90.0 && f.jaw_face_ratio > 88.0
}

fn is_diamond(f: &FaceOutline) -> bool {
    f.cheekbone_width > f.forehead_width * 1.05 && f.cheekbone_width > f.jaw_width * 1.1
}

fn is_heart(f: &FaceOutline) -> bool {
    f.forehead_width > f.jaw_width * 1.15
}

pub const FACE_SHAPE_RULES: &[Rule<FaceOutline, FaceShape>] = &[
    Rule { when: is_oblong, then: FaceShape::Oblong },
    Rule { when: is_square, then: FaceShape::Square },
    Rule { when: is_round, then: FaceShape::Round },
    Rule { when: is_diamond, then: FaceShape::Diamond },
    Rule { when: is_heart, then: FaceShape::Heart },
];

pub fn face_shape(outline: &FaceOutline) -> FaceShape {
    first_match(FACE_SHAPE_RULES, outline, FaceShape::Oval)
}

// --- Eye shape ---

/// Vertical inner-corner offset below which an epicanthic fold is assumed.
pub const EPICANTHIC_FOLD_MAX_OFFSET: f64 = 0.005;

#[derive(Debug, Clone, Copy)]
pub struct EyeOpening {
    pub aspect_ratio: f64,
    pub epicanthic_fold: bool,
}

fn is_monolid(e: &EyeOpening) -> bool {
    e.aspect_ratio < 0.22 && e.epicanthic_fold
}

fn is_narrow(e: &EyeOpening) -> bool {
    e.aspect_ratio < 0.22
}

fn is_almond(e: &EyeOpening) -> bool {
    e.aspect_ratio < 0.30
}

pub const EYE_SHAPE_RULES: &[Rule<EyeOpening, EyeShape>] = &[
    Rule { when: is_monolid, then: EyeShape::Monolid },
    Rule { when: is_narrow, then: EyeShape::Narrow },
    Rule { when: is_almond, then: EyeShape::Almond },
];

pub fn eye_shape(opening: &EyeOpening) -> EyeShape {
    first_match(EYE_SHAPE_RULES, opening, EyeShape::Round)
}

// --- Single-metric ladders ---

pub const NOSE_TYPE: Ladder<NoseType> = Ladder {
    steps: &[
        (Bound::Below(55.0), NoseType::Leptorrhine),
        (Bound::Below(70.0), NoseType::Mesorrhine),
        (Bound::Below(85.0), NoseType::Platyrrhine),
    ],
    otherwise: NoseType::Hyperplatyrrhine,
};

pub const LIP_TYPE: Ladder<LipType> = Ladder {
    steps: &[
        (Bound::Below(0.15), LipType::Thin),
        (Bound::Below(0.25), LipType::Medium),
    ],
    otherwise: LipType::Full,
};

pub const LIP_BALANCE: Ladder<LipBalance> = Ladder {
    steps: &[
        (Bound::Below(0.6), LipBalance::LowerDominant),
        (Bound::Above(0.9), LipBalance::UpperDominant),
    ],
    otherwise: LipBalance::Balanced,
};

pub const JAW_TYPE: Ladder<JawType> = Ladder {
    steps: &[
        (Bound::Above(92.0), JawType::Square),
        (Bound::Above(82.0), JawType::Medium),
    ],
    otherwise: JawType::Narrow,
};

pub const FOREHEAD_TYPE: Ladder<ForeheadType> = Ladder {
    steps: &[
        (Bound::Above(38.0), ForeheadType::High),
        (Bound::Above(30.0), ForeheadType::Medium),
    ],
    otherwise: ForeheadType::Low,
};

pub const CHEEKBONE_TYPE: Ladder<CheekboneType> = Ladder {
    steps: &[
        (Bound::Above(1.2), CheekboneType::VeryProminent),
        (Bound::Above(1.08), CheekboneType::Prominent),
    ],
    otherwise: CheekboneType::Flat,
};

// Descriptive ladders. These only label displayed indices and never
// feed the face-shape or nose-type classifications above.

pub const FACIAL_INDEX_CLASS: Ladder<IndexClass> = Ladder {
    steps: &[
        (Bound::Above(97.0), IndexClass::Hyperleptoprosopic),
        (Bound::Above(93.0), IndexClass::Leptoprosopic),
        (Bound::Above(88.0), IndexClass::Mesoprosopic),
        (Bound::Above(83.0), IndexClass::Euryprosopic),
    ],
    otherwise: IndexClass::Hypereuryprosopic,
};

pub const NASAL_INDEX_CLASS: Ladder<IndexClass> = Ladder {
    steps: &[
        (Bound::Below(55.0), IndexClass::Leptorrhine),
        (Bound::Below(70.0), IndexClass::Mesorrhine),
        (Bound::Below(85.0), IndexClass::Platyrrhine),
    ],
    otherwise: IndexClass::Hyperplatyrrhine,
};
