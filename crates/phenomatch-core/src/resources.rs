//! Locations of the reference portraits and description pages for a match.

use crate::types::{MatchResult, Sex};

const PORTRAIT_DIR: &str = "faces_lowres";
const REFERENCE_BASE_URL: &str = "https://humanphenotypes.net/basic";

/// Relative path of a reference portrait, e.g. `faces_lowres/nordicm.jpg`.
///
/// Basic entries live in the `basic/` subdirectory.
pub fn portrait_path(name: &str, sex: Sex, is_basic: bool) -> String {
    let file = format!("{}{}.jpg", name.to_lowercase(), sex.tag());
    if is_basic {
        format!("{PORTRAIT_DIR}/basic/{file}")
    } else {
        format!("{PORTRAIT_DIR}/{file}")
    }
}

/// Portrait path to try first, plus the flat-directory path to use when a
/// basic entry's portrait is missing from `basic/`.
pub fn portrait_paths(name: &str, sex: Sex, is_basic: bool) -> (String, Option<String>) {
    let primary = portrait_path(name, sex, is_basic);
    let fallback = is_basic.then(|| portrait_path(name, sex, false));
    (primary, fallback)
}

/// Public description page for a phenotype.
pub fn reference_url(name: &str) -> String {
    format!("{REFERENCE_BASE_URL}/{name}.html")
}

impl MatchResult {
    pub fn portrait_path(&self) -> String {
        portrait_path(&self.name, self.sex, self.is_basic)
    }

    pub fn portrait_paths(&self) -> (String, Option<String>) {
        portrait_paths(&self.name, self.sex, self.is_basic)
    }

    pub fn reference_url(&self) -> String {
        reference_url(&self.name)
    }
}
