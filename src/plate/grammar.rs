//! License plate grammar
//!
//! Region code letters, a numeric run and an optional letter suffix, e.g.
//! `B 1234 ABC`. Only the prefix of the input is matched.

use regex::Regex;
use std::fmt;

/// Plate pattern, anchored at the start of the corrected OCR string
pub const PLATE_PATTERN: &str = r"^([A-Z]{1,2}\s?[0-9]{1,4}\s?[A-Z0]{0,3})";

/// A plate string that passed the grammar
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValidatedPlate(String);

impl ValidatedPlate {
    /// Plate text as matched
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedPlate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedPlate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compiled plate grammar
#[derive(Debug, Clone)]
pub struct PlateGrammar {
    pattern: Regex,
}

impl PlateGrammar {
    /// Compile the plate grammar
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(PLATE_PATTERN)?,
        })
    }

    /// Match the grammar against the start of `text`.
    ///
    /// Returns capture group 1; anything after it is ignored.
    pub fn match_prefix(&self, text: &str) -> Option<ValidatedPlate> {
        self.pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| ValidatedPlate(m.as_str().to_string()))
    }
}

impl Default for PlateGrammar {
    fn default() -> Self {
        Self::new().expect("plate pattern is a valid regex")
    }
}
