//! Plate Text Layer
//!
//! Turns raw OCR fragments into a validated plate string:
//! fragment cleanup and joining, character-confusion correction and grammar
//! matching. Also holds the save gate that throttles how often a detected
//! plate is processed.

pub mod correction;
pub mod gate;
pub mod grammar;

pub use correction::correct_confusions;
pub use gate::{SaveGate, DEFAULT_SAVE_INTERVAL};
pub use grammar::{PlateGrammar, ValidatedPlate};

use tracing::debug;

use crate::vision::OcrFragment;

/// Strip non-alphanumeric characters from each fragment and join with spaces
pub fn aggregate_fragments<I, S>(fragments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fragments
        .into_iter()
        .map(|f| {
            f.as_ref()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text read from one plate crop
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
    /// Cleaned and joined OCR text before correction
    pub raw_text: String,
    /// Validated plate, if the corrected text matched the grammar
    pub plate: Option<ValidatedPlate>,
}

/// OCR fragments to plate text pipeline
#[derive(Debug, Clone, Default)]
pub struct PlateTextNormalizer {
    grammar: PlateGrammar,
}

impl PlateTextNormalizer {
    /// Correct and validate an already aggregated string
    pub fn validate(&self, text: &str) -> Option<ValidatedPlate> {
        let corrected = correct_confusions(text);
        let plate = self.grammar.match_prefix(&corrected);
        debug!("Plate text {:?} -> {:?} -> {:?}", text, corrected, plate);
        plate
    }

    /// Aggregate the fragments returned by an OCR engine, then correct and
    /// validate the joined text
    pub fn normalize(&self, fragments: &[OcrFragment]) -> PlateReading {
        let raw_text = aggregate_fragments(fragments.iter().map(|f| f.text.as_str()));
        let plate = self.validate(&raw_text);
        PlateReading { raw_text, plate }
    }
}
