//! OCR character-confusion correction
//!
//! Plate fonts make `8`/`B` and `0`/`O` easy to confuse. Letters sit in front
//! of the numeric run, so a confusable character that does not follow a digit
//! is read as the letter.

/// Replace misread `8`/`0` with `B`/`O` outside numeric runs.
///
/// The check looks at the previous *output* character, so `"80"` becomes
/// `"BO"`: once the `8` turned into a `B` the `0` no longer follows a digit.
/// Substitutions are one-to-one and the character count never changes.
pub fn correct_confusions(text: &str) -> String {
    let mut corrected = String::with_capacity(text.len());
    let mut prev: Option<char> = None;

    for ch in text.chars() {
        let follows_digit = prev.is_some_and(|p| p.is_ascii_digit());
        let out = match ch {
            '8' if !follows_digit => 'B',
            '0' if !follows_digit => 'O',
            other => other,
        };
        corrected.push(out);
        prev = Some(out);
    }

    corrected
}
