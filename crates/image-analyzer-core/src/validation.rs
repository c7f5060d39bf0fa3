//! Heuristic gate that keeps broken model output out of saved artifacts.
//!
//! A response is rejected when it is empty, too short, runaway long, or looks
//! like gibberish (tiny average word length, mostly special characters, or
//! one word repeated over and over).

use std::collections::HashSet;

use thiserror::Error;

/// Thresholds applied by [`validate_response_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationLimits {
    /// Minimum trimmed length in characters.
    pub min_chars: usize,
    /// Maximum number of whitespace-separated words.
    pub max_words: usize,
    /// Minimum average length of words longer than one character.
    pub min_avg_word_length: f64,
    /// Minimum share of alphanumeric or whitespace characters.
    pub min_normal_char_ratio: f64,
    /// Minimum share of distinct (lowercased) words.
    pub min_unique_word_ratio: f64,
    /// Word count from which the repetition check applies.
    pub repetition_min_words: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_chars: 20,
            max_words: 10_000,
            min_avg_word_length: 2.0,
            min_normal_char_ratio: 0.7,
            min_unique_word_ratio: 0.3,
            repetition_min_words: 10,
        }
    }
}

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Nothing but whitespace.
    #[error("Response is empty")]
    Empty,
    /// Fewer characters than required.
    #[error("Response too short ({chars} chars, minimum {min})")]
    TooShort {
        /// Trimmed character count.
        chars: usize,
        /// Required minimum.
        min: usize,
    },
    /// More words than allowed.
    #[error("Response too long ({words} words, maximum {max})")]
    TooLong {
        /// Word count.
        words: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// Words are suspiciously short on average.
    #[error("Response appears to be gibberish (avg word length: {avg_word_length:.1})")]
    Gibberish {
        /// Measured average word length.
        avg_word_length: f64,
    },
    /// Too many characters that are neither alphanumeric nor whitespace.
    #[error("Response contains excessive special characters (possible gibberish)")]
    SpecialCharacters,
    /// The same few words repeated.
    #[error("Response contains excessive repetition")]
    Repetitive,
}

/// Validates a response with the default limits.
///
/// # Errors
///
/// Returns the first [`ValidationError`] that applies.
pub fn validate_response(text: &str) -> Result<(), ValidationError> {
    validate_response_with(text, &ValidationLimits::default())
}

/// Validates a response against custom limits.
///
/// # Errors
///
/// Returns the first [`ValidationError`] that applies, checked in the order
/// empty, length, word count, average word length, special characters,
/// repetition.
#[allow(clippy::cast_precision_loss)]
pub fn validate_response_with(text: &str, limits: &ValidationLimits) -> Result<(), ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty);
    }

    let chars = text.chars().count();
    if chars < limits.min_chars {
        return Err(ValidationError::TooShort {
            chars,
            min: limits.min_chars,
        });
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > limits.max_words {
        return Err(ValidationError::TooLong {
            words: words.len(),
            max: limits.max_words,
        });
    }

    // Single-character tokens are mostly punctuation and would skew the mean.
    let meaningful: Vec<usize> = words
        .iter()
        .map(|w| w.chars().count())
        .filter(|&len| len > 1)
        .collect();
    if !meaningful.is_empty() {
        let avg_word_length = meaningful.iter().sum::<usize>() as f64 / meaningful.len() as f64;
        if avg_word_length < limits.min_avg_word_length {
            return Err(ValidationError::Gibberish { avg_word_length });
        }
    }

    let normal = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    if (normal as f64 / chars as f64) < limits.min_normal_char_ratio {
        return Err(ValidationError::SpecialCharacters);
    }

    if words.len() >= limits.repetition_min_words {
        let unique: HashSet<String> = words.iter().map(|w| w.to_lowercase()).collect();
        if (unique.len() as f64 / words.len() as f64) < limits.min_unique_word_ratio {
            return Err(ValidationError::Repetitive);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rejected() {
        assert_eq!(validate_response(""), Err(ValidationError::Empty));
        assert_eq!(validate_response("  \n\t "), Err(ValidationError::Empty));
    }

    #[test]
    fn test_short_rejected() {
        assert_eq!(
            validate_response("abcd"),
            Err(ValidationError::TooShort { chars: 4, min: 20 })
        );
    }

    #[test]
    fn test_length_counts_trimmed_characters() {
        // 19 visible chars padded with whitespace
        let padded = format!("   {}   ", "a".repeat(19));
        assert!(matches!(
            validate_response(&padded),
            Err(ValidationError::TooShort { chars: 19, .. })
        ));
    }

    #[test]
    fn test_too_many_words_rejected() {
        let text = vec!["word"; 10_001].join(" ");
        assert_eq!(
            validate_response(&text),
            Err(ValidationError::TooLong {
                words: 10_001,
                max: 10_000
            })
        );
    }

    #[test]
    fn test_two_letter_words_accepted() {
        assert_eq!(validate_response("aa bb cc dd ee ff gg hh ii jj"), Ok(()));
    }

    #[test]
    fn test_single_letter_repetition_rejected() {
        assert!(validate_response("x x x x x x x x x x").is_err());

        let relaxed = ValidationLimits {
            min_chars: 1,
            ..ValidationLimits::default()
        };
        assert_eq!(
            validate_response_with("x x x x x x x x x x", &relaxed),
            Err(ValidationError::Repetitive)
        );
    }

    #[test]
    fn test_repetition_is_case_insensitive() {
        let text = "Cat cat CAT cat Cat cat dog cat cat cat cat cat";
        assert_eq!(validate_response(text), Err(ValidationError::Repetitive));
    }

    #[test]
    fn test_gibberish_average_word_length() {
        let relaxed = ValidationLimits {
            min_avg_word_length: 3.0,
            ..ValidationLimits::default()
        };
        let result = validate_response_with("ab cd ef gh ij kl mn op", &relaxed);
        assert!(matches!(result, Err(ValidationError::Gibberish { .. })));
    }

    #[test]
    fn test_special_characters_rejected() {
        let text = "#$%^&*()!@#$%^&*()_+ hello";
        assert_eq!(
            validate_response(text),
            Err(ValidationError::SpecialCharacters)
        );
    }

    #[test]
    fn test_realistic_description_accepted() {
        let text = "A golden retriever lies on a wooden porch in late afternoon light, \
                    looking toward the camera with a tennis ball between its paws.";
        assert_eq!(validate_response(text), Ok(()));
    }

    #[test]
    fn test_non_ascii_text_counts_characters() {
        let text = "Ein Hund läuft über eine grüne Wiese im Sonnenschein.";
        assert_eq!(validate_response(text), Ok(()));
    }

    #[test]
    fn test_error_messages() {
        let err = ValidationError::TooShort { chars: 4, min: 20 };
        assert_eq!(err.to_string(), "Response too short (4 chars, minimum 20)");
        let err = ValidationError::Gibberish {
            avg_word_length: 1.234,
        };
        assert!(err.to_string().contains("1.2"));
    }
}
