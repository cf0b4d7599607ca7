//! Text folding and tokenization shared by ingestion, indexing and querying

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Shortest query (and shortest indexed prefix) the index answers
pub const MIN_PREFIX_LEN: usize = 3;

/// Lowercase, decompose (NFKD) and drop combining marks.
///
/// Punctuation and whitespace are kept, so `"Vāta-Jvara"` folds to `"vata-jvara"`.
pub fn fold(input: &str) -> String {
    input
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Fold and split on every non-alphanumeric character, dropping empty pieces.
pub fn tokenize(input: &str) -> Vec<String> {
    fold(input)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Tokens joined by a single space; the comparison form for exact matches.
pub fn normalize_phrase(input: &str) -> String {
    tokenize(input).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_case_and_diacritics() {
        assert_eq!(fold("Vāta"), "vata");
        assert_eq!(fold("Évê-Ñ"), "eve-n");
    }

    #[test]
    fn tokenize_splits_on_non_alphanumeric() {
        assert_eq!(tokenize("Vātaja  Jvara/fever"), vec!["vataja", "jvara", "fever"]);
        assert_eq!(tokenize("NAM-001"), vec!["nam", "001"]);
        assert!(tokenize(" -- ").is_empty());
    }

    #[test]
    fn normalize_phrase_collapses_separators() {
        assert_eq!(normalize_phrase("  Kasa,   Roga "), "kasa roga");
    }
}
