//! String similarity primitives used by deduplication.
//!
//! Scores are percentages in `0.0..=100.0`. All comparisons operate on
//! Unicode scalar values, not bytes, so accented venue names are measured
//! per character.

/// Normalize free text for comparison.
///
/// Lowercases, spells `&` as `and`, drops punctuation (apostrophes vanish
/// so `Joe's` becomes `joes`), and collapses runs of whitespace.
#[must_use]
pub fn normalize_text(input: &str) -> String {
    let lowered = input.to_lowercase().replace('&', " and ");
    let stripped: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else if c == '-' || c == '/' || c == ',' || c == '.' {
                ' '
            } else {
                '\0'
            }
        })
        .filter(|&c| c != '\0')
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classic Levenshtein distance (insert, delete, substitute; unit costs).
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Similarity of two already-normalized strings:
/// `(maxLen - editDistance) / maxLen * 100`.
///
/// Identical inputs (including two empty strings) score 100.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 100.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 100.0;
    }
    let distance = edit_distance(a, b);
    (max_len.saturating_sub(distance)) as f64 / max_len as f64 * 100.0
}

/// Normalize both inputs with [`normalize_text`] and score them.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_similarity(&normalize_text(a), &normalize_text(b))
}

/// Similarity over the first `prefix_chars` characters of each normalized
/// input. Used as a cheap pre-filter before full comparison.
#[must_use]
pub fn prefix_similarity(a: &str, b: &str, prefix_chars: usize) -> f64 {
    let a: String = normalize_text(a).chars().take(prefix_chars).collect();
    let b: String = normalize_text(b).chars().take(prefix_chars).collect();
    normalized_similarity(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_punctuation_and_spells_ampersand() {
        assert_eq!(normalize_text("Joe's Bar & Grill"), "joes bar and grill");
        assert_eq!(normalize_text("  The   Photo-Booth! "), "the photo booth");
    }

    #[test]
    fn edit_distance_known_values() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("abc", ""), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn edit_distance_is_symmetric() {
        let pairs = [
            ("photo booth", "photobooth"),
            ("café", "cafe"),
            ("a", "bcd"),
            ("", "x"),
        ];
        for (a, b) in pairs {
            assert_eq!(edit_distance(a, b), edit_distance(b, a), "{a} / {b}");
        }
    }

    #[test]
    fn similarity_of_identical_is_100() {
        for s in ["", "x", "the smell of photo chemicals", "Ünïcödé"] {
            let n = normalize_text(s);
            assert!((normalized_similarity(&n, &n) - 100.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn ampersand_and_apostrophe_variants_score_high() {
        let score = similarity("Joe's Bar & Grill", "Joes Bar and Grill");
        assert!(score > 90.0, "got {score}");
    }

    #[test]
    fn unrelated_names_score_low() {
        let score = similarity("Musée Mécanique", "Grand Central Terminal");
        assert!(score < 40.0, "got {score}");
    }

    #[test]
    fn similarity_formula_matches_definition() {
        // "abcd" vs "abcf": distance 1, max len 4 -> 75
        assert!((normalized_similarity("abcd", "abcf") - 75.0).abs() < 1e-9);
    }

    #[test]
    fn prefix_similarity_only_looks_at_leading_chars() {
        let a = "Photomatic Booth at the Very Long Venue Name Number One";
        let b = "Photomatic Booth at the Completely Different Ending";
        assert!((prefix_similarity(a, b, 20) - 100.0).abs() < f64::EPSILON);
    }
}
