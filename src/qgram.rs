//! q-gram block distance over byte strings.
//!
//! Used as the update-cost helper in the Zhang–Shasha matcher: two labels
//! that share most of their 3-grams are cheap to rename into each other.
//! Strings are treated as raw bytes; Unicode-aware tokenization is out of
//! scope.

use rapidhash::RapidHashMap;

const Q: usize = 3;
const PAD: u8 = b'#';

/// Similarity of two strings in `[0, 1]` based on overlapping 3-grams.
///
/// Both ends of each string are padded with two `#` sentinels before
/// tokenizing. Returns 1 when both strings are empty and 0 when exactly one
/// is.
pub fn qgram_distance(a: &str, b: &str) -> f64 {
    let ta = tokenize(a.as_bytes());
    let tb = tokenize(b.as_bytes());

    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    1.0 - block_distance(&ta, &tb) as f64 / (ta.len() + tb.len()) as f64
}

/// Overlapping 3-grams of `s` padded with `Q - 1` sentinels on each side.
fn tokenize(s: &[u8]) -> Vec<[u8; Q]> {
    if s.is_empty() {
        return Vec::new();
    }

    let mut padded = Vec::with_capacity(s.len() + 2 * (Q - 1));
    padded.extend([PAD; Q - 1]);
    padded.extend_from_slice(s);
    padded.extend([PAD; Q - 1]);

    padded
        .windows(Q)
        .map(|w| {
            let mut gram = [0u8; Q];
            gram.copy_from_slice(w);
            gram
        })
        .collect()
}

/// Sum of absolute frequency differences over the union of grams.
fn block_distance(a: &[[u8; Q]], b: &[[u8; Q]]) -> usize {
    let mut freq: RapidHashMap<[u8; Q], (isize, isize)> = RapidHashMap::default();
    for gram in a {
        freq.entry(*gram).or_default().0 += 1;
    }
    for gram in b {
        freq.entry(*gram).or_default().1 += 1;
    }

    freq.values().map(|(fa, fb)| fa.abs_diff(*fb)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "{actual} != {expected}"
        );
    }

    #[test]
    fn metric_values() {
        assert_close(qgram_distance("test string1", "test string2"), 0.7857);
        assert_close(qgram_distance("test", "test string2"), 0.4000);
        assert_close(qgram_distance("", "test string2"), 0.0);
        assert_close(qgram_distance("aaa bbb ccc ddd", "aaa bbb ccc eee"), 0.7059);
        assert_close(qgram_distance("a b c d", "a b c e"), 0.6667);
    }

    #[test]
    fn identical_strings_are_fully_similar() {
        assert_close(qgram_distance("hello", "hello"), 1.0);
    }

    #[test]
    fn empty_inputs() {
        assert_close(qgram_distance("", ""), 1.0);
        assert_close(qgram_distance("x", ""), 0.0);
    }

    #[test]
    fn tokenize_pads_both_ends() {
        let grams = tokenize(b"1");
        assert_eq!(grams, vec![*b"##1", *b"#1#", *b"1##"]);
        let grams = tokenize(b"12");
        assert_eq!(grams, vec![*b"##1", *b"#12", *b"12#", *b"2##"]);
        assert!(tokenize(b"").is_empty());
    }
}
