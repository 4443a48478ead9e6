use std::{fmt, str::FromStr};

/// String similarity strategies, scored from 0 (unrelated) to 100 (identical after
/// normalisation).
///
/// Every strategy lowercases both inputs and replaces anything that is not alphanumeric by a
/// space before comparing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scorer {
    /// Normalised indel similarity of the whole strings.
    Ratio,
    /// Best `Ratio` of the shorter string against every equally long window of the longer one.
    PartialRatio,
    /// `Ratio` after sorting the words of both strings.
    #[default]
    TokenSortRatio,
    /// Compares the shared words against each side's shared-plus-remaining words.
    TokenSetRatio,
    /// `PartialRatio` after sorting the words of both strings.
    PartialTokenSortRatio,
}

const NAMES: &[(&str, Scorer)] = &[
    ("ratio", Scorer::Ratio),
    ("partial_ratio", Scorer::PartialRatio),
    ("token_sort_ratio", Scorer::TokenSortRatio),
    ("token_set_ratio", Scorer::TokenSetRatio),
    ("partial_token_sort_ratio", Scorer::PartialTokenSortRatio),
];

#[derive(Debug, thiserror::Error)]
#[error("unknown scorer `{0}` (expected one of: ratio, partial_ratio, token_sort_ratio, token_set_ratio, partial_token_sort_ratio)")]
pub struct UnknownScorer(pub String);

impl FromStr for Scorer {
    type Err = UnknownScorer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        NAMES
            .iter()
            .find(|(name, _)| *name == wanted)
            .map(|(_, scorer)| *scorer)
            .ok_or_else(|| UnknownScorer(s.to_string()))
    }
}

impl fmt::Display for Scorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = NAMES
            .iter()
            .find(|(_, scorer)| scorer == self)
            .map(|(name, _)| *name)
            .unwrap_or("token_sort_ratio");
        f.write_str(name)
    }
}

impl Scorer {
    pub fn score(self, a: &str, b: &str) -> f64 {
        let a = normalize(a);
        let b = normalize(b);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        match self {
            Scorer::Ratio => ratio(&a, &b),
            Scorer::PartialRatio => partial_ratio(&a, &b),
            Scorer::TokenSortRatio => ratio(&sort_tokens(&a), &sort_tokens(&b)),
            Scorer::TokenSetRatio => token_set_ratio(&a, &b),
            Scorer::PartialTokenSortRatio => partial_ratio(&sort_tokens(&a), &sort_tokens(&b)),
        }
    }
}

/// Lowercase, turn non-alphanumerics into spaces, collapse whitespace.
pub fn normalize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn ratio(a: &str, b: &str) -> f64 {
    rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0
}

fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long): (Vec<char>, Vec<char>) = if a.chars().count() <= b.chars().count() {
        (a.chars().collect(), b.chars().collect())
    } else {
        (b.chars().collect(), a.chars().collect())
    };
    if short.len() == long.len() {
        return ratio(a, b);
    }
    long.windows(short.len())
        .map(|window| {
            rapidfuzz::fuzz::ratio(short.iter().copied(), window.iter().copied()) * 100.0
        })
        .fold(0.0, f64::max)
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_set_ratio(a: &str, b: &str) -> f64 {
    use std::collections::BTreeSet;

    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    let join = |set: Vec<&&str>| set.into_iter().copied().collect::<Vec<_>>().join(" ");

    let shared = join(ta.intersection(&tb).collect());
    let only_a = join(ta.difference(&tb).collect());
    let only_b = join(tb.difference(&ta).collect());

    let combined_a = format!("{shared} {only_a}").trim().to_string();
    let combined_b = format!("{shared} {only_b}").trim().to_string();

    let mut best = ratio(&combined_a, &combined_b);
    if !shared.is_empty() {
        best = best
            .max(ratio(&shared, &combined_a))
            .max(ratio(&shared, &combined_b));
    }
    best
}
