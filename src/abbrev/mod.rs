//! Journal name abbreviation by fuzzy lookup in a full-name → abbreviation dictionary.

use std::{collections::BTreeMap, path::Path};

use anyhow::Context;
use tracing::{debug, info};

pub mod scorer;

pub use scorer::Scorer;

/// Built-in dictionary, compiled into the binary.
const BUILTIN_JOURNALS: &str = include_str!("../../data/journals.json");

/// Best dictionary entry for a venue name.
#[derive(Clone, Debug, PartialEq)]
pub struct Match<'a> {
    pub full_name: &'a str,
    pub abbreviation: &'a str,
    pub score: f64,
}

/// Full journal name → canonical abbreviation, immutable once built.
///
/// Iteration, and therefore tie-breaking between equally scored names, follows ascending
/// lexicographic order of the full names.
#[derive(Clone, Debug, Default)]
pub struct Dictionary {
    entries: BTreeMap<String, String>,
}

impl Dictionary {
    /// Merge `overrides` over `base`; entries from `overrides` win on collision.
    pub fn merged(base: BTreeMap<String, String>, overrides: BTreeMap<String, String>) -> Self {
        let mut entries = base;
        entries.extend(overrides);
        Dictionary { entries }
    }

    pub fn builtin() -> anyhow::Result<BTreeMap<String, String>> {
        serde_json::from_str(BUILTIN_JOURNALS).context("built-in journal dictionary is corrupt")
    }

    /// Read a user dictionary: a JSON object of full names to abbreviations.
    pub fn read_overrides(path: &Path) -> anyhow::Result<BTreeMap<String, String>> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read journal dictionary {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not a JSON object of strings", path.display()))
    }

    /// The built-in dictionary with the user dictionary at `overrides` (if any) merged on top.
    pub fn load(overrides: Option<&Path>) -> anyhow::Result<Self> {
        let base = Self::builtin()?;
        let extra = match overrides {
            Some(path) => {
                let extra = Self::read_overrides(path)?;
                info!(
                    path = %path.display(),
                    entries = extra.len(),
                    "loaded user journal dictionary"
                );
                extra
            }
            None => BTreeMap::new(),
        };
        let dictionary = Self::merged(base, extra);
        debug!(entries = dictionary.entries.len(), "journal dictionary ready");
        Ok(dictionary)
    }

    /// Best-scoring entry for `venue`.
    ///
    /// There is no cutoff: a venue unlike anything in the dictionary still gets the globally best
    /// (possibly meaningless) entry, so callers that care must look at `score`. `None` only for an
    /// empty dictionary.
    pub fn best_match(&self, venue: &str, scorer: Scorer) -> Option<Match<'_>> {
        let mut best: Option<Match<'_>> = None;
        for (full_name, abbreviation) in &self.entries {
            let score = scorer.score(venue, full_name);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Match {
                    full_name,
                    abbreviation,
                    score,
                });
            }
        }
        best
    }

    /// Abbreviation for `venue`, falling back to `venue` itself for an empty dictionary.
    pub fn abbreviate<'a>(&'a self, venue: &'a str, scorer: Scorer) -> &'a str {
        match self.best_match(venue, scorer) {
            Some(m) => {
                debug!(
                    venue,
                    matched = m.full_name,
                    score = m.score,
                    %scorer,
                    "abbreviated journal"
                );
                m.abbreviation
            }
            None => venue,
        }
    }
}
