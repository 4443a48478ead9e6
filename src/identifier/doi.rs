use std::fmt;

use once_cell::sync::Lazy;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use regex::Regex;

// `/` stays literal: DOI suffixes routinely contain it and both resolvers expect it unescaped.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A DOI as found in a document or given on the command line.
///
/// The token is opaque: no registry validation happens here, the lookup services are the judge.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Doi(String);

impl Doi {
    /// Wrap an already extracted token. Returns `None` for blank input.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == token.len() {
            Some(Doi(token))
        } else {
            Some(Doi(trimmed.to_string()))
        }
    }

    /// Normalise user input, dropping the usual `doi:` and resolver URL wrappers.
    pub fn from_input(input: &str) -> Option<Self> {
        let mut s = input.trim();

        if let Some(rest) = s
            .strip_prefix("doi:")
            .or_else(|| s.strip_prefix("DOI:"))
            .or_else(|| s.strip_prefix("urn:doi:"))
            .or_else(|| s.strip_prefix("URN:DOI:"))
        {
            s = rest.trim_start();
        }

        if let Some(rest) = s
            .strip_prefix("https://doi.org/")
            .or_else(|| s.strip_prefix("http://doi.org/"))
            .or_else(|| s.strip_prefix("https://dx.doi.org/"))
            .or_else(|| s.strip_prefix("http://dx.doi.org/"))
        {
            s = rest;
        }

        Doi::new(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token encoded for use inside a URL path.
    pub fn url_path(&self) -> String {
        utf8_percent_encode(&self.0, PATH_SEGMENT_ENCODE_SET).to_string()
    }
}

impl fmt::Display for Doi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Find a DOI in one run of rendered page text.
///
/// A resolver link (`https://doi.org/...`, `http://dx.doi.org/...`, or `doi.org/...` without a
/// scheme) is tried first, then a `DOI` label followed by a space or colon and the token.
pub fn find_in_text(text: &str) -> Option<Doi> {
    static RESOLVER_URL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(?:https?://\S*)?\bdoi\.org/(\S+)").unwrap());
    static LABEL_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\bdoi\b[\s:]+(\S+)").unwrap());

    [&*RESOLVER_URL_RE, &*LABEL_RE].iter().find_map(|re| {
        let token = re.captures(text)?.get(1)?.as_str();
        Doi::new(trim_prose_punctuation(token))
    })
}

fn trim_prose_punctuation(s: &str) -> &str {
    s.trim_end_matches(|c: char| {
        matches!(c, '.' | ',' | ';' | ':' | ')' | ']' | '}' | '\"' | '\'')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::Strategy;

    fn doi_suffix_char() -> impl Strategy<Value = char> {
        let uppers = proptest::sample::select(('A'..='Z').collect::<Vec<_>>());
        let lowers = proptest::sample::select(('a'..='z').collect::<Vec<_>>());
        let digits = proptest::sample::select(('0'..='9').collect::<Vec<_>>());
        let punct = proptest::sample::select(vec!['-', '.', '_', ';', '(', ')', '/', ':']);
        proptest::prop_oneof![uppers, lowers, digits, punct]
    }

    // Suffixes end in an alphanumeric so prose-punctuation trimming leaves them intact.
    fn doi_core() -> impl Strategy<Value = String> {
        let last = proptest::prop_oneof![
            proptest::sample::select(('a'..='z').collect::<Vec<_>>()),
            proptest::sample::select(('0'..='9').collect::<Vec<_>>()),
        ];
        (
            proptest::collection::vec(
                proptest::sample::select(('0'..='9').collect::<Vec<_>>()),
                4..=9,
            ),
            proptest::collection::vec(doi_suffix_char(), 0..32),
            last,
        )
            .prop_map(|(digits, body, last)| {
                let digits: String = digits.into_iter().collect();
                let body: String = body.into_iter().collect();
                format!("10.{digits}/{body}{last}")
            })
    }

    #[test]
    fn finds_token_in_resolver_url() {
        proptest::proptest!(|(doi in doi_core(), host in proptest::sample::select(vec!["https://doi.org/", "http://dx.doi.org/", "https://www.doi.org/"]))| {
            let run = format!("{host}{doi}");
            let found = find_in_text(&run).expect("should find");
            proptest::prop_assert_eq!(found.as_str(), doi.as_str());
        })
    }

    #[test]
    fn finds_token_after_label() {
        proptest::proptest!(|(doi in doi_core(), label in proptest::sample::select(vec!["DOI:", "doi:", "DOI ", "Doi: ", "DOI::"]))| {
            let run = format!("Received 3 May 2021; {label}{doi}");
            let found = find_in_text(&run).expect("should find");
            proptest::prop_assert_eq!(found.as_str(), doi.as_str());
        })
    }

    #[test]
    fn resolver_url_wins_over_label() {
        let found = find_in_text("DOI: see https://doi.org/10.1234/abcd").expect("found");
        assert_eq!(found.as_str(), "10.1234/abcd");
    }

    #[test]
    fn link_without_scheme_is_a_resolver_link() {
        for run in [
            "doi.org/10.1234/abcd",
            "Available at dx.doi.org/10.1234/abcd.",
            "www.doi.org/10.1234/abcd",
        ] {
            let found = find_in_text(run).expect("found");
            assert_eq!(found.as_str(), "10.1234/abcd", "run: {run}");
        }
    }

    #[test]
    fn label_needs_a_separator() {
        assert!(find_in_text("see doi.org for details").is_none());
        assert!(find_in_text("doi-based lookup").is_none());
    }

    #[test]
    fn trailing_prose_punctuation_is_dropped() {
        let found = find_in_text("(doi: 10.1000/xyz123).").expect("found");
        assert_eq!(found.as_str(), "10.1000/xyz123");
    }

    #[test]
    fn text_without_doi_is_ignored() {
        assert!(find_in_text("Journal of Physics, vol. 12").is_none());
        assert!(find_in_text("Doing things").is_none());
        assert!(find_in_text("DOI:").is_none());
    }

    #[test]
    fn from_input_strips_wrappers() {
        for input in [
            "10.1000/182",
            "doi:10.1000/182",
            "DOI: 10.1000/182",
            "https://doi.org/10.1000/182",
            "http://dx.doi.org/10.1000/182",
            "  10.1000/182\n",
        ] {
            assert_eq!(Doi::from_input(input).expect("parse").as_str(), "10.1000/182");
        }
        assert!(Doi::from_input("   ").is_none());
    }

    #[test]
    fn url_path_keeps_slashes() {
        let doi = Doi::new("10.1002/(SICI)1097-4636<1>3.0.CO;2-#").expect("doi");
        assert_eq!(doi.url_path(), "10.1002/(SICI)1097-4636%3C1%3E3.0.CO;2-%23");
    }
}
