use std::{collections::BTreeMap, path::PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

pub mod pdf;

/// Embedded metadata of a document, keyed by namespace-stripped property name.
pub type Metadata = BTreeMap<String, String>;

/// A span of rendered text, in document order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextRun {
    pub index: usize,
    pub text: String,
}

impl TextRun {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        TextRun {
            index,
            text: text.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse PDF {path}: {message}")]
    Pdf { path: PathBuf, message: String },
}

/// Read-only views over a document that identifier extraction relies on.
pub trait Document {
    /// Embedded metadata. An empty map is a valid answer.
    fn metadata(&self) -> Result<Metadata, DocumentError>;

    /// Text runs of the first page, in reading order.
    fn first_page_runs(&self) -> Result<Vec<TextRun>, DocumentError>;
}

/// Drop a leading `{namespace-uri}` from an expanded XML property name.
pub fn normalize_key(key: &str) -> &str {
    static NS_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{.*\}(.*)$").unwrap());
    NS_PREFIX_RE
        .captures(key)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(key)
}
