use biblatex::{Field, RawBibliography, RawChunk};
use tracing::debug;

/// A single BibTeX entry with its fields in the order the source listed them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CitationRecord {
    entry_type: String,
    key: String,
    fields: Vec<(String, String)>,
}

impl CitationRecord {
    pub fn new(
        entry_type: impl Into<String>,
        key: impl Into<String>,
        fields: Vec<(String, String)>,
    ) -> Self {
        CitationRecord {
            entry_type: entry_type.into(),
            key: key.into(),
            fields,
        }
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Case-insensitive field lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse BibTeX text into zero or more records.
///
/// Values are kept as written in the source: braces inside a value, TeX escapes and `--` ranges
/// survive, and a bare macro such as `month = jan` stays `jan`. Concatenated parts (`#`) are
/// joined without separator. Text that is not BibTeX at all (an HTML landing page, an error
/// message) yields no records rather than an error.
pub fn parse(text: &str) -> Vec<CitationRecord> {
    let raw = match RawBibliography::parse(text) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("not a BibTeX document: {e}");
            return Vec::new();
        }
    };

    raw.entries
        .into_iter()
        .map(|entry| {
            let entry = entry.v;
            let fields = entry
                .fields
                .iter()
                .map(|pair| (pair.key.v.to_string(), raw_value(&pair.value.v)))
                .collect();
            CitationRecord::new(entry.kind.v.to_ascii_lowercase(), entry.key.v, fields)
        })
        .collect()
}

fn raw_value(field: &Field<'_>) -> String {
    field
        .iter()
        .map(|chunk| match chunk.v {
            RawChunk::Normal(s) | RawChunk::Abbreviation(s) => s,
        })
        .collect()
}
