use std::fmt::Write;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    abbrev::{Dictionary, Scorer},
    record::CitationRecord,
};

pub const DEFAULT_TEMPLATE: &str = "{year}_{authors}_{journal}";

/// Journal abbreviation settings used while rendering.
#[derive(Clone, Copy)]
pub struct Abbreviation<'a> {
    pub dictionary: &'a Dictionary,
    pub scorer: Scorer,
}

impl<'a> Abbreviation<'a> {
    pub fn new(dictionary: &'a Dictionary, scorer: Scorer) -> Self {
        Abbreviation { dictionary, scorer }
    }

    fn apply<'v>(&self, venue: &'v str) -> &'v str
    where
        'a: 'v,
    {
        self.dictionary.abbreviate(venue, self.scorer)
    }
}

/// Render `record` as a BibTeX entry.
///
/// Fields keep the record's order and are written lowercased as `  name={value},`, except `month`
/// which stays unbraced so macros like `jan` survive. With `abbreviation` set, the `journal`
/// value is replaced by its abbreviation in the output only.
pub fn citation_block(record: &CitationRecord, abbreviation: Option<Abbreviation<'_>>) -> String {
    let mut out = format!("@{}{{{},\n", record.entry_type(), record.key());
    for (name, value) in record.fields() {
        let value = match abbreviation {
            Some(abbrev) if name.eq_ignore_ascii_case("journal") => abbrev.apply(value),
            _ => value,
        };
        let name = name.to_lowercase();
        if name == "month" {
            let _ = writeln!(out, "  {name}={value},");
        } else {
            let _ = writeln!(out, "  {name}={{{value}}},");
        }
    }
    out.push_str("}\n");
    out
}

/// Fill `template` from `record`.
///
/// `{year}` is the raw year, `{authors}` the condensed author list (see [`authors_slug`]) and
/// `{journal}` the abbreviated journal name, lowercased, without periods, words joined by `_`.
/// Only fields whose placeholder appears in the template are required.
pub fn filename_stem(
    record: &CitationRecord,
    template: &str,
    abbreviation: Abbreviation<'_>,
) -> anyhow::Result<String> {
    let field = |name: &str| {
        record
            .get(name)
            .ok_or_else(|| anyhow!("record `{}` has no `{name}` field", record.key()))
    };

    let mut stem = template.to_string();
    if stem.contains("{year}") {
        stem = stem.replace("{year}", field("year")?.trim());
    }
    if stem.contains("{authors}") {
        stem = stem.replace("{authors}", &authors_slug(field("author")?));
    }
    if stem.contains("{journal}") {
        stem = stem.replace("{journal}", &journal_slug(abbreviation.apply(field("journal")?)));
    }
    Ok(stem)
}

/// `"Smith, John"` → `smith`; two authors → `smith_doe`; more → `smith_et_al`.
pub fn authors_slug(authors: &str) -> String {
    static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+and\s+").unwrap());

    let names: Vec<String> = AND_RE
        .split(authors.trim())
        .map(|author| {
            let last = author.split(',').next().unwrap_or(author);
            last.to_lowercase()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
        })
        .collect();

    match names.as_slice() {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{first}_{second}"),
        [first, ..] => format!("{first}_et_al"),
    }
}

fn journal_slug(abbreviation: &str) -> String {
    abbreviation
        .to_lowercase()
        .replace('.', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
