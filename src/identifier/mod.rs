use std::fmt;

use tracing::{debug, warn};

use crate::document::{Document, DocumentError, Metadata};

pub mod doi;

pub use doi::Doi;

/// Metadata keys that may carry a DOI, in lookup order.
const DOI_KEYS: &[&str] = &["doi", "DOI"];

/// Where an extracted identifier was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Metadata,
    PageText { run: usize },
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Metadata => f.write_str("embedded metadata"),
            Origin::PageText { run } => write!(f, "first page text (run {run})"),
        }
    }
}

/// Outcome of looking for a DOI in a document.
///
/// `identifier` is `None` when neither the metadata nor the first page carry one; `metadata` is
/// always the raw mapping so the caller can show it for manual inspection.
#[derive(Debug)]
pub struct Extraction {
    pub identifier: Option<(Doi, Origin)>,
    pub metadata: Metadata,
}

impl Extraction {
    pub fn doi(&self) -> Option<&Doi> {
        self.identifier.as_ref().map(|(doi, _)| doi)
    }
}

/// Extract a DOI from `document`.
///
/// Embedded metadata always takes precedence; the first page is only scanned when no metadata
/// key carries a non-empty value. Within the page the first match in reading order wins.
pub fn extract<D: Document + ?Sized>(document: &D) -> Result<Extraction, DocumentError> {
    let metadata = document.metadata()?;

    if let Some(doi) = DOI_KEYS
        .iter()
        .filter_map(|key| metadata.get(*key))
        .find_map(|value| Doi::new(value.as_str()))
    {
        debug!(%doi, "DOI found in embedded metadata");
        return Ok(Extraction {
            identifier: Some((doi, Origin::Metadata)),
            metadata,
        });
    }

    let runs = match document.first_page_runs() {
        Ok(runs) => runs,
        Err(e) => {
            warn!("could not read first page text: {e}");
            Vec::new()
        }
    };
    let identifier = runs.iter().find_map(|run| {
        doi::find_in_text(&run.text).map(|doi| (doi, Origin::PageText { run: run.index }))
    });
    if let Some((doi, origin)) = &identifier {
        debug!(%doi, %origin, "DOI found");
    }

    Ok(Extraction {
        identifier,
        metadata,
    })
}
