use std::path::{Path, PathBuf};

use lopdf::Object;
use quick_xml::{
    NsReader,
    events::{BytesStart, Event},
    name::{Namespace, ResolveResult},
};
use tracing::debug;

use crate::document::{Document, DocumentError, Metadata, TextRun, normalize_key};

const RDF_NS: &[u8] = b"http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// A PDF file loaded into memory.
pub struct PdfDocument {
    path: PathBuf,
    inner: lopdf::Document,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, &bytes)
    }

    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self, DocumentError> {
        let inner = lopdf::Document::load_mem(bytes).map_err(|e| DocumentError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(PdfDocument {
            path: path.to_path_buf(),
            inner,
        })
    }

    fn pdf_error(&self, e: lopdf::Error) -> DocumentError {
        DocumentError::Pdf {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }

    /// Raw XMP packet referenced by the catalog, if any.
    fn xmp_packet(&self) -> Option<String> {
        let catalog = self.inner.catalog().ok()?;
        let id = catalog.get(b"Metadata").ok()?.as_reference().ok()?;
        let stream = self.inner.get_object(id).ok()?.as_stream().ok()?;
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Entries of the trailer's document information dictionary.
    fn info_entries(&self) -> Metadata {
        let mut out = Metadata::new();
        let info = match self.inner.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => self.inner.get_dictionary(*id).ok(),
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        };
        let Some(info) = info else {
            return out;
        };
        for (key, value) in info.iter() {
            if let Some(text) = object_text(value) {
                out.insert(String::from_utf8_lossy(key).into_owned(), text);
            }
        }
        out
    }
}

impl Document for PdfDocument {
    fn metadata(&self) -> Result<Metadata, DocumentError> {
        let mut metadata = self.info_entries();
        if let Some(xmp) = self.xmp_packet() {
            metadata.extend(parse_xmp(&xmp));
        }
        debug!(
            path = %self.path.display(),
            keys = metadata.len(),
            "read embedded metadata"
        );
        Ok(metadata)
    }

    fn first_page_runs(&self) -> Result<Vec<TextRun>, DocumentError> {
        let Some((&first, _)) = self.inner.get_pages().iter().next() else {
            return Ok(Vec::new());
        };
        let text = self
            .inner
            .extract_text(&[first])
            .map_err(|e| self.pdf_error(e))?;
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, l)| TextRun::new(i, l))
            .collect())
    }
}

fn object_text(obj: &Object) -> Option<String> {
    match obj {
        Object::String(..) => lopdf::decode_text_string(obj).ok(),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

struct Property {
    key: String,
    text: String,
    items: Vec<String>,
}

/// Flatten the top-level properties of every `rdf:Description` in an XMP packet.
///
/// Keys come out namespace-stripped; array values (`rdf:Seq`, `rdf:Bag`, `rdf:Alt`) are joined
/// with `"; "`. A malformed packet yields whatever was read before the error.
pub(crate) fn parse_xmp(xml: &str) -> Metadata {
    let mut reader = NsReader::from_str(xml);
    let mut out = Metadata::new();

    let mut depth = 0usize;
    let mut description_depth: Option<usize> = None;
    let mut property: Option<Property> = None;
    // Open `rdf:li` and its depth; text nested any deeper (structs, qualifiers) is skipped.
    let mut item: Option<(usize, String)> = None;

    loop {
        match reader.read_resolved_event() {
            Ok((_, Event::Eof)) => break,
            Ok((ns, Event::Start(e))) => {
                depth += 1;
                let local = e.local_name();
                let rdf = is_rdf(&ns);
                if property.is_none() && rdf && local.as_ref() == b"Description" {
                    description_depth = Some(depth);
                    collect_attributes(&reader, &e, &mut out);
                } else if description_depth.is_some_and(|d| d + 1 == depth) {
                    property = Some(Property {
                        key: expanded_name(&ns, local.as_ref()),
                        text: String::new(),
                        items: Vec::new(),
                    });
                } else if property.is_some() && item.is_none() && rdf && local.as_ref() == b"li" {
                    item = Some((depth, String::new()));
                }
            }
            Ok((ns, Event::Empty(e))) => {
                if property.is_none()
                    && is_rdf(&ns)
                    && e.local_name().as_ref() == b"Description"
                {
                    collect_attributes(&reader, &e, &mut out);
                }
            }
            Ok((_, Event::Text(t))) => {
                let text = String::from_utf8_lossy(&t);
                push_text(&mut property, &mut item, description_depth, depth, &text);
            }
            Ok((_, Event::CData(t))) => {
                let text = String::from_utf8_lossy(&t);
                push_text(&mut property, &mut item, description_depth, depth, &text);
            }
            Ok((_, Event::GeneralRef(r))) => {
                let name = String::from_utf8_lossy(&r).into_owned();
                if let Some(resolved) = resolve_entity(&name) {
                    push_text(&mut property, &mut item, description_depth, depth, &resolved);
                }
            }
            Ok((_, Event::End(_))) => {
                if item.as_ref().is_some_and(|(d, _)| *d == depth) {
                    if let (Some((_, value)), Some(p)) = (item.take(), property.as_mut()) {
                        let value = value.trim();
                        if !value.is_empty() {
                            p.items.push(value.to_string());
                        }
                    }
                } else if description_depth.is_some_and(|d| d + 1 == depth) {
                    if let Some(p) = property.take() {
                        let value = if p.items.is_empty() {
                            p.text.trim().to_string()
                        } else {
                            p.items.join("; ")
                        };
                        if !value.is_empty() {
                            out.insert(normalize_key(&p.key).to_string(), value);
                        }
                    }
                } else if description_depth == Some(depth) {
                    description_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Err(e) => {
                debug!("stopped reading XMP packet: {e}");
                break;
            }
            _ => {}
        }
    }
    out
}

fn is_rdf(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == RDF_NS)
}

fn expanded_name(ns: &ResolveResult<'_>, local: &[u8]) -> String {
    let local = String::from_utf8_lossy(local);
    match ns {
        ResolveResult::Bound(Namespace(uri)) => {
            format!("{{{}}}{}", String::from_utf8_lossy(uri), local)
        }
        _ => local.into_owned(),
    }
}

/// Properties written in attribute form on `rdf:Description`.
fn collect_attributes(reader: &NsReader<&[u8]>, e: &BytesStart<'_>, out: &mut Metadata) {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let (ns, local) = reader.resolve_attribute(attr.key);
        if is_rdf(&ns) {
            continue;
        }
        let raw = String::from_utf8_lossy(attr.value.as_ref()).into_owned();
        let value = quick_xml::escape::unescape(&raw)
            .map(|v| v.into_owned())
            .unwrap_or(raw);
        let key = expanded_name(&ns, local.as_ref());
        if !value.trim().is_empty() {
            out.insert(normalize_key(&key).to_string(), value.trim().to_string());
        }
    }
}

fn push_text(
    property: &mut Option<Property>,
    item: &mut Option<(usize, String)>,
    description_depth: Option<usize>,
    depth: usize,
    text: &str,
) {
    match item {
        Some((item_depth, value)) if *item_depth == depth => value.push_str(text),
        Some(_) => {}
        None => {
            if let Some(p) = property.as_mut()
                && description_depth.is_some_and(|d| d + 1 == depth)
            {
                p.text.push_str(text);
            }
        }
    }
}

fn resolve_entity(name: &str) -> Option<String> {
    if let Some(code) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(code, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from);
    }
    if let Some(code) = name.strip_prefix('#') {
        return code.parse().ok().and_then(char::from_u32).map(String::from);
    }
    quick_xml::escape::resolve_predefined_entity(name).map(String::from)
}
