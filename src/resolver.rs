use std::{fmt, str::FromStr, time::Duration};

use anyhow::Context;
use tracing::{debug, info, warn};
use url::Url;

use crate::{identifier::Doi, record};

const USER_AGENT: &str = concat!("journaltk/", env!("CARGO_PKG_VERSION"));

/// Representation requested from the lookup services.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordFormat {
    /// BibTeX citation text.
    Bibtex,
    /// Crossref UNIXSD XML.
    Xml,
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported record format `{0}` (expected `bibtex` or `xml`)")]
pub struct UnsupportedFormat(pub String);

impl FromStr for RecordFormat {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bibtex" => Ok(RecordFormat::Bibtex),
            "xml" => Ok(RecordFormat::Xml),
            _ => Err(UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordFormat::Bibtex => "bibtex",
            RecordFormat::Xml => "xml",
        })
    }
}

impl RecordFormat {
    /// Whether a response body is usable for this format.
    ///
    /// BibTeX must parse into at least one record; XML is taken as is.
    fn accepts(self, body: &str) -> bool {
        match self {
            RecordFormat::Bibtex => !record::parse(body).is_empty(),
            RecordFormat::Xml => true,
        }
    }
}

/// One remote lookup service: a URL template with a `{doi}` placeholder and the media type to ask
/// for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    pub url_template: String,
    pub accept: &'static str,
}

impl Endpoint {
    pub fn url(&self, doi: &Doi) -> anyhow::Result<Url> {
        let url = self.url_template.replace("{doi}", &doi.url_path());
        Url::parse(&url).with_context(|| format!("invalid {} URL: {url}", self.name))
    }
}

/// Base URLs of the two services behind the three endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceUrls {
    pub doi_org: String,
    pub crossref: String,
}

impl Default for ServiceUrls {
    fn default() -> Self {
        ServiceUrls {
            doi_org: "http://dx.doi.org".to_string(),
            crossref: "http://api.crossref.org".to_string(),
        }
    }
}

/// HTTP GET with an `Accept` header. Any failure, including a non-2xx status, is an error.
pub trait Transport {
    fn get(&self, url: &Url, accept: &str) -> anyhow::Result<String>;
}

pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(connect_timeout))
            .timeout_global(Some(timeout))
            .build();
        HttpTransport {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url, accept: &str) -> anyhow::Result<String> {
        let body = self
            .agent
            .get(url.as_str())
            .header("Accept", accept)
            .header("User-Agent", USER_AGENT)
            .call()
            .with_context(|| format!("request to {url} failed"))?
            .into_body()
            .read_to_string()
            .with_context(|| format!("failed to read response body from {url}"))?;
        Ok(body)
    }
}

/// Resolves a DOI to raw record text by trying each endpoint for the format in order.
pub struct Resolver<T> {
    transport: T,
    bibtex: Vec<Endpoint>,
    xml: Vec<Endpoint>,
}

impl<T: Transport> Resolver<T> {
    pub fn new(transport: T, urls: &ServiceUrls) -> Self {
        let doi_org = urls.doi_org.trim_end_matches('/');
        let crossref = urls.crossref.trim_end_matches('/');
        Resolver {
            transport,
            // doi.org is authoritative but sometimes answers with a landing page; the Crossref
            // transform is only consulted when that happens.
            bibtex: vec![
                Endpoint {
                    name: "doi.org",
                    url_template: format!("{doi_org}/{{doi}}"),
                    accept: "application/x-bibtex",
                },
                Endpoint {
                    name: "crossref",
                    url_template: format!(
                        "{crossref}/works/{{doi}}/transform/application/x-bibtex"
                    ),
                    accept: "application/x-bibtex",
                },
            ],
            xml: vec![Endpoint {
                name: "crossref",
                url_template: format!(
                    "{crossref}/works/{{doi}}/transform/application/vnd.crossref.unixsd+xml"
                ),
                accept: "application/vnd.crossref.unixsd+xml",
            }],
        }
    }

    pub fn endpoints(&self, format: RecordFormat) -> &[Endpoint] {
        match format {
            RecordFormat::Bibtex => &self.bibtex,
            RecordFormat::Xml => &self.xml,
        }
    }

    /// Fetch the record for `doi`, or `None` once every endpoint has failed or answered with
    /// something unusable.
    pub fn resolve(&self, doi: &Doi, format: RecordFormat) -> Option<String> {
        for endpoint in self.endpoints(format) {
            let url = match endpoint.url(doi) {
                Ok(url) => url,
                Err(e) => {
                    warn!("{e:#}");
                    continue;
                }
            };
            debug!(endpoint = endpoint.name, %url, "querying");
            let body = match self.transport.get(&url, endpoint.accept) {
                Ok(body) => body,
                Err(e) => {
                    warn!(endpoint = endpoint.name, "{e:#}");
                    continue;
                }
            };
            if format.accepts(&body) {
                info!(endpoint = endpoint.name, %doi, "resolved {format} record");
                return Some(body);
            }
            debug!(
                endpoint = endpoint.name,
                "response is not a usable {format} record"
            );
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use super::*;

    const BIBTEX: &str = "@article{Smith_2023, title={T}, journal={Journal of Physics}, author={Smith, John}, year={2023}}";
    const LANDING_PAGE: &str = "<html><body>Choose a format</body></html>";

    #[derive(Default)]
    struct FakeTransport {
        responses: HashMap<String, anyhow::Result<String>>,
        calls: RefCell<Vec<(String, String)>>,
    }

    impl FakeTransport {
        fn respond(mut self, url: &str, body: &str) -> Self {
            self.responses.insert(url.to_string(), Ok(body.to_string()));
            self
        }

        fn fail(mut self, url: &str) -> Self {
            self.responses
                .insert(url.to_string(), Err(anyhow::anyhow!("connection refused")));
            self
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &Url, accept: &str) -> anyhow::Result<String> {
            self.calls
                .borrow_mut()
                .push((url.to_string(), accept.to_string()));
            match self.responses.get(url.as_str()) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(e)) => Err(anyhow::anyhow!("{e}")),
                None => Err(anyhow::anyhow!("404 Not Found")),
            }
        }
    }

    const DOI_ORG: &str = "http://dx.doi.org/10.1234/abcd";
    const CROSSREF_BIBTEX: &str =
        "http://api.crossref.org/works/10.1234/abcd/transform/application/x-bibtex";
    const CROSSREF_XML: &str =
        "http://api.crossref.org/works/10.1234/abcd/transform/application/vnd.crossref.unixsd+xml";

    fn doi() -> Doi {
        Doi::new("10.1234/abcd").unwrap()
    }

    fn resolver(transport: FakeTransport) -> Resolver<FakeTransport> {
        Resolver::new(transport, &ServiceUrls::default())
    }

    #[test]
    fn primary_answer_stops_the_search() {
        let r = resolver(
            FakeTransport::default()
                .respond(DOI_ORG, BIBTEX)
                .respond(CROSSREF_BIBTEX, BIBTEX),
        );
        assert_eq!(r.resolve(&doi(), RecordFormat::Bibtex).as_deref(), Some(BIBTEX));
        let calls = r.transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (DOI_ORG.to_string(), "application/x-bibtex".to_string()));
    }

    #[test]
    fn unparseable_primary_falls_back_to_crossref() {
        let r = resolver(
            FakeTransport::default()
                .respond(DOI_ORG, LANDING_PAGE)
                .respond(CROSSREF_BIBTEX, BIBTEX),
        );
        assert_eq!(r.resolve(&doi(), RecordFormat::Bibtex).as_deref(), Some(BIBTEX));
        assert_eq!(r.transport.calls.borrow().len(), 2);
    }

    #[test]
    fn transport_failure_falls_back_to_crossref() {
        let r = resolver(
            FakeTransport::default()
                .fail(DOI_ORG)
                .respond(CROSSREF_BIBTEX, BIBTEX),
        );
        assert_eq!(r.resolve(&doi(), RecordFormat::Bibtex).as_deref(), Some(BIBTEX));
    }

    #[test]
    fn exhausted_endpoints_yield_none() {
        let r = resolver(
            FakeTransport::default()
                .respond(DOI_ORG, LANDING_PAGE)
                .fail(CROSSREF_BIBTEX),
        );
        assert!(r.resolve(&doi(), RecordFormat::Bibtex).is_none());
        assert_eq!(r.transport.calls.borrow().len(), 2);
    }

    #[test]
    fn xml_is_returned_unvalidated() {
        let r = resolver(FakeTransport::default().respond(CROSSREF_XML, "not even xml"));
        assert_eq!(
            r.resolve(&doi(), RecordFormat::Xml).as_deref(),
            Some("not even xml")
        );
        let calls = r.transport.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "application/vnd.crossref.unixsd+xml");
    }

    #[test]
    fn xml_failure_yields_none() {
        let r = resolver(FakeTransport::default().fail(CROSSREF_XML));
        assert!(r.resolve(&doi(), RecordFormat::Xml).is_none());
    }

    #[test]
    fn custom_service_urls_are_used() {
        let urls = ServiceUrls {
            doi_org: "http://127.0.0.1:1234/".to_string(),
            crossref: "http://127.0.0.1:1234/crossref".to_string(),
        };
        let r = Resolver::new(FakeTransport::default(), &urls);
        let bibtex = r.endpoints(RecordFormat::Bibtex);
        assert_eq!(
            bibtex[0].url(&doi()).unwrap().as_str(),
            "http://127.0.0.1:1234/10.1234/abcd"
        );
        assert_eq!(
            bibtex[1].url(&doi()).unwrap().as_str(),
            "http://127.0.0.1:1234/crossref/works/10.1234/abcd/transform/application/x-bibtex"
        );
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("bibtex".parse::<RecordFormat>().unwrap(), RecordFormat::Bibtex);
        assert_eq!("XML".parse::<RecordFormat>().unwrap(), RecordFormat::Xml);
        let err = "json".parse::<RecordFormat>().unwrap_err();
        assert!(err.to_string().contains("unsupported record format `json`"));
        proptest::proptest!(|(s in "[a-z]{1,10}")| {
            proptest::prop_assume!(s != "bibtex" && s != "xml");
            proptest::prop_assert!(s.parse::<RecordFormat>().is_err());
        })
    }
}
