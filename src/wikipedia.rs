//! Wikipedia adapters: MediaWiki plain-text extracts and REST page summaries.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use url::Url;

use crate::error::{Result, RetrievalError};
use crate::source::{ContentSource, Page, SummarySource};
use crate::transport::{build_client, send_json};

const SERVICE: &str = "wikipedia";

/// Default MediaWiki Action API endpoint.
pub const DEFAULT_ACTION_API: &str = "https://en.wikipedia.org/w/api.php";
/// Default REST API base (the summary endpoint lives under `/page/summary/`).
pub const DEFAULT_REST_API: &str = "https://en.wikipedia.org/api/rest_v1";

/// Blocking Wikipedia client implementing both encyclopedia seams.
#[derive(Clone)]
pub struct WikipediaClient {
    client: Client,
    action_api: Url,
    rest_api: Url,
    timeout: Duration,
}

impl WikipediaClient {
    /// Builds a client; `timeout` bounds page-content requests.
    pub fn new(action_api: &str, rest_api: &str, timeout: Duration) -> Result<Self> {
        let action_api = parse_base(action_api)?;
        let rest_api = parse_base(rest_api)?;
        let client = build_client(SERVICE, timeout, HeaderMap::new())?;
        Ok(Self {
            client,
            action_api,
            rest_api,
            timeout,
        })
    }

    fn extracts_url(&self, title: &str) -> Url {
        let mut url = self.action_api.clone();
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("format", "json")
            .append_pair("formatversion", "2")
            .append_pair("prop", "extracts")
            .append_pair("explaintext", "1")
            .append_pair("redirects", "1")
            .append_pair("titles", title);
        url
    }

    fn summary_url(&self, title: &str) -> Result<Url> {
        let slug = title.replace(' ', "_");
        let mut url = self.rest_api.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RetrievalError::Configuration(format!(
                    "REST base {} cannot carry path segments",
                    self.rest_api
                ))
            })?
            .pop_if_empty()
            .extend(["page", "summary", slug.as_str()]);
        Ok(url)
    }
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|err| RetrievalError::Configuration(format!("invalid Wikipedia URL {raw}: {err}")))
}

impl ContentSource for WikipediaClient {
    fn fetch_page_content(&self, title: &str) -> Result<Page> {
        let response: ExtractsResponse = send_json(
            SERVICE,
            self.timeout,
            self.client.get(self.extracts_url(title)),
        )?;
        page_from_extracts(title, response)
    }
}

impl SummarySource for WikipediaClient {
    fn fetch_summary(&self, title: &str, timeout: Duration) -> Result<String> {
        let url = self.summary_url(title)?;
        let response: SummaryResponse =
            send_json(SERVICE, timeout, self.client.get(url).timeout(timeout))?;
        response.extract.ok_or_else(|| RetrievalError::Decode {
            service: SERVICE,
            message: format!("summary for {title} has no extract"),
        })
    }
}

fn page_from_extracts(requested: &str, response: ExtractsResponse) -> Result<Page> {
    let page = response
        .query
        .and_then(|query| query.pages.into_iter().next())
        .ok_or_else(|| RetrievalError::NotFound(requested.to_string()))?;
    if page.missing || page.invalid {
        return Err(RetrievalError::NotFound(requested.to_string()));
    }
    Ok(Page {
        title: page.title.unwrap_or_else(|| requested.to_string()),
        raw_text: page.extract.unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct ExtractsResponse {
    query: Option<ExtractsQuery>,
}

#[derive(Debug, Deserialize)]
struct ExtractsQuery {
    #[serde(default)]
    pages: Vec<ExtractsPage>,
}

#[derive(Debug, Deserialize)]
struct ExtractsPage {
    title: Option<String>,
    extract: Option<String>,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    invalid: bool,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    extract: Option<String>,
}
