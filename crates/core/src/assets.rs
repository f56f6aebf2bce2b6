//! Paginated enumeration of a remote repository's assets.
//!
//! The search endpoint returns one page at a time together with an opaque
//! continuation token. [`enumerate_assets`] keeps requesting pages until the
//! token comes back empty and returns everything in page-then-item order.
//! There is no page ceiling: a server that never stops handing out tokens
//! keeps the loop going.

use std::future::Future;

use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::errors::{EnumerationError, TransportError};
use crate::transport::{diagnostic_body, response_bytes, Transport};

/// One artifact stored in the remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    pub path: String,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<Asset>,

    /// `None`, null and `""` all mean there are no further pages.
    #[serde(rename = "continuationToken", default)]
    pub continuation_token: Option<String>,
}

impl SearchPage {
    /// Token for the next request, if any.
    pub fn next_token(&self) -> Option<&str> {
        self.continuation_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Anything that can hand out search pages.
pub trait PageSource {
    fn fetch_page(
        &self,
        token: Option<&str>,
    ) -> impl Future<Output = Result<SearchPage, EnumerationError>> + Send;
}

/// Search endpoint of a repository manager.
pub struct SearchClient {
    transport: Transport,
    base_url: String,
    repo_name: String,
}

impl SearchClient {
    pub fn new(
        transport: Transport,
        base_url: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repo_name: repo_name.into(),
        }
    }

    /// URL of the page following `token`.
    pub fn page_url(&self, token: Option<&str>) -> Result<String, TransportError> {
        let raw = format!("{}/service/rest/v1/search/assets", self.base_url);
        let mut url = Url::parse(&raw).map_err(|e| TransportError::InvalidUrl {
            url: raw.clone(),
            detail: e.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("repository", &self.repo_name);
            if let Some(token) = token {
                query.append_pair("continuationToken", token);
            }
        }
        Ok(url.to_string())
    }
}

impl PageSource for SearchClient {
    async fn fetch_page(&self, token: Option<&str>) -> Result<SearchPage, EnumerationError> {
        let url = self.page_url(token)?;
        let resp = self.transport.get(&url).await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(EnumerationError::Status {
                status: status.as_u16(),
                body: diagnostic_body(resp).await,
            });
        }

        let body = response_bytes(resp).await?;
        serde_json::from_slice(&body).map_err(|e| EnumerationError::Decode(e.to_string()))
    }
}

/// Collect every asset the source reports, failing on the first bad page.
#[instrument(skip(source))]
pub async fn enumerate_assets<S: PageSource>(source: &S) -> Result<Vec<Asset>, EnumerationError> {
    let mut assets = Vec::new();
    let mut token: Option<String> = None;
    let mut page_no = 0usize;

    loop {
        page_no += 1;
        let page = source.fetch_page(token.as_deref()).await?;
        let next = page.next_token().map(str::to_string);
        debug!(
            page = page_no,
            items = page.items.len(),
            has_more = next.is_some(),
            "fetched asset page"
        );
        assets.extend(page.items);

        match next {
            Some(t) => token = Some(t),
            None => break,
        }
    }

    info!(assets = assets.len(), pages = page_no, "asset enumeration complete");
    Ok(assets)
}
