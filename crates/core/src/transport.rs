//! Authenticated HTTP transport for the repository manager.
//!
//! One [`Transport`] is shared by all workers of a run. It builds a single
//! request (method, URL, body, optional Basic credentials), applies the
//! fixed request timeout and returns the raw response. Status codes are left
//! for the caller to interpret, and nothing is retried.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::{Body, Method, Request, Response, Url};
use tracing::{debug, instrument};

use crate::config::Credentials;
use crate::errors::{ConfigError, TransportError};

/// Upper bound on a single request, connection included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Content type used for raw PUT uploads.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Body of an outgoing request.
pub enum RequestBody {
    Empty,
    /// A single body with an explicit content type; may be a stream.
    Raw {
        content_type: &'static str,
        body: Body,
    },
    /// `multipart/form-data`; the boundary content type is set by reqwest.
    Multipart(Form),
}

/// Shared HTTP client plus the run's credentials.
#[derive(Clone)]
pub struct Transport {
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

impl Transport {
    pub fn new(credentials: Option<Credentials>) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("nxtransfer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        debug!(
            authenticated = credentials.is_some(),
            "created HTTP transport"
        );
        Ok(Self { http, credentials })
    }

    /// Build the request without sending it.
    pub fn build(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
    ) -> Result<Request, TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl {
            url: url.to_string(),
            detail: e.to_string(),
        })?;

        let mut req = self
            .http
            .request(method.clone(), parsed)
            .timeout(REQUEST_TIMEOUT);
        req = match body {
            RequestBody::Empty => req,
            RequestBody::Raw { content_type, body } => {
                req.header(CONTENT_TYPE, content_type).body(body)
            }
            RequestBody::Multipart(form) => req.multipart(form),
        };
        if let Some(creds) = &self.credentials {
            req = req.basic_auth(&creds.username, Some(&creds.password));
        }

        req.build().map_err(|source| TransportError::Request {
            method: method.to_string(),
            url: url.to_string(),
            source,
        })
    }

    /// Send one request and return whatever the server answered.
    #[instrument(skip(self, body))]
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
    ) -> Result<Response, TransportError> {
        let request = self.build(method.clone(), url, body)?;
        let resp = self
            .http
            .execute(request)
            .await
            .map_err(|source| TransportError::Request {
                method: method.to_string(),
                url: url.to_string(),
                source,
            })?;
        debug!(status = %resp.status(), "response received");
        Ok(resp)
    }

    pub async fn get(&self, url: &str) -> Result<Response, TransportError> {
        self.execute(Method::GET, url, RequestBody::Empty).await
    }
}

/// Read a response body as bytes.
pub async fn response_bytes(resp: Response) -> Result<Vec<u8>, TransportError> {
    let url = resp.url().to_string();
    resp.bytes()
        .await
        .map(|b| b.to_vec())
        .map_err(|source| TransportError::Body { url, source })
}

/// Best-effort body text for diagnostics; empty or unreadable bodies yield
/// `None`.
pub async fn diagnostic_body(resp: Response) -> Option<String> {
    match resp.text().await {
        Ok(text) if !text.trim().is_empty() => Some(text),
        _ => None,
    }
}
