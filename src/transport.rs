//! CCU REST transport
//!
//! Handles all HTTP communication with the CCU's REST interface. Resource
//! paths are sequences of segments relative to the configured base URL,
//! e.g. `["device", "ABC1234567", "1", "STATE", "~pv"]`.

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde_json::Value;

use crate::configuration::Configuration;
use crate::error::TransportError;

/// Suffix addressing the current value of a parameter, program or variable.
pub const PV: &str = "~pv";

/// Resource fetches and writes against the CCU.
///
/// Implementations block until the call completes and never retry.
pub trait Transport {
    /// GET a resource and return its parsed JSON body.
    fn fetch(&self, path: &[&str]) -> Result<Value, TransportError>;

    /// PUT a JSON payload to a resource.
    ///
    /// Returns whether the controller confirmed the write. Non-success
    /// statuses and connection failures are errors, not `false`.
    fn send(&self, path: &[&str], payload: &Value) -> Result<bool, TransportError>;

    /// The absolute URL a path resolves to, for diagnostics.
    fn url(&self, path: &[&str]) -> String;
}

/// Blocking HTTP transport built on `reqwest`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &Configuration) -> Result<Self, TransportError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|err| TransportError::InvalidUrl {
            url: base_url.clone(),
            reason: err.to_string(),
        })?;

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(format!("hmip/{}", env!("CARGO_PKG_VERSION")));

        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|source| TransportError::Request {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    fn check_status(&self, response: Response, url: &str) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().unwrap_or_default();
        if !body.is_empty() {
            log::debug!("HTTP {} from {}: {}", status, url, body);
        }
        Err(TransportError::Status {
            code: status.as_u16(),
            url: url.to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, path: &[&str]) -> Result<Value, TransportError> {
        let url = self.url(path);
        log::debug!("GET {}", url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?;
        let response = self.check_status(response, &url)?;

        let text = response.text().map_err(|source| TransportError::Request {
            url: url.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TransportError::Malformed { url, source })
    }

    fn send(&self, path: &[&str], payload: &Value) -> Result<bool, TransportError> {
        let url = self.url(path);
        log::debug!("PUT {} {}", url, payload);

        let response = self
            .authorize(self.client.put(&url))
            .json(payload)
            .send()
            .map_err(|source| TransportError::Request {
                url: url.clone(),
                source,
            })?;
        let response = self.check_status(response, &url)?;

        // 202 and friends mean "queued", not "applied".
        Ok(matches!(
            response.status(),
            StatusCode::OK | StatusCode::NO_CONTENT
        ))
    }

    fn url(&self, path: &[&str]) -> String {
        let segments: Vec<_> = path
            .iter()
            .map(|segment| urlencoding::encode(segment))
            .collect();
        format!("{}/{}", self.base_url, segments.join("/"))
    }
}
