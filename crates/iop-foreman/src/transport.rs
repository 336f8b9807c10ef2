//! ---
//! iop_section: "04-management-api"
//! iop_subsection: "module"
//! iop_type: "source"
//! iop_scope: "code"
//! iop_description: "HTTP transport seam for the management API."
//! iop_version: "v0.1.0"
//! iop_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, HOST};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{ApiError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully routed API request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Absolute path, e.g. `/katello/api/products/7`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Sends routed requests and returns the decoded JSON body.
///
/// Error statuses map to [`ApiError::Status`]; an empty body decodes to `null`.
pub trait ApiTransport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> Result<Value>;
}

/// Connection settings for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Scheme and authority the requests are sent to, e.g. `https://192.168.121.17`.
    pub base_uri: String,
    /// Virtual host presented in the `Host` header, when it differs from the base URI.
    pub host_header: Option<String>,
    pub username: String,
    pub password: String,
    pub verify_tls: bool,
    pub timeout: Duration,
}

/// Blocking reqwest transport with basic authentication.
pub struct HttpTransport {
    client: Client,
    base: Url,
    username: String,
    password: String,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base", &self.base.as_str())
            .field("username", &self.username)
            .finish()
    }
}

impl HttpTransport {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let base = Url::parse(&settings.base_uri).map_err(|source| ApiError::InvalidUri {
            uri: settings.base_uri.clone(),
            source,
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(host) = &settings.host_header {
            let value =
                HeaderValue::from_str(host).map_err(|_| ApiError::InvalidHeader(host.clone()))?;
            headers.insert(HOST, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .timeout(settings.timeout)
            .build()
            .map_err(ApiError::Client)?;

        Ok(Self {
            client,
            base,
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        self.base.join(path).map_err(|source| ApiError::InvalidUri {
            uri: path.to_owned(),
            source,
        })
    }
}

impl ApiTransport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<Value> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };
        let mut builder = self
            .client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let http_error = |source| ApiError::Http {
            method: request.method.as_str(),
            path: request.path.clone(),
            source,
        };
        let response = builder.send().map_err(http_error)?;
        let status = response.status();
        let text = response.text().map_err(http_error)?;
        debug!(method = %request.method, path = %request.path, status = status.as_u16(), "api call finished");

        if !status.is_success() {
            return Err(ApiError::Status {
                method: request.method.as_str(),
                path: request.path.clone(),
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            path: request.path.clone(),
            source,
        })
    }
}
