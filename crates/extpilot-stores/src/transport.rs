//! HTTP transport contract
//!
//! Adapters talk to the stores through [`HttpTransport`] so the request
//! sequencing can be exercised without a network. [`ReqwestTransport`] is
//! the production implementation.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::ops::Deref;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default cap on response bodies read from a store
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => write!(f, "GET"),
            HttpMethod::Post => write!(f, "POST"),
            HttpMethod::Put => write!(f, "PUT"),
            HttpMethod::Patch => write!(f, "PATCH"),
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body at all
    Empty,
    /// Raw bytes, optionally with a content type
    Bytes {
        content_type: Option<String>,
        data: Vec<u8>,
    },
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    /// Single-file `multipart/form-data` upload
    Multipart {
        field: String,
        file_name: String,
        data: Vec<u8>,
    },
}

/// HTTP request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: RequestBody::Empty,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the `Authorization` header to a ready-made value
    pub fn authorization(self, value: impl Into<String>) -> Self {
        self.header("Authorization", value)
    }

    pub fn bytes(mut self, content_type: Option<&str>, data: Vec<u8>) -> Self {
        self.body = RequestBody::Bytes {
            content_type: content_type.map(str::to_string),
            data,
        };
        self
    }

    pub fn form<K: Into<String>, V: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        self.body = RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn multipart(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.body = RequestBody::Multipart {
            field: field.into(),
            file_name: file_name.into(),
            data,
        };
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Header lookup, case-insensitive
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Decode the body as JSON and keep the text alongside
    pub fn reply<T: DeserializeOwned>(&self) -> Result<Reply<T>> {
        let body = self.text();
        Ok(Reply {
            value: serde_json::from_str(&body)?,
            body,
        })
    }

    /// Response body as (lossy) UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Fail with [`StoreError::ApiError`] unless the status is one of `expected`
    pub fn expect_status(self, expected: &[u16]) -> Result<Self> {
        if expected.contains(&self.status) {
            Ok(self)
        } else {
            Err(StoreError::api(self.status, &self.body))
        }
    }
}

/// Decoded response plus the body it was decoded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply<T> {
    pub value: T,
    pub body: String,
}

impl<T> Deref for Reply<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Async HTTP transport
///
/// Implementations perform exactly one round trip per call; retries and
/// polling live above this layer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute an HTTP request
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_response_bytes: usize,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_limit(DEFAULT_MAX_RESPONSE_BYTES)
    }

    pub fn with_limit(max_response_bytes: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("extpilot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            max_response_bytes,
        })
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("Making {} request to {}", request.method, request.url);

        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            // Google answers 411 to a bodiless POST without Content-Length
            RequestBody::Empty if request.method != HttpMethod::Get => builder.body(Vec::new()),
            RequestBody::Empty => builder,
            RequestBody::Bytes { content_type, data } => {
                let builder = match content_type {
                    Some(ct) => builder.header("Content-Type", ct),
                    None => builder,
                };
                builder.body(data)
            }
            RequestBody::Form(fields) => builder.form(&fields),
            RequestBody::Multipart {
                field,
                file_name,
                data,
            } => {
                let part = reqwest::multipart::Part::bytes(data).file_name(file_name);
                builder.multipart(reqwest::multipart::Form::new().part(field, part))
            }
        };

        let mut response = builder.send().await?;
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(StoreError::Transport(format!(
                    "response from {} exceeds {} bytes",
                    request.url, self.max_response_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(status, bytes = body.len(), "Received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Append path segments to a base URL
///
/// Segments may contain `/`; empty pieces are dropped so that joining
/// `"v1/products/"` and `"abc"` never yields a double slash. Set
/// `trailing_slash` for endpoints that require one.
pub fn join_url(base: &Url, segments: &[&str], trailing_slash: bool) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|_| {
            StoreError::ConfigurationError(format!("{} cannot be a base URL", base))
        })?;
        path.pop_if_empty();
        for segment in segments {
            path.extend(segment.split('/').filter(|s| !s.is_empty()));
        }
        if trailing_slash {
            path.push("");
        }
    }
    Ok(url)
}

/// Parse a configured base URL
pub fn parse_base_url(raw: &str) -> Result<Url> {
    Url::parse(raw)
        .map_err(|e| StoreError::ConfigurationError(format!("invalid URL {}: {}", raw, e)))
}
