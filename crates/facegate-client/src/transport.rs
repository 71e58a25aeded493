//! Request transport: the seam between typed API calls and the wire.

use async_trait::async_trait;
use facegate_core::preview::SelectedFile;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// The request never completed (connection refused, DNS, TLS, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// A file field of a multipart body.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl FilePart {
    pub fn new(
        field: impl Into<String>,
        filename: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            field: field.into(),
            filename: filename.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_selected(field: impl Into<String>, file: &SelectedFile) -> Self {
        Self {
            field: field.into(),
            filename: file.name.clone(),
            mime: file.mime.clone(),
            bytes: Arc::clone(&file.bytes),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(Value),
    Multipart {
        text: Vec<(String, String)>,
        files: Vec<FilePart>,
    },
}

/// A request relative to the API base path (e.g. `/users`).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Body,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: Body::Empty,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: Body::Empty,
        }
    }

    pub fn post_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Body::Json(body),
        }
    }

    pub fn put_json(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            body: Body::Json(body),
        }
    }

    pub fn post_multipart(
        path: impl Into<String>,
        text: Vec<(String, String)>,
        files: Vec<FilePart>,
    ) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Body::Multipart { text, files },
        }
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. Only failures to complete the exchange are errors;
    /// any HTTP status is a successful send.
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;

    /// Absolute or root-relative API base, used to build links.
    fn api_base(&self) -> &str;
}

/// reqwest-backed transport against `<base_url>/api`.
pub struct HttpTransport {
    client: reqwest::Client,
    api_base: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("facegate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: format!("{}/api", base_url.trim_end_matches('/')),
        })
    }

    fn multipart_form(
        text: Vec<(String, String)>,
        files: Vec<FilePart>,
    ) -> Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in text {
            form = form.text(name, value);
        }
        for file in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                .file_name(file.filename)
                .mime_str(&file.mime)
                .map_err(|e| TransportError(format!("invalid MIME type {}: {e}", file.mime)))?;
            form = form.part(file.field, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.api_base, request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };
        let builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::Multipart { text, files } => builder.multipart(Self::multipart_form(text, files)?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?
            .to_vec();

        tracing::debug!(method = %request.method, url = %url, status, bytes = body.len(), "response received");
        Ok(RawResponse { status, body })
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_trims_slash() {
        let t = HttpTransport::new("http://127.0.0.1:5000/").unwrap();
        assert_eq!(t.api_base(), "http://127.0.0.1:5000/api");
    }

    #[test]
    fn test_file_part_shares_bytes() {
        let file = SelectedFile::new("a.png", "image/png", vec![1, 2, 3]);
        let part = FilePart::from_selected("file", &file);
        assert_eq!(part.filename, "a.png");
        assert!(Arc::ptr_eq(&part.bytes, &file.bytes));
    }

    #[test]
    fn test_success_range() {
        let ok = RawResponse {
            status: 201,
            body: vec![],
        };
        let bad = RawResponse {
            status: 404,
            body: vec![],
        };
        assert!(ok.is_success());
        assert!(!bad.is_success());
    }
}
