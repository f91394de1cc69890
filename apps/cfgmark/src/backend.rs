//! Server operations over the document: validate, apply and version history.
//!
//! `Backend` is the seam the workflow talks to. `HttpBackend` is the
//! production implementation; tests script their own.

use crate::models::version::VersionDocument;
use crate::models::{ConfigurationVersion, Finding};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidateMode {
    #[default]
    Persist,
    /// Same response shape, nothing is stored server-side.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Option<Vec<Finding>>,
}

impl ValidateResponse {
    pub fn findings(&self) -> &[Finding] {
        self.errors.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub applied_version: ConfigurationVersion,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    Request(String),
}

/// Message and optional findings recovered from an error body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub message: String,
    pub findings: Vec<Finding>,
}

/// Best-effort extraction of a structured error body.
///
/// Accepts `{"message"|"error"|"detail": ..., "errors": [...]}`; anything
/// else yields the raw text as the message.
pub fn unwrap_error_payload(raw: &str) -> ErrorPayload {
    let fallback = || ErrorPayload {
        message: raw.trim().to_string(),
        findings: Vec::new(),
    };
    let json: Json = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return fallback(),
    };
    let Some(obj) = json.as_object() else {
        return fallback();
    };
    let message = ["message", "error", "detail"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Json::as_str))
        .map(str::to_string);
    let findings: Vec<Finding> = obj
        .get("errors")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();
    match message {
        Some(message) => ErrorPayload { message, findings },
        None if !findings.is_empty() => ErrorPayload {
            message: format!("{} validation error(s)", findings.len()),
            findings,
        },
        None => fallback(),
    }
}

impl BackendError {
    /// Unwrapped payload for server errors, raw text otherwise.
    pub fn payload(&self) -> ErrorPayload {
        match self {
            BackendError::Server { status, body } => {
                let mut p = unwrap_error_payload(body);
                if p.message.is_empty() {
                    p.message = format!("server returned {}", status);
                }
                p
            }
            other => ErrorPayload {
                message: other.to_string(),
                findings: Vec::new(),
            },
        }
    }

    pub fn user_message(&self) -> String {
        self.payload().message
    }
}

/// Operations the server exposes over the document.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn validate(&self, text: &str, mode: ValidateMode)
        -> Result<ValidateResponse, BackendError>;
    async fn apply(&self, text: &str) -> Result<ApplyResponse, BackendError>;
    /// Order is not guaranteed.
    async fn list_versions(&self) -> Result<Vec<ConfigurationVersion>, BackendError>;
    async fn get_version(&self, id: &str) -> Result<VersionDocument, BackendError>;
}

#[derive(Serialize)]
struct ContentBody<'a> {
    content: &'a str,
}

/// JSON-over-HTTP backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::with_client(base, client)
    }

    pub fn with_client(base: &str, client: reqwest::Client) -> Result<Self, BackendError> {
        let base = Url::parse(base)
            .map_err(|e| BackendError::Request(format!("server url '{}': {}", base, e)))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Request(format!(
                "server url '{}' cannot hold a path",
                base
            )));
        }
        Ok(Self { base, client })
    }

    /// `{base}/api/config/{segments..}`; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, BackendError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(BackendError::Request(format!("invalid path segment '{}'", bad)));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Request(format!("server url '{}'", self.base)))?
            .pop_if_empty()
            .extend(["api", "config"])
            .extend(segments);
        Ok(url)
    }

    async fn read<T: serde::de::DeserializeOwned>(
        resp: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<T, BackendError> {
        let resp = resp.map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(BackendError::Server {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

impl Backend for HttpBackend {
    async fn validate(
        &self,
        text: &str,
        mode: ValidateMode,
    ) -> Result<ValidateResponse, BackendError> {
        let mut url = self.url(&["validate"])?;
        if mode == ValidateMode::DryRun {
            url.query_pairs_mut().append_pair("dryRun", "true");
        }
        debug!(%url, bytes = text.len(), "validate");
        let resp = self
            .client
            .post(url)
            .json(&ContentBody { content: text })
            .send()
            .await;
        Self::read(resp).await
    }

    async fn apply(&self, text: &str) -> Result<ApplyResponse, BackendError> {
        let url = self.url(&["apply"])?;
        debug!(%url, bytes = text.len(), "apply");
        let resp = self
            .client
            .post(url)
            .json(&ContentBody { content: text })
            .send()
            .await;
        Self::read(resp).await
    }

    async fn list_versions(&self) -> Result<Vec<ConfigurationVersion>, BackendError> {
        let resp = self.client.get(self.url(&["versions"])?).send().await;
        Self::read(resp).await
    }

    async fn get_version(&self, id: &str) -> Result<VersionDocument, BackendError> {
        let resp = self
            .client
            .get(self.url(&["versions", id])?)
            .send()
            .await;
        Self::read(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_unwrap_structured_payload() {
        let body = r#"{"message": "rejected", "errors": [{"message": "bad url", "path": "targets[0].url"}]}"#;
        let p = unwrap_error_payload(body);
        assert_eq!(p.message, "rejected");
        assert_eq!(p.findings.len(), 1);
        assert_eq!(p.findings[0].message, "bad url");
    }

    #[test]
    fn test_unwrap_alternate_keys_and_findings_only() {
        assert_eq!(unwrap_error_payload(r#"{"error": "nope"}"#).message, "nope");
        let p = unwrap_error_payload(r#"{"errors": [{"message": "a"}, {"message": "b"}]}"#);
        assert_eq!(p.message, "2 validation error(s)");
        assert_eq!(p.findings.len(), 2);
    }

    #[test]
    fn test_unwrap_falls_back_to_raw_text() {
        assert_eq!(
            unwrap_error_payload("502 Bad Gateway\n").message,
            "502 Bad Gateway"
        );
        assert_eq!(unwrap_error_payload("[1,2]").message, "[1,2]");
        let p = unwrap_error_payload(r#"{"message": 5, "errors": "x"}"#);
        assert_eq!(p.message, r#"{"message": 5, "errors": "x"}"#);
        assert!(p.findings.is_empty());
    }

    #[test]
    fn test_backend_error_user_message() {
        let e = BackendError::Server {
            status: 422,
            body: r#"{"detail": "schema mismatch"}"#.into(),
        };
        assert_eq!(e.user_message(), "schema mismatch");
        let e = BackendError::Server {
            status: 500,
            body: String::new(),
        };
        assert_eq!(e.user_message(), "server returned 500");
        let e = BackendError::Transport("connection refused".into());
        assert_eq!(e.user_message(), "transport error: connection refused");
    }

    #[test]
    fn test_validate_response_without_errors() {
        let r: ValidateResponse = serde_json::from_str(r#"{"isValid": true}"#).unwrap();
        assert!(r.is_valid);
        assert!(r.findings().is_empty());
    }

    #[test]
    fn test_http_backend_builds_urls() {
        let b = HttpBackend::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            b.url(&["versions"]).unwrap().as_str(),
            "http://localhost:8080/api/config/versions"
        );
        let b = HttpBackend::new("http://monitor/ops/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            b.url(&["versions", "a/b?c"]).unwrap().path(),
            "/ops/api/config/versions/a%2Fb%3Fc"
        );
        assert!(matches!(
            b.url(&["versions", ".."]),
            Err(BackendError::Request(_))
        ));
        assert!(matches!(
            HttpBackend::new("not a url", Duration::from_secs(1)),
            Err(BackendError::Request(_))
        ));
    }

    /// Serve one canned reply on a local port; the handle yields the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let head_end = loop {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break buf.len();
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let len = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + len {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let reply = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(reply.as_bytes()).unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (base, handle)
    }

    fn local(base: &str) -> HttpBackend {
        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpBackend::with_client(base, client).unwrap()
    }

    #[tokio::test]
    async fn test_http_dry_run_posts_content_with_query() {
        let (base, server) = serve_once("200 OK", r#"{"isValid": true}"#);
        let b = local(&base);
        let resp = b.validate("targets: []\n", ValidateMode::DryRun).await.unwrap();
        assert!(resp.is_valid);
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/config/validate?dryRun=true HTTP/1.1"));
        assert!(request.ends_with(r#"{"content":"targets: []\n"}"#));
    }

    #[tokio::test]
    async fn test_http_error_status_maps_to_server() {
        let (base, server) = serve_once(
            "422 Unprocessable Entity",
            r#"{"message": "unsupported scheme"}"#,
        );
        let b = local(&base);
        let err = b.apply("targets: []\n").await.unwrap_err();
        assert_eq!(
            err,
            BackendError::Server {
                status: 422,
                body: r#"{"message": "unsupported scheme"}"#.into(),
            }
        );
        assert_eq!(err.user_message(), "unsupported scheme");
        assert!(server.join().unwrap().starts_with("POST /api/config/apply HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_http_wrong_shape_maps_to_decode() {
        let (base, server) = serve_once("200 OK", r#"{"versions": []}"#);
        let b = local(&base);
        let err = b.list_versions().await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)), "{:?}", err);
        assert!(server.join().unwrap().starts_with("GET /api/config/versions HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_http_refused_connection_maps_to_transport() {
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let b = local(&format!("http://127.0.0.1:{}", port));
        let err = b.get_version("v1").await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)), "{:?}", err);
    }
}
