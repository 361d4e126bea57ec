//! Blocking HTTP plumbing shared by the scraping, feed, Data API and assistant
//! calls.
//!
//! Every upstream primitive reports a [`Fetched`] value instead of an error so
//! the fallback chains can branch on what happened.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const BROWSER_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("could not read response body: {0}")]
    Body(String),
    #[error("malformed payload: {0}")]
    Parse(String),
}

/// Result of one upstream lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Found(T),
    Empty,
    Failed(FetchError),
}

impl<T> Fetched<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Fetched::Found(value) => Some(value),
            Fetched::Empty | Fetched::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Fetched::Found(_))
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Fetched<U>) -> Fetched<U> {
        match self {
            Fetched::Found(value) => f(value),
            Fetched::Empty => Fetched::Empty,
            Fetched::Failed(err) => Fetched::Failed(err),
        }
    }
}

impl<T> From<Option<T>> for Fetched<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Fetched::Empty, Fetched::Found)
    }
}

/// Outgoing GET/POST description. Query pairs are URL-encoded by the client.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub query: Vec<(&'static str, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }

    pub fn header(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((key, value.into()));
        self
    }

    /// Adds the header set a desktop browser would send; channel pages and
    /// the feed serve consent walls or trimmed markup without it.
    pub fn browser_headers(self) -> Self {
        self.header("User-Agent", BROWSER_USER_AGENT)
            .header("Accept-Language", BROWSER_ACCEPT_LANGUAGE)
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Turns any non-200 reply into a [`FetchError::Status`].
    pub fn into_ok_body(self) -> Result<String, FetchError> {
        if self.is_ok() {
            Ok(self.body)
        } else {
            Err(FetchError::Status(self.status))
        }
    }
}

/// Minimal client surface. Non-2xx replies come back as `Ok` with their status
/// so callers decide whether a status is a miss; only transport and body
/// failures are errors.
pub trait HttpClient {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError>;

    fn post_json(&self, request: &HttpRequest, body: &Value) -> Result<HttpResponse, FetchError>;
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        (**self).get(request)
    }

    fn post_json(&self, request: &HttpRequest, body: &Value) -> Result<HttpResponse, FetchError> {
        (**self).post_json(request, body)
    }
}

/// Production client backed by a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
}

impl UreqClient {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .build();
        Self { agent }
    }

    fn prepare(&self, method: &str, request: &HttpRequest) -> ureq::Request {
        let mut prepared = self
            .agent
            .request(method, &request.url)
            .timeout(request.timeout);
        for (key, value) in &request.query {
            prepared = prepared.query(key, value);
        }
        for (key, value) in &request.headers {
            prepared = prepared.set(key, value);
        }
        prepared
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for UreqClient {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, FetchError> {
        read_response(self.prepare("GET", request).call())
    }

    fn post_json(&self, request: &HttpRequest, body: &Value) -> Result<HttpResponse, FetchError> {
        read_response(self.prepare("POST", request).send_json(body))
    }
}

fn read_response(result: Result<ureq::Response, ureq::Error>) -> Result<HttpResponse, FetchError> {
    match result {
        Ok(response) => {
            let status = response.status();
            let body = response
                .into_string()
                .map_err(|err| FetchError::Body(err.to_string()))?;
            Ok(HttpResponse { status, body })
        }
        Err(ureq::Error::Status(status, response)) => Ok(HttpResponse {
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(transport)) => Err(FetchError::Transport(transport.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_headers_are_attached() {
        let request = HttpRequest::get("https://example.com", Duration::from_secs(1))
            .browser_headers()
            .query("channel_id", "abc");
        assert!(request
            .headers
            .iter()
            .any(|(key, value)| *key == "User-Agent" && value.contains("Mozilla")));
        assert_eq!(request.query_value("channel_id"), Some("abc"));
        assert_eq!(request.query_value("missing"), None);
    }

    #[test]
    fn non_ok_status_becomes_error() {
        let response = HttpResponse {
            status: 404,
            body: "nope".into(),
        };
        assert_eq!(response.into_ok_body(), Err(FetchError::Status(404)));
        assert_eq!(HttpResponse::ok("hi").into_ok_body(), Ok("hi".to_string()));
    }

    #[test]
    fn fetched_combinators() {
        let found: Fetched<u8> = Some(3).into();
        assert!(found.is_found());
        assert_eq!(found.clone().and_then(|v| Fetched::Found(v * 2)), Fetched::Found(6));
        let empty: Fetched<u8> = None.into();
        assert_eq!(empty.found(), None);
        let failed: Fetched<u8> = Fetched::Failed(FetchError::Status(500));
        assert_eq!(failed.and_then(|v| Fetched::Found(v)), Fetched::Failed(FetchError::Status(500)));
    }
}
