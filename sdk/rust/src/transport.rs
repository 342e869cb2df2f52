//! GraphQL-over-HTTP transport.
//!
//! The [`Transport`] trait is the seam between the SDK and the network. The
//! bundled [`HttpTransport`] speaks plain HTTP/1.1 over a TCP socket and
//! applies the configured retry policy; tests and applications can supply
//! their own implementation.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ErrorCode, ResultExt, SdkError, SdkResult};
use crate::retry::RetryDecision;

/// A GraphQL request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    pub query: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Value>,
}

impl Request {
    pub fn new(query: impl Into<String>, variables: IndexMap<String, Value>) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// A GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
    /// Hasura reports some request-level failures under a single `error` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl Response {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            errors: Some(errors),
            ..Default::default()
        }
    }

    /// Returns the `data` of a successful response.
    ///
    /// Any reported error fails the whole response; partial data is dropped.
    pub fn into_data(self) -> SdkResult<Value> {
        if let Some(errors) = self.errors.filter(|errors| !errors.is_empty()) {
            return Err(SdkError::graphql(errors));
        }
        if let Some(error) = self.error {
            let message = match &error {
                Value::String(message) => message.clone(),
                Value::Object(object) => object
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| error.to_string(), ToString::to_string),
                other => other.to_string(),
            };
            return Err(SdkError::graphql(vec![GraphQLError::new(message)]));
        }
        match self.data {
            Some(Value::Null) | None => Err(SdkError::new(
                ErrorCode::InvalidResponse,
                "No data in response",
            )),
            Some(data) => Ok(data),
        }
    }
}

/// A GraphQL error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<IndexMap<String, Value>>,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            extensions: None,
        }
    }
}

/// Executes GraphQL requests against an endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &Request) -> SdkResult<Response>;

    /// Executes a request on a dedicated current-thread runtime.
    ///
    /// Must not be called from within an async runtime.
    fn execute_blocking(&self, request: &Request) -> SdkResult<Response> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SdkError::network(format!("Failed to start runtime: {e}")))?;
        runtime.block_on(self.execute(request))
    }
}

/// HTTP transport over plain TCP sockets.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    async fn post(&self, body: &str) -> SdkResult<Response> {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpStream;
        use tokio::time::timeout;

        let (host, port, path) = parse_url(&self.config.url)?;

        let connect_future = TcpStream::connect(format!("{host}:{port}"));
        let mut stream = timeout(self.config.timeout, connect_future)
            .await
            .map_err(|_| SdkError::timeout())?
            .map_err(|e| {
                SdkError::new(
                    ErrorCode::ConnectionRefused,
                    format!("Connection failed: {e}"),
                )
            })?;

        let mut request = format!(
            "POST {path} HTTP/1.1\r\n\
             Host: {host}\r\n\
             Content-Type: application/json\r\n\
             Accept: application/json\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n",
            body.len()
        );
        for (key, value) in &self.config.headers {
            request.push_str(&format!("{key}: {value}\r\n"));
        }
        request.push_str("\r\n");
        request.push_str(body);

        timeout(self.config.timeout, stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| SdkError::timeout())?
            .map_err(|e| SdkError::network(format!("Write failed: {e}")))?;

        let mut response_bytes = Vec::new();
        timeout(self.config.timeout, stream.read_to_end(&mut response_bytes))
            .await
            .map_err(|_| SdkError::timeout())?
            .map_err(|e| SdkError::network(format!("Read failed: {e}")))?;

        let (status, body) = parse_http_response(&response_bytes)?;
        let parsed = serde_json::from_str::<Response>(&body);

        match (status, parsed) {
            (200..=299, Ok(response)) => Ok(response),
            (200..=299, Err(e)) => Err(SdkError::new(
                ErrorCode::InvalidResponse,
                format!(
                    "Failed to parse response: {e}. Body: {}",
                    truncate(&body, 200)
                ),
            )),
            (status, _) if status >= 500 => Err(SdkError::new(
                ErrorCode::HttpError,
                format!("HTTP {status}: {}", truncate(&body, 200)),
            )),
            // Hasura answers some rejected requests with 4xx and an error body.
            (_, Ok(response)) if response.errors.is_some() || response.error.is_some() => {
                Ok(response)
            }
            (_, _) => Err(SdkError::new(
                ErrorCode::InvalidResponse,
                format!("HTTP {status}: {}", truncate(&body, 200)),
            )),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &Request) -> SdkResult<Response> {
        let body = serde_json::to_string(request).map_sdk_err(ErrorCode::SerializeError)?;
        let policy = &self.config.retry_policy;

        let mut attempt = 1;
        loop {
            let error = match self.post(&body).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            match policy.decide(&error, attempt) {
                RetryDecision::RetryAfter(delay) => {
                    debug!(attempt, ?delay, error = %error, "Retrying request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::DoNotRetry if error.is_retryable() && attempt > 1 => {
                    return Err(SdkError::new(
                        ErrorCode::RetriesExhausted,
                        format!("Request failed after {attempt} attempts"),
                    )
                    .with_source(error));
                }
                RetryDecision::DoNotRetry => return Err(error),
            }
        }
    }
}

/// Parses a URL into host, port, and path.
fn parse_url(url: &str) -> SdkResult<(String, u16, String)> {
    let url = url.trim();
    if url.starts_with("https://") {
        return Err(SdkError::new(
            ErrorCode::HttpsNotSupported,
            "HTTPS is not supported by the bundled transport. Use a TLS-terminating proxy or a custom Transport.",
        ));
    }
    let without_protocol = url.strip_prefix("http://").unwrap_or(url);

    let (host_port, path) = match without_protocol.find('/') {
        Some(slash_pos) => without_protocol.split_at(slash_pos),
        None => (without_protocol, "/"),
    };
    if host_port.is_empty() {
        return Err(SdkError::new(
            ErrorCode::InvalidUrl,
            format!("Missing host in URL: {url}"),
        ));
    }

    let (host, port) = match host_port.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str.parse().map_err(|_| {
                SdkError::new(ErrorCode::InvalidUrl, format!("Invalid port: {port_str}"))
            })?;
            (host.to_string(), port)
        }
        None => (host_port.to_string(), 80),
    };

    Ok((host, port, path.to_string()))
}

/// Parses an HTTP response into its status code and body.
///
/// Framing is handled on raw bytes; the body is decoded as UTF-8 only once
/// it has been reassembled.
fn parse_http_response(response: &[u8]) -> SdkResult<(u16, String)> {
    if response.is_empty() {
        return Err(SdkError::new(ErrorCode::InvalidResponse, "Empty response"));
    }
    let (head, body) = match find(response, b"\r\n\r\n") {
        Some(end) => (&response[..end], Some(&response[end + 4..])),
        None => match find(response, b"\n\n") {
            Some(end) => (&response[..end], Some(&response[end + 2..])),
            None => (response, None),
        },
    };
    let head = String::from_utf8_lossy(head);

    let status_line = head.lines().next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| {
            SdkError::new(
                ErrorCode::InvalidResponse,
                format!("Invalid status line: {status_line}"),
            )
        })?;
    let body = body
        .ok_or_else(|| SdkError::new(ErrorCode::InvalidResponse, "Could not find response body"))?;

    let body = if is_chunked(&head) {
        parse_chunked_body(body)?
    } else {
        body.to_vec()
    };
    let body = String::from_utf8(body)
        .map_sdk_err_with(ErrorCode::InvalidResponse, "Response body is not valid UTF-8")?;
    Ok((status, body))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn is_chunked(head: &str) -> bool {
    head.lines().skip(1).any(|line| {
        line.split_once(':').is_some_and(|(name, value)| {
            name.trim().eq_ignore_ascii_case("transfer-encoding")
                && value
                    .split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
        })
    })
}

/// Parses a chunked transfer encoding body.
fn parse_chunked_body(body: &[u8]) -> SdkResult<Vec<u8>> {
    let mut result = Vec::with_capacity(body.len());
    let mut remaining = body;

    while let Some(newline) = remaining.iter().position(|&byte| byte == b'\n') {
        let size_line = String::from_utf8_lossy(&remaining[..newline]);
        let rest = &remaining[newline + 1..];

        let size_str = size_line.trim();
        let size_str = size_str.split(';').next().unwrap_or(size_str).trim();
        let chunk_size = usize::from_str_radix(size_str, 16).map_err(|_| {
            SdkError::new(
                ErrorCode::InvalidResponse,
                format!("Invalid chunk size: {size_str}"),
            )
        })?;
        if chunk_size == 0 {
            break;
        }
        if chunk_size > rest.len() {
            result.extend_from_slice(rest);
            break;
        }

        let (chunk, rest) = rest.split_at(chunk_size);
        result.extend_from_slice(chunk);
        remaining = rest
            .strip_prefix(b"\r\n")
            .or_else(|| rest.strip_prefix(b"\n"))
            .unwrap_or(rest);
    }

    Ok(result)
}

/// Shortens `input` to at most `limit` characters, marking the cut with `...`.
pub(crate) fn truncate(input: &str, limit: usize) -> String {
    match input.char_indices().nth(limit) {
        Some((index, _)) => format!("{}...", &input[..index]),
        None => input.to_string(),
    }
}
