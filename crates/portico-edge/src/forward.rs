//! Forwarding a matched request to one downstream instance.

use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderName};
use axum::response::Response;
use http_body_util::LengthLimitError;
use portico_core::ServiceInstance;
use reqwest::Client;
use reqwest::redirect::Policy;

/// Headers that describe one connection and must not be passed on.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    #[error("request body could not be read")]
    Body,

    #[error("downstream connection failed")]
    Connect(#[source] reqwest::Error),

    #[error("downstream timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("downstream request failed")]
    Transport(#[source] reqwest::Error),
}

impl From<reqwest::Error> for ForwardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ForwardError::Timeout(err)
        } else if err.is_connect() {
            ForwardError::Connect(err)
        } else {
            ForwardError::Transport(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    max_body_bytes: usize,
}

impl Forwarder {
    pub fn new(timeout: Duration, connect_timeout: Duration, max_body_bytes: usize) -> Result<Self, reqwest::Error> {
        // Redirects belong to the client, so they are relayed, not followed.
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self { client, max_body_bytes })
    }

    /// Send `req` to `instance` at `path`, keeping method, headers, body and
    /// query string. The downstream response body is streamed back.
    pub async fn forward(
        &self,
        req: Request,
        instance: &ServiceInstance,
        path: &str,
    ) -> Result<Response, ForwardError> {
        let (parts, body) = req.into_parts();

        let declared = parts
            .headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_bytes) {
            return Err(ForwardError::BodyTooLarge(self.max_body_bytes));
        }
        // Undeclared or chunked bodies hit the same cap while being read.
        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|err| {
                if err.into_inner().is::<LengthLimitError>() {
                    ForwardError::BodyTooLarge(self.max_body_bytes)
                } else {
                    ForwardError::Body
                }
            })?;

        let url = downstream_url(instance, path, parts.uri.query());
        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(HOST);
        headers.remove(CONTENT_LENGTH);

        tracing::debug!(method = %parts.method, %url, "forwarding");
        let res = self
            .client
            .request(parts.method, url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = res.status();
        let mut headers = res.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from_stream(res.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// `path` is reused as received, already percent-encoded.
pub fn downstream_url(instance: &ServiceInstance, path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{}{path}?{q}", instance.base_url()),
        _ => format!("{}{path}", instance.base_url()),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are hop-by-hop too.
    let named: Vec<HeaderName> = headers
        .get_all("connection")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
