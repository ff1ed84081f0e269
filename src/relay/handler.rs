// Media Relay
//
// Fetches a remote resource on the caller's behalf and re-streams it with
// permissive CORS headers. The origin body is never buffered: each chunk is
// pulled from the origin only when the client side is ready for it, and
// dropping the response (client disconnect) drops the origin transfer too.

use super::error::RelayError;
use super::guard::{AllowAllTargets, TargetGuard};
use super::request::RelayRequest;
use crate::config::DefaultHeaders;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue},
    response::Response,
};
use futures_util::TryStreamExt;
use std::{sync::Arc, time::Duration};

/// Used when the origin doesn't say what it is sending.
pub const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

const MAX_REDIRECTS: usize = 20;

/// Origin headers copied onto a successful relay response besides
/// `Content-Type`.
const PASSTHROUGH_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CONTENT_ENCODING,
];

pub struct MediaRelay {
    client: reqwest::Client,
    default_headers: HeaderMap,
    guard: Arc<dyn TargetGuard>,
}

impl MediaRelay {
    pub fn new(client: reqwest::Client, defaults: &DefaultHeaders) -> Self {
        Self {
            client,
            default_headers: defaults.to_header_map(),
            guard: Arc::new(AllowAllTargets),
        }
    }

    pub fn with_guard(mut self, guard: impl TargetGuard + 'static) -> Self {
        self.guard = Arc::new(guard);
        self
    }

    /// Shared HTTP client for origin fetches. Follows redirects. With no
    /// timeout a hung origin holds its request until the transport gives up.
    pub fn build_client(timeout: Option<Duration>) -> reqwest::Result<reqwest::Client> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder.build()
    }

    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    /// Run one relay request to completion of its headers. The returned
    /// response carries the still-streaming origin body.
    pub async fn relay(
        &self,
        request: RelayRequest,
        client_range: Option<&HeaderValue>,
    ) -> Result<Response, RelayError> {
        let target = request.target_url.as_str();
        let short_target = truncate(target, 100).to_string();

        // Unparseable targets skip the guard; the fetch below reports them.
        if let Ok(parsed) = url::Url::parse(target) {
            if !self.guard.is_allowed_target(&parsed) {
                log::warn!("Rejected relay target: {}", short_target);
                return Err(RelayError::TargetNotAllowed);
            }
        }

        log::info!("Relaying: {}", short_target);

        let headers = request.outbound_headers(&self.default_headers, client_range);

        let response = self
            .client
            .get(target)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                let err = RelayError::from(e);
                log::error!("Relay fetch failed for {}: {}", short_target, err);
                err
            })?;

        let status = response.status();
        if !status.is_success() {
            log::warn!("Origin returned {} for {}", status, short_target);
            return Err(RelayError::Upstream(status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

        let mut passthrough = HeaderMap::new();
        for name in PASSTHROUGH_HEADERS {
            if let Some(value) = response.headers().get(&name) {
                passthrough.insert(name, value.clone());
            }
        }

        if let Some(range) = passthrough.get(header::CONTENT_RANGE) {
            log::debug!("Content-Range: {:?}", range);
        }

        let stream = response.bytes_stream().inspect_err(move |e| {
            log::warn!("Relay stream from {} aborted: {}", short_target, e);
        });

        let mut relayed = Response::new(Body::from_stream(stream));
        *relayed.status_mut() = status;

        let headers = relayed.headers_mut();
        headers.insert(header::CONTENT_TYPE, content_type);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("Content-Range, Accept-Ranges, Content-Length"),
        );
        headers.extend(passthrough);

        Ok(relayed)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 100), "short");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ééé", 2), "éé");
    }

    #[test]
    fn test_new_relay_uses_default_headers() {
        let relay = MediaRelay::new(reqwest::Client::new(), &DefaultHeaders::default());
        assert_eq!(relay.default_headers().get(header::ACCEPT).unwrap(), "*/*");
        assert!(relay.default_headers().contains_key(header::USER_AGENT));
        assert!(relay.default_headers().contains_key(header::REFERER));
    }

    #[test]
    fn test_build_client() {
        assert!(MediaRelay::build_client(None).is_ok());
        assert!(MediaRelay::build_client(Some(Duration::from_secs(5))).is_ok());
    }
}
