// Relay Request
//
// Turns the raw `/api/proxy` query into a validated request and computes the
// header set sent to the origin. Everything here is caller-controlled input.

use super::error::RelayError;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Headers the HTTP client owns. Callers may not set them.
const CONNECTION_HEADERS: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "upgrade",
    "keep-alive",
    "te",
    "trailer",
    "proxy-connection",
];

#[derive(Debug, Default)]
pub struct RelayQuery {
    pub url: Option<String>,
    /// URL-encoded JSON object of extra outbound headers
    pub headers: Option<String>,
}

/// Built from decoded query pairs. A repeated parameter keeps its first
/// value; unknown parameters are ignored.
impl FromIterator<(String, String)> for RelayQuery {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut query = RelayQuery::default();
        for (key, value) in pairs {
            match key.as_str() {
                "url" if query.url.is_none() => query.url = Some(value),
                "headers" if query.headers.is_none() => query.headers = Some(value),
                _ => {}
            }
        }
        query
    }
}

#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub target_url: String,
    pub extra_headers: HeaderMap,
}

impl RelayRequest {
    /// Validate a query. A missing or empty `url` fails before the `headers`
    /// parameter is even looked at.
    pub fn from_query(query: RelayQuery) -> Result<Self, RelayError> {
        let target_url = match query.url {
            Some(u) if !u.trim().is_empty() => u.trim().to_string(),
            _ => return Err(RelayError::MissingUrl),
        };

        let extra_headers = match query.headers.as_deref() {
            Some(raw) if !raw.trim().is_empty() => parse_extra_headers(raw)?,
            _ => HeaderMap::new(),
        };

        Ok(Self {
            target_url,
            extra_headers,
        })
    }

    /// Defaults first, caller headers on top, then the client's `Range` if
    /// the caller didn't pin one.
    pub fn outbound_headers(
        &self,
        defaults: &HeaderMap,
        client_range: Option<&HeaderValue>,
    ) -> HeaderMap {
        let mut headers = defaults.clone();

        for (name, value) in &self.extra_headers {
            headers.insert(name.clone(), value.clone());
        }

        if let Some(range) = client_range {
            if !headers.contains_key(header::RANGE) {
                headers.insert(header::RANGE, range.clone());
            }
        }

        headers
    }
}

/// Parse the `headers` query parameter.
///
/// `null` means no extra headers. String values are taken verbatim, numbers
/// and booleans are stringified, anything else is ignored. Entries that are
/// not valid HTTP header names/values, or that name a connection-level
/// header, are dropped.
pub fn parse_extra_headers(raw: &str) -> Result<HeaderMap, RelayError> {
    let value: serde_json::Value = serde_json::from_str(raw)?;

    let object = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => return Ok(HeaderMap::new()),
        _ => return Err(RelayError::HeadersNotObject),
    };

    let mut headers = HeaderMap::new();

    for (name, value) in object {
        let value = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => {
                log::debug!("Ignoring non-scalar header value for {}", name);
                continue;
            }
        };

        let name = match HeaderName::from_bytes(name.trim().as_bytes()) {
            Ok(n) => n,
            Err(_) => {
                log::warn!("Dropping invalid header name: {:?}", name);
                continue;
            }
        };

        if CONNECTION_HEADERS.contains(&name.as_str()) {
            log::warn!("Dropping connection-level header: {}", name);
            continue;
        }

        match HeaderValue::from_str(&value) {
            Ok(v) => {
                headers.insert(name, v);
            }
            Err(_) => log::warn!("Dropping invalid value for header {}", name),
        }
    }

    Ok(headers)
}
