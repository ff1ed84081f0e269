// Relay Configuration
//
// Settings are read once from the environment at startup. Missing or
// malformed values fall back to defaults with a warning so a bad variable
// never keeps the relay from starting.

use axum::http::{header, HeaderMap, HeaderValue};
use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STATIC_DIR: &str = "dist";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";
pub const DEFAULT_ACCEPT: &str = "*/*";
pub const DEFAULT_REFERER: &str = "https://allmanga.to";

/// Browser identification sent to origins when the caller supplies nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultHeaders {
    pub user_agent: String,
    pub accept: String,
    pub referer: String,
}

impl Default for DefaultHeaders {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept: DEFAULT_ACCEPT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

impl DefaultHeaders {
    /// Build the outbound header set. Values that are not valid header
    /// values are skipped.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        for (name, value) in [
            (header::USER_AGENT, &self.user_agent),
            (header::ACCEPT, &self.accept),
            (header::REFERER, &self.referer),
        ] {
            match HeaderValue::from_str(value) {
                Ok(v) => {
                    headers.insert(name, v);
                }
                Err(_) => log::warn!("Ignoring invalid default {} value: {:?}", name, value),
            }
        }

        headers
    }
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub static_dir: PathBuf,
    pub default_headers: DefaultHeaders,
    /// `None` means every target is relayed.
    pub allowed_domains: Option<Vec<String>>,
    pub upstream_timeout: Option<Duration>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            default_headers: DefaultHeaders::default(),
            allowed_domains: None,
            upstream_timeout: None,
        }
    }
}

impl RelayConfig {
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = DefaultHeaders::default();

        Self {
            port: parse_or("PORT", var("PORT"), DEFAULT_PORT),
            static_dir: var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            default_headers: DefaultHeaders {
                user_agent: var("RELAY_USER_AGENT").unwrap_or(defaults.user_agent),
                accept: defaults.accept,
                referer: var("RELAY_REFERER").unwrap_or(defaults.referer),
            },
            allowed_domains: var("RELAY_ALLOWED_DOMAINS").map(|list| parse_domain_list(&list)),
            upstream_timeout: var("RELAY_UPSTREAM_TIMEOUT_SECS")
                .and_then(|raw| parse_optional::<u64>("RELAY_UPSTREAM_TIMEOUT_SECS", &raw))
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        Some(raw) => parse_optional(key, &raw).unwrap_or_else(|| {
            log::warn!("Using default {} for {}", default, key);
            default
        }),
        None => {
            log::info!("{} not set, using default: {}", key, default);
            default
        }
    }
}

fn parse_optional<T>(key: &str, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| log::warn!("Invalid {} value {:?}: {}", key, raw, e))
        .ok()
}

fn parse_domain_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> RelayConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RelayConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.static_dir, PathBuf::from("dist"));
        assert_eq!(config.default_headers, DefaultHeaders::default());
        assert!(config.allowed_domains.is_none());
        assert!(config.upstream_timeout.is_none());
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("STATIC_DIR", "/srv/app"),
            ("RELAY_REFERER", "https://music.example.com/"),
            ("RELAY_UPSTREAM_TIMEOUT_SECS", "30"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.static_dir, PathBuf::from("/srv/app"));
        assert_eq!(config.default_headers.referer, "https://music.example.com/");
        assert_eq!(config.default_headers.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("RELAY_UPSTREAM_TIMEOUT_SECS", "soon"),
            ("STATIC_DIR", "   "),
        ]);
        assert_eq!(config.port, 3000);
        assert!(config.upstream_timeout.is_none());
        assert_eq!(config.static_dir, PathBuf::from("dist"));

        let zero = config_from(&[("RELAY_UPSTREAM_TIMEOUT_SECS", "0")]);
        assert!(zero.upstream_timeout.is_none());
    }

    #[test]
    fn test_allowed_domains_parsing() {
        let config = config_from(&[("RELAY_ALLOWED_DOMAINS", " CDN.Example.com, .media.net ,, ")]);
        assert_eq!(
            config.allowed_domains,
            Some(vec!["cdn.example.com".to_string(), "media.net".to_string()])
        );
    }

    #[test]
    fn test_default_header_map() {
        let headers = DefaultHeaders::default().to_header_map();
        assert_eq!(headers.get(header::USER_AGENT).unwrap(), DEFAULT_USER_AGENT);
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "*/*");
        assert_eq!(headers.get(header::REFERER).unwrap(), DEFAULT_REFERER);
    }

    #[test]
    fn test_invalid_default_header_is_skipped() {
        let headers = DefaultHeaders {
            referer: "bad\nvalue".to_string(),
            ..Default::default()
        }
        .to_header_map();
        assert!(headers.get(header::REFERER).is_none());
        assert_eq!(headers.len(), 2);
    }
}
