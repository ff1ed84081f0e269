// Target Guard
//
// Hook deciding which origins the relay may contact. The default lets every
// target through, matching the relay's open pass-through behavior. Deployments
// that should not act as an open proxy can install a domain allow-list.

use url::Url;

pub trait TargetGuard: Send + Sync {
    fn is_allowed_target(&self, url: &Url) -> bool;
}

impl<F> TargetGuard for F
where
    F: Fn(&Url) -> bool + Send + Sync,
{
    fn is_allowed_target(&self, url: &Url) -> bool {
        self(url)
    }
}

/// Relays to any host.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllTargets;

impl TargetGuard for AllowAllTargets {
    fn is_allowed_target(&self, _url: &Url) -> bool {
        true
    }
}

/// Relays only to the listed domains and their subdomains.
#[derive(Debug, Clone)]
pub struct DomainAllowList {
    domains: Vec<String>,
}

impl DomainAllowList {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }
}

impl TargetGuard for DomainAllowList {
    fn is_allowed_target(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h.to_ascii_lowercase(),
            None => return false,
        };

        self.domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
    }
}
