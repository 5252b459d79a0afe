//! First-party host resolution for resource provider metadata.

/// Decides whether a url targets one of the application's own backends.
pub trait FirstPartyHosts: Send + Sync {
    /// Returns the matched first-party domain for `url`, if any.
    fn first_party_domain(&self, url: &str) -> Option<String>;
}

/// Static list of hosts; a host matches itself and all its subdomains.
#[derive(Debug, Clone, Default)]
pub struct HostList {
    hosts: Vec<String>,
}

impl HostList {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.into().trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }
}

impl FirstPartyHosts for HostList {
    fn first_party_domain(&self, url: &str) -> Option<String> {
        let host = host_of(url)?;
        self.hosts
            .iter()
            .find(|known| {
                host == known.as_str()
                    || host
                        .strip_suffix(known.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
            .map(|_| host)
    }
}

/// Extracts the lowercase host part of `url`.
fn host_of(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host_port.split(':').next()?;
    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}
