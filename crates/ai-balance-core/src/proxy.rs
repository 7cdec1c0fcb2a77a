//! Forward-proxy selection from conventional environment variables.
//!
//! | Target | Variables, highest priority first |
//! |--------|-----------------------------------|
//! | `https` | `AI_BALANCE_HTTPS_PROXY`, `HTTPS_PROXY`, `https_proxy`, `AI_BALANCE_PROXY`, `ALL_PROXY`, `all_proxy` |
//! | `http` | `AI_BALANCE_HTTP_PROXY`, `HTTP_PROXY`, `http_proxy`, `AI_BALANCE_PROXY`, `ALL_PROXY`, `all_proxy` |
//!
//! Hosts matching `AI_BALANCE_NO_PROXY` / `NO_PROXY` / `no_proxy` always go direct.

use std::fmt::{Debug, Formatter};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Url;
use tracing::debug;

use crate::config::EnvSnapshot;
use crate::transport::{HttpError, HttpErrorKind};

const HTTPS_PROXY_VARS: [&str; 6] = [
    "AI_BALANCE_HTTPS_PROXY",
    "HTTPS_PROXY",
    "https_proxy",
    "AI_BALANCE_PROXY",
    "ALL_PROXY",
    "all_proxy",
];

const HTTP_PROXY_VARS: [&str; 6] = [
    "AI_BALANCE_HTTP_PROXY",
    "HTTP_PROXY",
    "http_proxy",
    "AI_BALANCE_PROXY",
    "ALL_PROXY",
    "all_proxy",
];

const NO_PROXY_VARS: [&str; 3] = ["AI_BALANCE_NO_PROXY", "NO_PROXY", "no_proxy"];

/// A parsed forward proxy. Credentials live only in `authorization`.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEndpoint {
    pub url: Url,
    pub host: String,
    pub port: u16,
    pub authorization: Option<String>,
}

impl ProxyEndpoint {
    /// Parse a proxy URL. A missing scheme means `http://`.
    pub fn parse(raw: &str) -> Result<Self, HttpError> {
        let trimmed = raw.trim();
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_owned()
        } else {
            format!("http://{trimmed}")
        };

        let mut url = Url::parse(&with_scheme).map_err(|error| {
            HttpError::new(
                HttpErrorKind::InvalidUrl,
                format!("invalid proxy URL '{}': {error}", redact(trimmed)),
            )
        })?;
        if url.scheme() != "http" {
            return Err(HttpError::new(
                HttpErrorKind::InvalidUrl,
                format!(
                    "unsupported proxy scheme '{}'; only http:// proxies are supported",
                    url.scheme()
                ),
            ));
        }

        let host = url
            .host_str()
            .ok_or_else(|| {
                HttpError::new(
                    HttpErrorKind::InvalidUrl,
                    format!("proxy URL '{}' has no host", redact(trimmed)),
                )
            })?
            .to_owned();
        let port = url.port_or_known_default().unwrap_or(80);

        let authorization = if url.username().is_empty() && url.password().is_none() {
            None
        } else {
            let user = decode_userinfo(url.username());
            let password = url.password().map(decode_userinfo).unwrap_or_default();
            Some(basic_authorization(&user, &password))
        };

        // Credentials travel as a header, never in the URL handed to connectors.
        let _ = url.set_username("");
        let _ = url.set_password(None);

        Ok(Self {
            url,
            host,
            port,
            authorization,
        })
    }

    /// `host:port`, safe to log.
    pub fn display(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Debug for ProxyEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyEndpoint")
            .field("url", &self.url.as_str())
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// `Basic base64(user:password)`.
pub fn basic_authorization(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{password}")))
}

fn decode_userinfo(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_owned())
}

fn redact(raw: &str) -> String {
    match (raw.find("://"), raw.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***@{}", &raw[..scheme_end], &raw[at + 1..])
        }
        (None, Some(at)) => format!("***@{}", &raw[at + 1..]),
        _ => raw.to_owned(),
    }
}

/// Host suffixes that bypass the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoProxy {
    match_all: bool,
    entries: Vec<String>,
}

impl NoProxy {
    /// Parse a comma-separated list. `*` bypasses every host; leading `.` or
    /// `*.` and trailing `:port` on entries are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut no_proxy = Self::default();
        for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            if entry == "*" {
                no_proxy.match_all = true;
                continue;
            }
            let entry = entry.to_ascii_lowercase();
            let entry = entry
                .strip_prefix("*.")
                .or_else(|| entry.strip_prefix('.'))
                .unwrap_or(&entry);
            let entry = strip_port(entry);
            if !entry.is_empty() {
                no_proxy.entries.push(entry.to_owned());
            }
        }
        no_proxy
    }

    /// Case-insensitive suffix match: `example.com` covers `api.example.com`.
    pub fn matches(&self, host: &str) -> bool {
        if self.match_all {
            return true;
        }
        let host = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        self.entries.iter().any(|entry| {
            host == *entry
                || host
                    .strip_suffix(entry.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

fn strip_port(entry: &str) -> &str {
    if let Some(rest) = entry.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match entry.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|ch| ch.is_ascii_digit()) => host,
        _ => entry,
    }
}

/// How a request reaches its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoute {
    Direct,
    /// Plain-HTTP target: the proxy receives the absolute URL.
    Relay(ProxyEndpoint),
    /// HTTPS target: CONNECT tunnel, then TLS with the target.
    Tunnel(ProxyEndpoint),
}

/// Proxy decision for a target URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyResolver {
    https_proxy: Option<String>,
    http_proxy: Option<String>,
    no_proxy: NoProxy,
}

impl ProxyResolver {
    pub fn from_env(env: &EnvSnapshot) -> Self {
        Self {
            https_proxy: env.first_of(&HTTPS_PROXY_VARS).map(|(_, value)| value.to_owned()),
            http_proxy: env.first_of(&HTTP_PROXY_VARS).map(|(_, value)| value.to_owned()),
            no_proxy: env
                .first_of(&NO_PROXY_VARS)
                .map(|(_, value)| NoProxy::parse(value))
                .unwrap_or_default(),
        }
    }

    /// Never proxy.
    pub fn direct() -> Self {
        Self::default()
    }

    pub fn with_https_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.https_proxy = Some(proxy.into());
        self
    }

    pub fn with_http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    pub fn with_no_proxy(mut self, raw: &str) -> Self {
        self.no_proxy = NoProxy::parse(raw);
        self
    }

    /// The proxy to use for `target`, if any.
    pub fn proxy_for(&self, target: &Url) -> Result<Option<ProxyEndpoint>, HttpError> {
        let host = target.host_str().unwrap_or_default();
        if self.no_proxy.matches(host) {
            debug!(host, "host matches no-proxy list");
            return Ok(None);
        }

        let configured = match target.scheme() {
            "https" => self.https_proxy.as_deref(),
            "http" => self.http_proxy.as_deref(),
            _ => None,
        };
        configured.map(ProxyEndpoint::parse).transpose()
    }

    pub fn route_for(&self, target: &Url) -> Result<ProxyRoute, HttpError> {
        let route = match self.proxy_for(target)? {
            None => ProxyRoute::Direct,
            Some(proxy) if target.scheme() == "https" => ProxyRoute::Tunnel(proxy),
            Some(proxy) => ProxyRoute::Relay(proxy),
        };
        Ok(route)
    }
}
