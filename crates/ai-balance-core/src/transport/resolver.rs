use std::net::{IpAddr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::debug;

use super::{HttpError, HttpErrorKind};

/// DNS resolver that always prefers IPv4.
///
/// Both address families are requested and IPv4 candidates are sorted first,
/// which avoids hosts where IPv6 is advertised but not routable. With
/// `force_ipv4` set, IPv6 candidates are dropped entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ipv4FirstResolver {
    force_ipv4: bool,
}

impl Ipv4FirstResolver {
    pub const fn new(force_ipv4: bool) -> Self {
        Self { force_ipv4 }
    }

    pub const fn force_ipv4(&self) -> bool {
        self.force_ipv4
    }

    /// Resolve `host` to the single best candidate for `port`.
    pub async fn lookup(&self, host: &str, port: u16) -> Result<SocketAddr, HttpError> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, port));
        }

        let candidates = tokio::net::lookup_host((bare, port)).await.map_err(|error| {
            HttpError::new(
                HttpErrorKind::Dns,
                format!("failed to resolve '{host}': {error}"),
            )
        })?;

        let ordered = order_candidates(candidates, self.force_ipv4);
        let first = ordered.first().copied().ok_or_else(|| {
            HttpError::new(
                HttpErrorKind::Dns,
                format!("no usable address found for '{host}'"),
            )
        })?;
        debug!(host, address = %first, force_ipv4 = self.force_ipv4, "resolved host");
        Ok(first)
    }
}

/// Stable-sort candidates so IPv4 comes first; drop IPv6 when forced.
pub fn order_candidates(
    candidates: impl IntoIterator<Item = SocketAddr>,
    force_ipv4: bool,
) -> Vec<SocketAddr> {
    let mut ordered: Vec<SocketAddr> = candidates
        .into_iter()
        .filter(|candidate| !force_ipv4 || candidate.is_ipv4())
        .collect();
    ordered.sort_by_key(|candidate| !candidate.is_ipv4());
    ordered
}

impl Resolve for Ipv4FirstResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = *self;
        Box::pin(async move {
            // The connector fills in the real port.
            let address = resolver.lookup(name.as_str(), 0).await?;
            let addrs: Addrs = Box::new(std::iter::once(address));
            Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs)
        })
    }
}
