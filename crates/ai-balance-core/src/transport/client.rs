use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderValue;
use tokio_rustls::rustls::pki_types::CertificateDer;
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::tunnel::{send_via_tunnel, tls_connector};
use super::{
    parse_body, HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, Ipv4FirstResolver,
    PreparedRequest, USER_AGENT,
};
use crate::config::EnvSnapshot;
use crate::proxy::{ProxyEndpoint, ProxyResolver, ProxyRoute};

/// Production transport.
///
/// Direct requests and plain-HTTP relays go through reqwest with its own proxy
/// discovery disabled; HTTPS behind a proxy goes through a CONNECT tunnel.
/// Every path resolves names with [`Ipv4FirstResolver`].
#[derive(Clone)]
pub struct ProxyAwareHttpClient {
    proxies: ProxyResolver,
    resolver: Ipv4FirstResolver,
    extra_roots: Vec<CertificateDer<'static>>,
    direct: reqwest::Client,
    tls: TlsConnector,
}

impl ProxyAwareHttpClient {
    pub fn new(proxies: ProxyResolver, resolver: Ipv4FirstResolver) -> Result<Self, HttpError> {
        Self::with_root_certificates(proxies, resolver, Vec::new())
    }

    /// Like [`new`](Self::new), additionally trusting the DER-encoded
    /// certificates in `extra_roots` on every route.
    pub fn with_root_certificates(
        proxies: ProxyResolver,
        resolver: Ipv4FirstResolver,
        extra_roots: Vec<Vec<u8>>,
    ) -> Result<Self, HttpError> {
        let extra_roots: Vec<CertificateDer<'static>> =
            extra_roots.into_iter().map(CertificateDer::from).collect();
        let direct = client_builder(resolver, &extra_roots)?
            .build()
            .map_err(build_error)?;
        let tls = tls_connector(&extra_roots)?;
        Ok(Self {
            proxies,
            resolver,
            extra_roots,
            direct,
            tls,
        })
    }

    /// Proxy, no-proxy and IPv4 settings taken from `env`.
    pub fn from_env(env: &EnvSnapshot) -> Result<Self, HttpError> {
        Self::new(
            ProxyResolver::from_env(env),
            Ipv4FirstResolver::new(env.force_ipv4()),
        )
    }

    async fn dispatch(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError> {
        match self.proxies.route_for(&request.url)? {
            ProxyRoute::Direct => {
                debug!(url = %request.url, "sending request directly");
                send_with_reqwest(&self.direct, request).await
            }
            ProxyRoute::Relay(proxy) => {
                debug!(url = %request.url, proxy = %proxy.display(), "relaying request through proxy");
                let client = self.relay_client(&proxy)?;
                send_with_reqwest(&client, request).await
            }
            ProxyRoute::Tunnel(proxy) => {
                debug!(url = %request.url, proxy = %proxy.display(), "tunnelling request through proxy");
                send_via_tunnel(request, &proxy, &self.resolver, &self.tls).await
            }
        }
    }

    fn relay_client(&self, proxy: &ProxyEndpoint) -> Result<reqwest::Client, HttpError> {
        let mut relay = reqwest::Proxy::http(proxy.url.as_str()).map_err(build_error)?;
        if let Some(authorization) = &proxy.authorization {
            let value = HeaderValue::from_str(authorization).map_err(|error| {
                HttpError::new(
                    HttpErrorKind::InvalidUrl,
                    format!("invalid proxy credentials: {error}"),
                )
            })?;
            relay = relay.custom_http_auth(value);
        }

        client_builder(self.resolver, &self.extra_roots)?
            .proxy(relay)
            .build()
            .map_err(build_error)
    }
}

impl HttpClient for ProxyAwareHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let timeout_ms = request.timeout_ms;
            let prepared = request.prepare()?;

            // A zero timeout disables the deadline.
            if timeout_ms == 0 {
                return self.dispatch(prepared).await;
            }
            match tokio::time::timeout(Duration::from_millis(timeout_ms), self.dispatch(prepared))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(HttpError::timeout(timeout_ms)),
            }
        })
    }
}

fn client_builder(
    resolver: Ipv4FirstResolver,
    extra_roots: &[CertificateDer<'static>],
) -> Result<reqwest::ClientBuilder, HttpError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .no_proxy()
        .dns_resolver(Arc::new(resolver));
    for root in extra_roots {
        let certificate = reqwest::Certificate::from_der(root.as_ref()).map_err(build_error)?;
        builder = builder.add_root_certificate(certificate);
    }
    Ok(builder)
}

fn build_error(error: reqwest::Error) -> HttpError {
    HttpError::new(
        HttpErrorKind::InvalidUrl,
        format!("failed to configure HTTP client: {error}"),
    )
}

async fn send_with_reqwest(
    client: &reqwest::Client,
    request: PreparedRequest,
) -> Result<HttpResponse, HttpError> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes()).map_err(|error| {
        HttpError::new(
            HttpErrorKind::InvalidUrl,
            format!("invalid HTTP method '{}': {error}", request.method),
        )
    })?;

    let mut builder = client.request(method, request.url.clone());
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(classify_reqwest_error)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_ascii_lowercase(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let bytes = response
        .bytes()
        .await
        .map_err(|error| HttpError::new(HttpErrorKind::Io, format!("failed to read response body: {error}")))?;

    Ok(HttpResponse {
        status,
        data: parse_body(&bytes),
        headers,
    })
}

fn classify_reqwest_error(error: reqwest::Error) -> HttpError {
    let kind = if error.is_timeout() {
        HttpErrorKind::Timeout
    } else if error.is_connect() {
        HttpErrorKind::Connect
    } else if error.is_builder() {
        HttpErrorKind::InvalidUrl
    } else {
        HttpErrorKind::Io
    };

    let mut message = error.to_string();
    let mut source = std::error::Error::source(&error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    HttpError::new(kind, message)
}
