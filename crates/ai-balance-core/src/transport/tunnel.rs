use std::collections::BTreeMap;
use std::sync::Arc;

use hyper::client::conn::{self, SendRequest};
use hyper::header::{
    HeaderValue, CONTENT_LENGTH, HOST, PROXY_AUTHORIZATION, USER_AGENT as USER_AGENT_HEADER,
};
use hyper::upgrade::Upgraded;
use hyper::{Body, Method, Request, Response};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use super::{
    parse_body, HttpError, HttpErrorKind, HttpResponse, Ipv4FirstResolver, PreparedRequest,
    USER_AGENT,
};
use crate::proxy::ProxyEndpoint;

/// TLS connector trusting the bundled webpki roots plus `extra_roots`.
pub(crate) fn tls_connector(
    extra_roots: &[CertificateDer<'static>],
) -> Result<TlsConnector, HttpError> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    for root in extra_roots {
        roots.add(root.clone()).map_err(|error| {
            HttpError::new(HttpErrorKind::Tls, format!("invalid root certificate: {error}"))
        })?;
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        tokio_rustls::rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|error| HttpError::new(HttpErrorKind::Tls, format!("invalid TLS setup: {error}")))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Send `request` to an https target through a CONNECT tunnel on `proxy`.
///
/// The TLS handshake runs end to end with the target, so SNI and certificate
/// checks use the target host, never the proxy.
pub(crate) async fn send_via_tunnel(
    request: PreparedRequest,
    proxy: &ProxyEndpoint,
    resolver: &Ipv4FirstResolver,
    tls: &TlsConnector,
) -> Result<HttpResponse, HttpError> {
    let host = request
        .url
        .host_str()
        .ok_or_else(|| {
            HttpError::new(
                HttpErrorKind::InvalidUrl,
                format!("URL '{}' has no host", request.url),
            )
        })?
        .to_owned();
    let port = request.url.port_or_known_default().unwrap_or(443);
    let authority = format!("{host}:{port}");

    let tunnel = open_tunnel(proxy, &authority, resolver).await?;

    let sni_host = host.trim_start_matches('[').trim_end_matches(']').to_owned();
    let server_name = ServerName::try_from(sni_host).map_err(|error| {
        HttpError::new(HttpErrorKind::Tls, format!("invalid TLS server name '{host}': {error}"))
    })?;
    let stream = tls.connect(server_name, tunnel).await.map_err(|error| {
        HttpError::new(
            HttpErrorKind::Tls,
            format!("TLS handshake with {host} failed: {error}"),
        )
    })?;

    let mut sender = handshake(stream).await?;
    let response = sender
        .send_request(origin_form_request(request)?)
        .await
        .map_err(|error| hyper_error("request failed", &error))?;
    read_response(response).await
}

/// Ask `proxy` for a tunnel to `authority` and hand back the upgraded stream.
///
/// Bytes the proxy sent past its 2xx head stay buffered in the returned stream.
pub(crate) async fn open_tunnel(
    proxy: &ProxyEndpoint,
    authority: &str,
    resolver: &Ipv4FirstResolver,
) -> Result<Upgraded, HttpError> {
    let address = resolver.lookup(&proxy.host, proxy.port).await?;
    let stream = TcpStream::connect(address).await.map_err(|error| {
        HttpError::new(
            HttpErrorKind::Connect,
            format!("failed to connect to proxy {}: {error}", proxy.display()),
        )
    })?;

    let mut builder = Request::builder()
        .method(Method::CONNECT)
        .uri(authority)
        .header(HOST, authority);
    if let Some(authorization) = &proxy.authorization {
        builder = builder.header(PROXY_AUTHORIZATION, authorization.as_str());
    }
    let connect = builder.body(Body::empty()).map_err(|error| {
        HttpError::new(
            HttpErrorKind::InvalidUrl,
            format!("invalid CONNECT target '{authority}': {error}"),
        )
    })?;

    let mut sender = handshake(stream).await?;
    let response = sender.send_request(connect).await.map_err(|error| {
        HttpError::new(
            HttpErrorKind::ProxyConnect,
            format!("proxy {} failed during CONNECT {authority}: {error}", proxy.display()),
        )
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(HttpError::new(
            HttpErrorKind::ProxyConnect,
            format!(
                "proxy {} rejected CONNECT {authority} with status {}",
                proxy.display(),
                status.as_u16()
            ),
        ));
    }

    let upgraded = hyper::upgrade::on(response).await.map_err(|error| {
        HttpError::new(
            HttpErrorKind::ProxyConnect,
            format!("proxy {} did not hand over the tunnel: {error}", proxy.display()),
        )
    })?;
    debug!(proxy = %proxy.display(), target = authority, "CONNECT tunnel established");
    Ok(upgraded)
}

/// HTTP/1.1 handshake over `stream`; the connection is driven on its own task.
async fn handshake<S>(stream: S) -> Result<SendRequest<Body>, HttpError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, connection) = conn::handshake(stream)
        .await
        .map_err(|error| hyper_error("HTTP handshake failed", &error))?;
    tokio::spawn(async move {
        if let Err(error) = connection.await {
            debug!(%error, "connection closed with error");
        }
    });
    Ok(sender)
}

/// The request as sent inside the tunnel: origin-form target plus `Host`.
fn origin_form_request(request: PreparedRequest) -> Result<Request<Body>, HttpError> {
    let method = Method::from_bytes(request.method.as_str().as_bytes()).map_err(|error| {
        HttpError::new(
            HttpErrorKind::InvalidUrl,
            format!("invalid HTTP method '{}': {error}", request.method),
        )
    })?;

    let url = &request.url;
    let target = match url.query() {
        Some(query) => format!("{}?{query}", url.path()),
        None => url.path().to_owned(),
    };
    let host = url.host_str().unwrap_or_default();
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };

    let mut builder = Request::builder().method(method).uri(target);
    if !request.headers.contains_key("host") {
        builder = builder.header(HOST, host);
    }
    if !request.headers.contains_key("user-agent") {
        builder = builder.header(USER_AGENT_HEADER, USER_AGENT);
    }
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let body = match request.body {
        Some(bytes) => {
            builder = builder.header(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            Body::from(bytes)
        }
        None => Body::empty(),
    };
    builder.body(body).map_err(|error| {
        HttpError::new(HttpErrorKind::InvalidUrl, format!("invalid request: {error}"))
    })
}

async fn read_response(response: Response<Body>) -> Result<HttpResponse, HttpError> {
    let status = response.status().as_u16();
    let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = hyper::body::to_bytes(response.into_body())
        .await
        .map_err(|error| hyper_error("failed to read response body", &error))?;

    Ok(HttpResponse {
        status,
        data: parse_body(&body),
        headers,
    })
}

fn hyper_error(context: &str, error: &hyper::Error) -> HttpError {
    let kind = if error.is_parse() || error.is_incomplete_message() {
        HttpErrorKind::Protocol
    } else if error.is_timeout() {
        HttpErrorKind::Timeout
    } else {
        HttpErrorKind::Io
    };
    HttpError::new(kind, format!("{context}: {error}"))
}
