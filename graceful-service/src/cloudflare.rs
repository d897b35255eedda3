//! Cloudflare reverse-proxy headers
//!
//! When a service sits behind Cloudflare, the socket peer is a Cloudflare
//! edge node. The real client address arrives in `CF-Connecting-IP` and the
//! client's ISO 3166-1 alpha-2 country code in `CF-IPCountry`.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use http::{request::Parts, HeaderMap};

/// Header carrying the originating client IP
pub const CONNECTING_IP_HEADER: &str = "cf-connecting-ip";

/// Header carrying the two-letter client country code
pub const IP_COUNTRY_HEADER: &str = "cf-ipcountry";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Originating client IP
///
/// Prefers `CF-Connecting-IP` and falls back to the socket peer only when the
/// header is absent or empty. The header value is returned verbatim. Returns
/// `None` only when neither is available.
pub fn origin_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    header_value(headers, CONNECTING_IP_HEADER)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Client country code from `CF-IPCountry`, if set
pub fn ip_country(headers: &HeaderMap) -> Option<String> {
    header_value(headers, IP_COUNTRY_HEADER).map(str::to_string)
}

/// Extractor bundling the Cloudflare client origin
///
/// The socket peer fallback relies on the `ConnectInfo<SocketAddr>` request
/// extension, which [`crate::server::Server`] always inserts.
///
/// ```rust,ignore
/// async fn whoami(origin: CloudflareOrigin) -> String {
///     format!("{:?} from {:?}", origin.ip, origin.country)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudflareOrigin {
    /// Originating client IP
    pub ip: Option<String>,

    /// Two-letter country code supplied by the proxy
    pub country: Option<String>,
}

impl<S> FromRequestParts<S> for CloudflareOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(Self {
            ip: origin_ip(&parts.headers, peer),
            country: ip_country(&parts.headers),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use http::HeaderValue;
    use tower::ServiceExt;

    fn peer() -> SocketAddr {
        "203.0.113.9:55000".parse().unwrap()
    }

    #[test]
    fn test_origin_ip_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTING_IP_HEADER, HeaderValue::from_static("198.51.100.7"));

        assert_eq!(
            origin_ip(&headers, Some(peer())).as_deref(),
            Some("198.51.100.7")
        );
    }

    #[test]
    fn test_origin_ip_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        assert_eq!(origin_ip(&headers, Some(peer())).as_deref(), Some("203.0.113.9"));

        headers.insert(CONNECTING_IP_HEADER, HeaderValue::from_static(""));
        assert_eq!(origin_ip(&headers, Some(peer())).as_deref(), Some("203.0.113.9"));

        assert_eq!(origin_ip(&HeaderMap::new(), None), None);
    }

    #[test]
    fn test_origin_ip_blank_header_is_not_a_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTING_IP_HEADER, HeaderValue::from_static(" "));

        assert_eq!(origin_ip(&headers, Some(peer())).as_deref(), Some(" "));
    }

    #[test]
    fn test_ip_country() {
        let mut headers = HeaderMap::new();
        assert_eq!(ip_country(&headers), None);

        headers.insert("CF-IPCountry", HeaderValue::from_static("NZ"));
        assert_eq!(ip_country(&headers).as_deref(), Some("NZ"));
    }

    #[tokio::test]
    async fn test_extractor_uses_connect_info() {
        async fn handler(origin: CloudflareOrigin) -> String {
            format!(
                "{}|{}",
                origin.ip.unwrap_or_default(),
                origin.country.unwrap_or_default()
            )
        }

        let app = Router::new().route("/", get(handler));

        let mut request = Request::get("/")
            .header("CF-IPCountry", "DE")
            .body(Body::empty())
            .unwrap();
        request.extensions_mut().insert(ConnectInfo(peer()));

        let response = app.oneshot(request).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"203.0.113.9|DE");
    }
}
