use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;

/// Peer address and user agent of the current request.
///
/// The address is absent when the router is driven without connect info (tests,
/// embedding); such requests are never treated as loopback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    pub addr: Option<SocketAddr>,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn ip(&self) -> String {
        self.addr.map(|a| a.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
    }

    pub fn is_loopback(&self) -> bool {
        match self.addr.map(|a| a.ip()) {
            Some(IpAddr::V4(v4)) => v4.is_loopback(),
            Some(IpAddr::V6(v6)) => v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback()),
            None => false,
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let addr = ConnectInfo::<SocketAddr>::from_request_parts(parts, state).await.ok().map(|ConnectInfo(a)| a);
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("Unknown")
            .to_string();
        Ok(Self { addr, user_agent })
    }
}
