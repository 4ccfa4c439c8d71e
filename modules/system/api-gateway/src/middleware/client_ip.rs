use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use http::HeaderMap;
use workspace_auth_sdk::ClientIp;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// How the client address is derived.
#[derive(Clone, Copy, Debug, Default)]
pub struct ClientIpPolicy {
    pub trust_forwarded_for: bool,
}

/// Resolve the client address of `req` and insert it as [`ClientIp`].
///
/// Uses the socket peer unless the gateway trusts `X-Forwarded-For`, in which
/// case the first valid entry of that header wins. Without either the
/// unspecified address is used, so all such requests share one IP bucket.
pub async fn client_ip_middleware(policy: ClientIpPolicy, mut req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let ip = resolve(req.headers(), peer, policy);
    tracing::Span::current().record("client_ip", tracing::field::display(ip));
    req.extensions_mut().insert(ClientIp(ip));

    next.run(req).await
}

fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, policy: ClientIpPolicy) -> IpAddr {
    if policy.trust_forwarded_for
        && let Some(ip) = first_forwarded(headers)
    {
        return ip;
    }
    peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn first_forwarded(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
