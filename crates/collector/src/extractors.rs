//! Request extractors.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Caller address from proxy headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // X-Forwarded-For first; the client is the left-most entry
        if let Some(xff) = parts.headers.get("X-Forwarded-For") {
            if let Ok(xff_str) = xff.to_str() {
                if let Some(ip) = xff_str.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
                    return Ok(ClientIp(Some(ip.to_string())));
                }
            }
        }

        if let Some(real_ip) = parts.headers.get("X-Real-IP") {
            if let Ok(ip) = real_ip.to_str() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Ok(ClientIp(Some(ip.to_string())));
                }
            }
        }

        Ok(ClientIp(None))
    }
}
