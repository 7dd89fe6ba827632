//! Client identity extractor.
//!
//! Edit locks are owned by the address of the client that took them. The
//! peer address comes from axum's [`ConnectInfo`]; behind a reverse proxy
//! the first `X-Forwarded-For` hop is used instead when
//! [`AppState::trust_forwarded_for`] is set.

use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;

use crate::app_state::AppState;

/// Header carrying the original client address through proxies.
pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Identity used for lock ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(String);

impl ClientAddr {
    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn forwarded_for(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(FORWARDED_FOR)?.to_str().ok()?;
    let first = header.split(',').next()?.trim();
    (!first.is_empty()).then(|| first.to_string())
}

impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if state.trust_forwarded_for
            && let Some(addr) = forwarded_for(parts)
        {
            return Ok(Self(addr));
        }
        let addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map_or_else(|| "unknown".to_string(), |ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(addr))
    }
}
