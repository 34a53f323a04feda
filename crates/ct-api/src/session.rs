//! Per-request session extraction.
//!
//! Authentication itself is owned by the fronting layer; this server trusts
//! the identity headers it injects and resolves them once per request into a
//! [`SessionContext`] carrying the actor's capability set.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::ops::Deref;

use ct_core::{Role, SessionContext};

use crate::error::ApiError;

/// Header carrying the acting user's numeric id.
pub const ACTOR_ID_HEADER: &str = "X-Actor-Id";
/// Header carrying the acting user's display name (optional).
pub const ACTOR_NAME_HEADER: &str = "X-Actor-Name";
/// Header carrying the acting user's role.
pub const ACTOR_ROLE_HEADER: &str = "X-Actor-Role";

/// Extractor wrapping the resolved [`SessionContext`].
#[derive(Debug, Clone)]
pub struct Session(pub SessionContext);

impl Deref for Session {
    type Target = SessionContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = header_value(parts, ACTOR_ID_HEADER)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized(format!("Missing or invalid {} header", ACTOR_ID_HEADER))
            })?;

        let role_value = header_value(parts, ACTOR_ROLE_HEADER).ok_or_else(|| {
            ApiError::Unauthorized(format!("Missing {} header", ACTOR_ROLE_HEADER))
        })?;

        let role = Role::parse(role_value)
            .ok_or_else(|| ApiError::Unauthorized(format!("Unknown role '{}'", role_value)))?;

        let actor_name = header_value(parts, ACTOR_NAME_HEADER).unwrap_or_default();

        Ok(Session(SessionContext::new(actor_id, actor_name, role)))
    }
}
