//! Authenticated principal.
//!
//! Sign-in happens upstream; the auth provider forwards the user id in a
//! header and every store call is scoped to it.

use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;

use crate::error::AppError;

pub const PRINCIPAL_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Principal(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Auth)?;
        Ok(Principal(id.to_string()))
    }
}
