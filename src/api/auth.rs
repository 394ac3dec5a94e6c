//! Requester identity.
//!
//! Authentication happens upstream; the verified user id arrives in the
//! [`USER_ID_HEADER`] header.

use crate::{api::error::AppError, errors::Error};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated requester. Extraction fails with 401 when the header is missing
/// or is not a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub i64);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(Self)
            .ok_or_else(|| Error::NotAuthenticated.into())
    }
}
