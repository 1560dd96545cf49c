//! Request identity extracted from headers.

use std::str::FromStr;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{SessionId, UserId};
use domain::Actor;

use crate::error::ApiError;

pub const SESSION_HEADER: &str = "x-session-id";
pub const USER_HEADER: &str = "x-user-id";
pub const STAFF_HEADER: &str = "x-staff";

/// The caller's session, which owns the cart.
#[derive(Debug, Clone)]
pub struct Session(pub SessionId);

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentActor(pub Actor);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<St: Send + Sync> FromRequestParts<St> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        header(parts, SESSION_HEADER)
            .map(|key| Session(SessionId::new(key)))
            .ok_or_else(|| ApiError::BadRequest(format!("Missing {SESSION_HEADER} header")))
    }
}

impl<St: Send + Sync> FromRequestParts<St> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let raw = header(parts, USER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Please log in to continue".to_string()))?;
        let user_id = UserId::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid {USER_HEADER}: {e}")))?;
        let is_staff = header(parts, STAFF_HEADER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        Ok(CurrentActor(if is_staff {
            Actor::staff(user_id)
        } else {
            Actor::customer(user_id)
        }))
    }
}
