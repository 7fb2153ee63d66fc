use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rekon_core::{User, UserId};

use crate::error::ApiError;
use crate::AppState;

/// Username of the signed-in staff member, set by the fronting session layer.
pub const USER_HEADER: &str = "x-rekon-user";

/// The acting user, when the request carries one.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl CurrentUser {
    pub fn id(&self) -> Option<UserId> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(USER_HEADER) else {
            return Ok(CurrentUser(None));
        };
        let username = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{USER_HEADER} is not valid text")))?
            .trim();

        match rekon_storage::get_user_by_username(&state.db, username).await? {
            Some(user) if user.is_active => Ok(CurrentUser(Some(user))),
            Some(_) => Err(ApiError::Forbidden(format!("user {username} is inactive"))),
            None => Err(ApiError::Forbidden(format!("unknown user {username}"))),
        }
    }
}
