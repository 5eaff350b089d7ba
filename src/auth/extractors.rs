use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::debug;

use super::{cookie::read_session_token, repo_types::Profile};
use crate::{error::AccountError, state::AppState};

/// The signed-in user behind the request's session cookie.
pub struct CurrentUser(pub Profile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AccountError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = read_session_token(&parts.headers).ok_or(AccountError::NotAuthenticated)?;

        let claims = state.keys.verify(&token).map_err(|e| {
            debug!(reason = %e, "session rejected");
            AccountError::NotAuthenticated
        })?;

        // Token outlived its user
        let profile = state
            .users
            .find_profile(claims.sub)
            .await?
            .ok_or_else(|| {
                debug!(user_id = %claims.sub, "session user missing");
                AccountError::NotAuthenticated
            })?;

        Ok(CurrentUser(profile))
    }
}
