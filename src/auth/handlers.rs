use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    routing::{get, patch, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        cookie::{cleared_session_cookie, read_session_token, session_cookie},
        dto::{
            AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, ForgotPasswordResponse,
            JsonBody, LoginRequest, MessageResponse, PublicUser, RegisterRequest,
            ResetPasswordRequest, UpdateProfileRequest,
        },
        extractors::CurrentUser,
        jwt::JwtKeys,
        services::{self, Authenticated},
    },
    error::AccountError,
    state::AppState,
};

type CookieResponse<T> = (StatusCode, [(axum::http::HeaderName, HeaderValue); 1], Json<T>);

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/loggedin", get(login_status))
        .route("/forgotpassword", post(forgot_password))
        .route("/resetpassword/:reset_token", put(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/getuser", get(get_user))
        .route("/updateUser", patch(update_user))
        .route("/changePassword", patch(change_password))
}

fn signed_in(
    status: StatusCode,
    auth: Authenticated,
) -> Result<CookieResponse<AuthResponse>, AccountError> {
    let cookie = session_cookie(&auth.session.token, auth.session.expires_at)?;
    Ok((
        status,
        [(SET_COOKIE, cookie)],
        Json(AuthResponse {
            user: auth.profile.into(),
            token: auth.session.token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<CookieResponse<AuthResponse>, AccountError> {
    let auth = services::register(&state, payload).await?;
    signed_in(StatusCode::CREATED, auth)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<CookieResponse<AuthResponse>, AccountError> {
    let auth = services::login(&state, payload).await?;
    signed_in(StatusCode::OK, auth)
}

#[instrument]
pub async fn logout() -> Result<CookieResponse<MessageResponse>, AccountError> {
    Ok((
        StatusCode::OK,
        [(SET_COOKIE, cleared_session_cookie()?)],
        Json(MessageResponse {
            message: "Successfully logged out!",
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login_status(State(keys): State<JwtKeys>, headers: HeaderMap) -> Json<bool> {
    let token = read_session_token(&headers);
    Json(services::login_status(&keys, token.as_deref()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_user(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user.into())
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<UpdateProfileRequest>,
) -> Result<Json<PublicUser>, AccountError> {
    let profile = services::update_profile(&state, user.id, payload).await?;
    Ok(Json(profile.into()))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(payload): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AccountError> {
    services::change_password(&state, user.id, payload).await?;
    Ok(Json(MessageResponse {
        message: "Password change successful",
    }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<ForgotPasswordResponse>, AccountError> {
    services::forgot_password(&state, payload).await?;
    Ok(Json(ForgotPasswordResponse {
        success: true,
        message: "Reset Email Sent",
    }))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AccountError> {
    services::reset_password(&state, &reset_token, payload).await?;
    Ok(Json(MessageResponse {
        message: "Password Reset Successful, Please Login",
    }))
}
