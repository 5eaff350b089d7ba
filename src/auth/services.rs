//! Account operations. Everything here is transport-free: handlers decide
//! status codes and cookies, these functions only return `AccountError`.

use lazy_static::lazy_static;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, RegisterRequest,
        ResetPasswordRequest, UpdateProfileRequest,
    },
    jwt::{JwtKeys, SessionToken},
    password::{verify_password, PasswordDigest},
    repo::CreateUserError,
    repo_types::{NewUser, Profile, ProfileUpdate},
    reset,
};
use crate::{error::AccountError, mailer::Email, state::AppState};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_BIO_LEN: usize = 250;

/// A user who just proved their credentials, with the session to hand out.
#[derive(Debug)]
pub struct Authenticated {
    pub profile: Profile,
    pub session: SessionToken,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|v| !v.trim().is_empty())
}

fn check_password_len(password: &str) -> Result<(), AccountError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountError::validation("Password must be up to 6 characters"));
    }
    Ok(())
}

#[instrument(skip(st, req))]
pub async fn register(st: &AppState, req: RegisterRequest) -> Result<Authenticated, AccountError> {
    let (Some(name), Some(email), Some(password)) =
        (present(req.name), present(req.email), present(req.password))
    else {
        return Err(AccountError::validation("Please fill in all required fields"));
    };
    let email = normalize_email(&email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AccountError::validation("Please enter a valid email"));
    }
    check_password_len(&password)?;

    if st.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AccountError::Conflict("Email has already been registered".into()));
    }

    let new_user = NewUser {
        name: name.trim().to_string(),
        email,
        password: PasswordDigest::hash(&password)?,
    };
    let user = match st.users.create(new_user).await {
        Ok(u) => u,
        Err(CreateUserError::DuplicateEmail) => {
            return Err(AccountError::Conflict("Email has already been registered".into()))
        }
        Err(CreateUserError::Other(e)) => return Err(e.into()),
    };

    let session = st.keys.issue(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(Authenticated {
        profile: user.into(),
        session,
    })
}

#[instrument(skip(st, req))]
pub async fn login(st: &AppState, req: LoginRequest) -> Result<Authenticated, AccountError> {
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(AccountError::validation("Please add email and password"));
    };
    let email = normalize_email(&email);

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AccountError::InvalidCredentials(
            "User not found, please signup".into(),
        ));
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AccountError::InvalidCredentials(
            "Invalid email or password".into(),
        ));
    }

    // Only now is a session minted.
    let session = st.keys.issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(Authenticated {
        profile: user.into(),
        session,
    })
}

/// Whether `token` is a currently valid session. Never fails.
pub fn login_status(keys: &JwtKeys, token: Option<&str>) -> bool {
    token.is_some_and(|t| keys.verify(t).is_ok())
}

#[instrument(skip(st, req))]
pub async fn update_profile(
    st: &AppState,
    user_id: Uuid,
    req: UpdateProfileRequest,
) -> Result<Profile, AccountError> {
    let name = match req.name {
        Some(n) if n.trim().is_empty() => {
            return Err(AccountError::validation("Please add a name"));
        }
        Some(n) => Some(n.trim().to_string()),
        None => None,
    };
    if req.bio.as_ref().is_some_and(|b| b.chars().count() > MAX_BIO_LEN) {
        return Err(AccountError::validation(
            "Bio must not be more than 250 characters",
        ));
    }

    let update = ProfileUpdate {
        name,
        phone: req.phone,
        bio: req.bio,
        photo: req.photo,
    };
    let profile = st
        .users
        .update_profile(user_id, &update)
        .await?
        .ok_or_else(|| AccountError::NotFound("User not found".into()))?;

    info!(user_id = %user_id, "profile updated");
    Ok(profile)
}

#[instrument(skip(st, req))]
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<(), AccountError> {
    let (Some(old_password), Some(password)) = (present(req.old_password), present(req.password))
    else {
        return Err(AccountError::validation("Please add old and new password"));
    };
    check_password_len(&password)?;

    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AccountError::NotFound("User not found, please signup".into()))?;

    if !verify_password(&old_password, &user.password_hash)? {
        warn!(user_id = %user_id, "change password with wrong old password");
        return Err(AccountError::InvalidCredentials(
            "Old password is incorrect".into(),
        ));
    }

    st.users
        .set_password(user_id, &PasswordDigest::hash(&password)?)
        .await?;
    info!(user_id = %user_id, "password changed");
    Ok(())
}

pub(crate) fn reset_url(frontend_url: &str, token: &str) -> String {
    let base = frontend_url.trim_end_matches('/');
    format!("{base}/resetpassword/{token}")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn reset_email_html(name: &str, url: &str) -> String {
    format!(
        "<h2>Hello {name}</h2>\
         <p>Please use the url below to reset your password</p>\
         <p>This reset link is valid for only 30 minutes.</p>\
         <a href=\"{url}\" clicktracking=off>{url}</a>\
         <p>Regards...</p>",
        name = escape_html(name),
    )
}

#[instrument(skip(st, req))]
pub async fn forgot_password(
    st: &AppState,
    req: ForgotPasswordRequest,
) -> Result<(), AccountError> {
    let Some(email) = present(req.email) else {
        return Err(AccountError::validation("Please add an email"));
    };
    let email = normalize_email(&email);

    let Some(user) = st.users.find_by_email(&email).await? else {
        warn!(email = %email, "reset requested for unknown email");
        return Err(AccountError::NotFound("User does not exist".into()));
    };

    let issued = reset::create(st.reset_tokens.as_ref(), user.id, OffsetDateTime::now_utc()).await?;
    let url = reset_url(&st.config.frontend_url, &issued.token);

    let mail = Email {
        subject: "Password Reset Request".into(),
        html: reset_email_html(&user.name, &url),
        to: user.email.clone(),
        from: st.config.mail.from.clone(),
        reply_to: Some(st.config.mail.from.clone()),
    };
    // The token stays live if this fails; it simply expires.
    st.mailer
        .send(&mail)
        .await
        .map_err(AccountError::EmailNotSent)?;

    info!(user_id = %user.id, "reset email sent");
    Ok(())
}

#[instrument(skip(st, token, req))]
pub async fn reset_password(
    st: &AppState,
    token: &str,
    req: ResetPasswordRequest,
) -> Result<(), AccountError> {
    let Some(password) = present(req.password) else {
        return Err(AccountError::validation("Please add a password"));
    };
    check_password_len(&password)?;

    let Some(user_id) = reset::consume(st.reset_tokens.as_ref(), token, OffsetDateTime::now_utc()).await?
    else {
        warn!("invalid or expired reset token");
        return Err(AccountError::NotFound("Invalid or Expired Token".into()));
    };

    st.users
        .set_password(user_id, &PasswordDigest::hash(&password)?)
        .await?;
    info!(user_id = %user_id, "password reset");
    Ok(())
}
