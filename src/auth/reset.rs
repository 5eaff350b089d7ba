//! Single-use password reset tokens.
//!
//! The plaintext token only ever leaves this module towards the mail channel.
//! The store keeps a SHA-256 of it, so a leaked table cannot be replayed.

use anyhow::Context;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use super::{repo::ResetTokenStore, repo_types::ResetTokenRecord};

pub const RESET_TOKEN_TTL: Duration = Duration::minutes(30);

/// A newly created token. `token` is the plaintext for the reset link.
#[derive(Debug, Clone)]
pub struct IssuedResetToken {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

/// 32 random bytes, hex-encoded, suffixed with the user id.
pub fn generate_reset_token(user_id: Uuid) -> anyhow::Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate reset token")?;
    Ok(format!("{}{}", hex::encode(bytes), user_id.simple()))
}

pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Issue a token for `user_id`, replacing any token it already had.
pub async fn create(
    store: &dyn ResetTokenStore,
    user_id: Uuid,
    now: OffsetDateTime,
) -> anyhow::Result<IssuedResetToken> {
    let token = generate_reset_token(user_id)?;
    let expires_at = now + RESET_TOKEN_TTL;
    store
        .replace_for_user(ResetTokenRecord {
            user_id,
            token_hash: hash_reset_token(&token),
            created_at: now,
            expires_at,
        })
        .await?;
    info!(user_id = %user_id, expires_at = %expires_at, "reset token created");
    Ok(IssuedResetToken { token, expires_at })
}

/// Redeem a plaintext token. Returns the bound user id, or `None` when the
/// token is unknown, already used or expired. A matching record is removed
/// in every case.
pub async fn consume(
    store: &dyn ResetTokenStore,
    token: &str,
    now: OffsetDateTime,
) -> anyhow::Result<Option<Uuid>> {
    let Some(record) = store.take_by_hash(&hash_reset_token(token)).await? else {
        debug!("reset token not found");
        return Ok(None);
    };
    if record.expires_at <= now {
        debug!(user_id = %record.user_id, "reset token expired");
        return Ok(None);
    }
    Ok(Some(record.user_id))
}
