use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    password::PasswordDigest,
    repo_types::{NewUser, Profile, ProfileUpdate, ResetTokenRecord, User},
};

#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistent user records, unique on email.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    /// Same as [`UserStore::find_by_id`] but never loads the password hash.
    async fn find_profile(&self, id: Uuid) -> anyhow::Result<Option<Profile>>;
    async fn create(&self, user: NewUser) -> Result<User, CreateUserError>;
    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<Profile>>;
    async fn set_password(&self, id: Uuid, password: &PasswordDigest) -> anyhow::Result<()>;
}

/// Hashed password reset tokens, at most one per user.
#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Drop any record for `record.user_id`, then store `record`.
    async fn replace_for_user(&self, record: ResetTokenRecord) -> anyhow::Result<()>;
    /// Remove and return the record with this hash, if one exists.
    async fn take_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<ResetTokenRecord>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_profile(&self, id: Uuid) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, name, email, photo, phone, bio, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find profile")?;
        Ok(profile)
    }

    async fn create(&self, user: NewUser) -> Result<User, CreateUserError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, password_hash, photo, phone, bio, created_at, updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.password.as_str())
        .fetch_one(&self.db)
        .await;

        match created {
            Ok(u) => Ok(u),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(CreateUserError::DuplicateEmail)
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: &ProfileUpdate,
    ) -> anyhow::Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   phone = COALESCE($3, phone),
                   bio = COALESCE($4, bio),
                   photo = COALESCE($5, photo),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, photo, phone, bio, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.phone.as_deref())
        .bind(update.bio.as_deref())
        .bind(update.photo.as_deref())
        .fetch_optional(&self.db)
        .await
        .context("update profile")?;
        Ok(profile)
    }

    async fn set_password(&self, id: Uuid, password: &PasswordDigest) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET password_hash = $2,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password.as_str())
        .execute(&self.db)
        .await
        .context("set password")?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgResetTokenStore {
    db: PgPool,
}

impl PgResetTokenStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    async fn replace_for_user(&self, record: ResetTokenRecord) -> anyhow::Result<()> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        sqlx::query("DELETE FROM reset_tokens WHERE user_id = $1")
            .bind(record.user_id)
            .execute(&mut *tx)
            .await
            .context("delete previous reset token")?;
        sqlx::query(
            r#"
            INSERT INTO reset_tokens (user_id, token_hash, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&mut *tx)
        .await
        .context("insert reset token")?;
        tx.commit().await.context("commit tx")?;
        Ok(())
    }

    async fn take_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<ResetTokenRecord>> {
        let record = sqlx::query_as::<_, ResetTokenRecord>(
            r#"
            DELETE FROM reset_tokens
             WHERE token_hash = $1
            RETURNING user_id, token_hash, created_at, expires_at
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await
        .context("take reset token")?;
        Ok(record)
    }
}

/// Delete reset tokens that expired at or before `now`.
pub async fn purge_expired_reset_tokens(db: &PgPool, now: OffsetDateTime) -> anyhow::Result<u64> {
    let done = sqlx::query("DELETE FROM reset_tokens WHERE expires_at <= $1")
        .bind(now)
        .execute(db)
        .await
        .context("purge expired reset tokens")?;
    Ok(done.rows_affected())
}
