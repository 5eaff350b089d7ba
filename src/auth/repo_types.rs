use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::password::PasswordDigest;

/// Full user record, including the stored password hash.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string, never plaintext
    pub photo: String,
    pub phone: String,
    pub bio: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// User record as seen by everything that does not verify passwords.
#[derive(Debug, Clone, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: String,
    pub phone: String,
    pub bio: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<User> for Profile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
            photo: u.photo,
            phone: u.phone,
            bio: u.bio,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Input for creating a user. The password is already hashed.
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: PasswordDigest,
}

/// Profile fields to overwrite; `None` keeps the stored value.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ResetTokenRecord {
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
