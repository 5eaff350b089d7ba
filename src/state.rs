use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::auth::{
    jwt::JwtKeys,
    repo::{PgResetTokenStore, PgUserStore, ResetTokenStore, UserStore},
};
use crate::config::AppConfig;
use crate::mailer::{Mailer, SmtpMailer};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub users: Arc<dyn UserStore>,
    pub reset_tokens: Arc<dyn ResetTokenStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    /// Load config, connect to the database and the mail relay.
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let mailer = Arc::new(SmtpMailer::new(&config.mail)?) as Arc<dyn Mailer>;

        let state = Self::from_parts(
            config,
            Arc::new(PgUserStore::new(db.clone())),
            Arc::new(PgResetTokenStore::new(db.clone())),
            mailer,
        );
        Ok((state, db))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        reset_tokens: Arc<dyn ResetTokenStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            keys: JwtKeys::from_config(&config.jwt),
            config,
            users,
            reset_tokens,
            mailer,
        }
    }
}
