use std::time::Duration;

use time::OffsetDateTime;

mod app;
mod auth;
mod config;
mod error;
mod mailer;
mod state;
#[cfg(test)]
mod testing;

const RESET_TOKEN_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userauth=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let (app_state, db) = state::AppState::init().await?;

    // Run migrations if present
    if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
        tracing::warn!(error = %e, "migrations folder not found or migration failed; continuing");
    }

    // Sweep expired reset tokens.
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(RESET_TOKEN_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            match auth::repo::purge_expired_reset_tokens(&db, OffsetDateTime::now_utc()).await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "expired reset tokens removed"),
                Err(e) => tracing::warn!(error = %e, "reset token sweep failed"),
            }
        }
    });

    app::serve(app::build_app(app_state)).await
}
