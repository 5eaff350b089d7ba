use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Outbound SMTP settings for password reset mail.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub frontend_url: String,
    pub app_env: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `var`, which returns a variable's value if set.
    /// Blank required values count as missing.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            var(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} must be set"))
        };

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "userauth".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "userauth-users".into()),
        };

        let username = var("EMAIL_USER");
        let mail = MailConfig {
            host: var("EMAIL_HOST").unwrap_or_else(|| "smtp.gmail.com".into()),
            port: var("EMAIL_PORT")
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            from: var("EMAIL_FROM")
                .or_else(|| username.clone())
                .unwrap_or_else(|| "noreply@localhost".into()),
            password: var("EMAIL_PASS"),
            username,
        };

        Ok(Self {
            database_url,
            jwt,
            mail,
            frontend_url: var("FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            app_env: var("APP_ENV").unwrap_or_else(|| "production".into()),
        })
    }

    /// Error bodies carry a debug trace only outside production.
    pub fn expose_error_stack(&self) -> bool {
        self.app_env == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn required_vars_and_defaults() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("JWT_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(cfg.jwt.secret, "s3cret");
        assert_eq!(cfg.jwt.issuer, "userauth");
        assert_eq!(cfg.mail.port, 587);
        assert_eq!(cfg.mail.from, "noreply@localhost");
        assert_eq!(cfg.app_env, "production");
        assert!(!cfg.expose_error_stack());
    }

    #[test]
    fn missing_secret_fails() {
        let err = load(&[("DATABASE_URL", "postgres://localhost/app")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        for secret in ["", "   "] {
            let err = load(&[
                ("DATABASE_URL", "postgres://localhost/app"),
                ("JWT_SECRET", secret),
            ])
            .unwrap_err();
            assert!(err.to_string().contains("JWT_SECRET"));
        }
    }

    #[test]
    fn blank_database_url_fails() {
        let err = load(&[("DATABASE_URL", ""), ("JWT_SECRET", "s3cret")]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn mail_sender_falls_back_to_smtp_user() {
        let cfg = load(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("JWT_SECRET", "s3cret"),
            ("EMAIL_USER", "mailer@example.com"),
            ("EMAIL_PORT", "2525"),
            ("APP_ENV", "development"),
        ])
        .unwrap();
        assert_eq!(cfg.mail.from, "mailer@example.com");
        assert_eq!(cfg.mail.username.as_deref(), Some("mailer@example.com"));
        assert_eq!(cfg.mail.port, 2525);
        assert!(cfg.expose_error_stack());
    }
}
