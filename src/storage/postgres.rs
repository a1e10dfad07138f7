use crate::config::{DatabaseConfig, SslMode};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use std::time::Duration;

const CREATE_ANALYTICS_TABLE: &str = "CREATE TABLE IF NOT EXISTS analytics (
    time    TIMESTAMP,
    user_id VARCHAR(255),
    data    jsonb
)";

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Allow => PgSslMode::Allow,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

pub fn connect_options(config: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(&config.password)
        .database(&config.dbname)
        .ssl_mode(config.sslmode.into())
}

/// Open the connection pool. Fails if no connection can be established.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(connect_options(config))
        .await
}

/// Idempotent schema bootstrap.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_ANALYTICS_TABLE).execute(pool).await?;
    tracing::info!(table = "analytics", "schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sslmode_mapping() {
        assert!(matches!(
            PgSslMode::from(SslMode::Disable),
            PgSslMode::Disable
        ));
        assert!(matches!(
            PgSslMode::from(SslMode::VerifyFull),
            PgSslMode::VerifyFull
        ));
    }

    #[test]
    fn test_connect_options() {
        let config = DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            user: "analytics".to_string(),
            password: "secret".to_string(),
            dbname: "events".to_string(),
            sslmode: SslMode::Require,
            max_connections: 4,
            acquire_timeout_secs: 1,
        };
        let opts = connect_options(&config);
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_username(), "analytics");
        assert_eq!(opts.get_database(), Some("events"));
    }
}
