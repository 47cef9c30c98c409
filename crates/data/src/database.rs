use anyhow::{Context, Result};
use coin_pulse_core::{DatabaseConfig, DbRole};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::repositories::Repositories;

pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Connects with the URL configured for a role.
    ///
    /// An unreachable store or rejected credentials surface here, at job start.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn connect(config: &DatabaseConfig, role: DbRole) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(config.url_for(role))
            .await
            .with_context(|| format!("Failed to connect to database as {role:?}"))?;

        tracing::debug!(?role, "Database pool ready");
        Ok(Self { pool })
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn repositories(&self) -> Repositories {
        Repositories::new(self.pool.clone())
    }
}
