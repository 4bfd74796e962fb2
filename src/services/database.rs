//! Database service for redemption-service.
//!
//! Owns the connection pool: bounded-retry startup, health checks, the
//! background pool monitor, and the shared read queries.

use std::time::{Duration, Instant};

use anyhow::Context;
use secrecy::ExposeSecret;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tokio::time::MissedTickBehavior;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::models::{Batch, Rules};
use crate::services::error::ServiceError;
use crate::services::metrics::observe_db_query;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(5);
const REQUIRED_TABLES: [&str; 3] = ["batches", "codes", "code_usage"];

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    max_connections: u32,
}

impl Database {
    /// Connect with a bounded retry budget.
    ///
    /// Each attempt dials the backend, applies migrations (idempotent) and
    /// verifies that the required tables exist and that `SELECT 1` works.
    /// Exhausting the budget is fatal: the caller is expected to abort
    /// startup.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let mut last_error = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            match Self::try_connect(config).await {
                Ok(pool) => {
                    info!(attempt, "Connected to PostgreSQL");
                    return Ok(Self {
                        pool,
                        max_connections: config.max_connections,
                    });
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = CONNECT_ATTEMPTS,
                        error = %e,
                        "Database connection attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < CONNECT_ATTEMPTS {
                        tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("no connection attempt was made"))
            .context(format!(
                "backend unavailable after {} attempts",
                CONNECT_ATTEMPTS
            )))
    }

    async fn try_connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(Duration::from_secs(config.max_idle_time_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(config.url.expose_secret())
            .await
            .context("failed to connect to PostgreSQL")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;

        Self::verify_schema(&pool).await?;

        Ok(pool)
    }

    async fn verify_schema(pool: &PgPool) -> anyhow::Result<()> {
        for table in REQUIRED_TABLES {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
            )
            .bind(table)
            .fetch_one(pool)
            .await
            .with_context(|| format!("error checking if table {table} exists"))?;

            if !exists {
                anyhow::bail!("required table {table} does not exist");
            }
        }

        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(pool)
            .await
            .context("error testing database connection")?;

        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Fetch `(rules, expired)` for a batch. `None` means the batch does not
    /// exist.
    #[instrument(skip(self), fields(batch_id = %batch_id))]
    pub async fn fetch_batch_rules(
        &self,
        batch_id: Uuid,
    ) -> Result<Option<(Option<Rules>, bool)>, ServiceError> {
        let started = Instant::now();
        let row: Option<(Option<Json<Rules>>, bool)> =
            sqlx::query_as("SELECT rules, expired FROM batches WHERE id = $1")
                .bind(batch_id)
                .fetch_optional(&self.pool)
                .await?;
        observe_db_query("fetch_batch_rules", started.elapsed());

        Ok(row.map(|(rules, expired)| (rules.map(|Json(rules)| rules), expired)))
    }

    /// List all non-expired batches.
    #[instrument(skip(self))]
    pub async fn list_active_batches(&self) -> Result<Vec<Batch>, ServiceError> {
        let started = Instant::now();
        let batches = sqlx::query_as::<_, Batch>(
            "SELECT id, name, rules, expired FROM batches WHERE expired = false ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        observe_db_query("list_batches", started.elapsed());

        Ok(batches)
    }

    /// Spawn the background pool monitor.
    ///
    /// At every tick it logs pool occupancy, probes one pooled connection
    /// (detaching it on failure so it is never reused), and terminates
    /// backend sessions left "idle in transaction" past the threshold.
    pub fn spawn_monitor(&self, interval: Duration) {
        let db = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately; the
            // monitor should first run one full interval after startup.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                db.monitor_once().await;
            }
        });
    }

    async fn monitor_once(&self) {
        let total = self.pool.size();
        let idle = self.pool.num_idle();
        info!(
            total,
            idle,
            in_use = total as usize - idle,
            max = self.max_connections,
            "DB pool stats"
        );

        match self.pool.acquire().await {
            Ok(mut conn) => {
                if let Err(e) = sqlx::query("SELECT 1").execute(&mut *conn).await {
                    warn!(error = %e, "Detaching stalled connection from pool");
                    let _ = conn.detach();
                }
            }
            Err(e) => warn!(error = %e, "Unable to acquire connection for pool probe"),
        }

        if let Err(e) = sqlx::query(
            r#"
            SELECT pg_terminate_backend(pid)
            FROM pg_stat_activity
            WHERE state = 'idle in transaction'
              AND state_change < NOW() - INTERVAL '30 seconds'
              AND pid <> pg_backend_pid()
            "#,
        )
        .execute(&self.pool)
        .await
        {
            warn!(error = %e, "Failed to terminate stalled transactions");
        }
    }
}
