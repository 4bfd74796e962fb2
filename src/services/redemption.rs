//! The redemption engine: transactional select-and-assign of a code.
//!
//! Mutual exclusion between concurrent redemptions is delegated to the
//! database: the code row is picked with `FOR UPDATE SKIP LOCKED`, so two
//! transactions can never observe the same unassigned row. Everything else
//! in here exists to keep that critical section short and bounded.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::{Postgres, Transaction};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::models::Rule;
use crate::services::database::Database;
use crate::services::error::ServiceError;
use crate::services::metrics::observe_db_query;
use crate::services::rules_cache::{RulesCache, RULES_CACHE_TTL};

/// Hard ceiling on a single redemption, layered over the caller's own
/// deadline.
const REDEEM_DEADLINE: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct RedemptionService {
    db: Database,
    rules_cache: Arc<RulesCache>,
}

impl RedemptionService {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            rules_cache: Arc::new(RulesCache::new(RULES_CACHE_TTL)),
        }
    }

    /// Assign one unassigned code from the batch to the customer.
    ///
    /// At most one caller can ever receive a given code: the row pick locks
    /// the row and skips rows locked by concurrent transactions, and the
    /// assignment only becomes visible on commit.
    #[instrument(
        skip(self),
        fields(batch_id = %batch_id, client_id = %client_id, customer_id = %customer_id)
    )]
    pub async fn redeem(
        &self,
        batch_id: Uuid,
        client_id: Uuid,
        customer_id: Uuid,
    ) -> Result<String, ServiceError> {
        tokio::time::timeout(
            REDEEM_DEADLINE,
            self.redeem_inner(batch_id, client_id, customer_id),
        )
        .await
        .map_err(|_| ServiceError::DeadlineExceeded)?
    }

    async fn redeem_inner(
        &self,
        batch_id: Uuid,
        client_id: Uuid,
        customer_id: Uuid,
    ) -> Result<String, ServiceError> {
        // Rules and the expired flag are resolved before the transaction
        // opens so the contended section stays short.
        let (rules, expired) = self.rules_cache.get(&self.db, batch_id).await?;
        if expired {
            return Err(ServiceError::BatchExpired);
        }

        let mut tx = self.db.pool().begin().await?;

        let started = Instant::now();
        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT code
            FROM codes
            WHERE batch_id = $1 AND client_id = $2 AND customer_id IS NULL
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .bind(batch_id)
        .bind(client_id)
        .fetch_optional(&mut *tx)
        .await?;
        observe_db_query("select_code", started.elapsed());

        // Dropping the transaction rolls back and releases the row lock on
        // every early return below.
        let Some(code) = code else {
            return Err(ServiceError::NoCodeAvailable);
        };

        let rule = Rule::for_batch(rules.as_ref());
        if !self.admits(rule, customer_id, &mut tx).await {
            return Err(ServiceError::RuleNotMet);
        }

        let now = Utc::now();

        let started = Instant::now();
        sqlx::query("UPDATE codes SET customer_id = $1, used_at = $2 WHERE code = $3")
            .bind(customer_id)
            .bind(now)
            .bind(&code)
            .execute(&mut *tx)
            .await?;
        observe_db_query("assign_code", started.elapsed());

        let started = Instant::now();
        sqlx::query(
            "INSERT INTO code_usage (code, batch_id, client_id, customer_id, used_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&code)
        .bind(batch_id)
        .bind(client_id)
        .bind(customer_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        observe_db_query("insert_usage", started.elapsed());

        tx.commit().await?;

        info!(code = %code, "Code redeemed");
        Ok(code)
    }

    /// Rule admission for the customer.
    ///
    /// A failed count query denies: a false denial is a retryable error for
    /// the caller, a false admission would hand out codes past the limit.
    async fn admits(
        &self,
        rule: Rule,
        customer_id: Uuid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> bool {
        match rule {
            Rule::Unrestricted => true,
            Rule::MaxPerCustomer { max, window_days } => {
                match Self::count_usage(customer_id, window_days, tx).await {
                    Ok(count) => count < max,
                    Err(e) => {
                        warn!(
                            error = %e,
                            customer_id = %customer_id,
                            "Usage count query failed, denying redemption"
                        );
                        false
                    }
                }
            }
        }
    }

    /// Count the customer's audited redemptions, optionally restricted to
    /// the last `window_days` days. The count spans all batches.
    async fn count_usage(
        customer_id: Uuid,
        window_days: i64,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64, sqlx::Error> {
        let started = Instant::now();
        let count: i64 = if window_days > 0 {
            let cutoff = Utc::now() - chrono::Duration::days(window_days);
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM code_usage WHERE customer_id = $1 AND used_at >= $2",
            )
            .bind(customer_id)
            .bind(cutoff)
            .fetch_one(&mut **tx)
            .await?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM code_usage WHERE customer_id = $1")
                .bind(customer_id)
                .fetch_one(&mut **tx)
                .await?
        };
        observe_db_query("count_usage", started.elapsed());

        Ok(count)
    }
}
