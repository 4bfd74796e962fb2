//! Process-local TTL cache for batch rules.
//!
//! The hot path reads `(rules, expired)` for a batch on every redemption;
//! this cache keeps that read off the database for up to [`RULES_CACHE_TTL`].
//! Entries are filled lazily and published last-writer-wins — concurrent
//! fills for the same batch are allowed, a duplicated read is cheaper than a
//! per-key lock. Nothing invalidates entries from inside the process, so a
//! batch expired out-of-band keeps redeeming for up to one TTL.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::models::Rules;
use crate::services::database::Database;
use crate::services::error::ServiceError;

pub const RULES_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CachedRules {
    rules: Option<Rules>,
    expired: bool,
    cached_at: Instant,
}

pub struct RulesCache {
    entries: DashMap<Uuid, CachedRules>,
    ttl: Duration,
}

impl RulesCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Resolve `(rules, expired)` for a batch, from cache when fresh,
    /// otherwise from the database.
    pub async fn get(
        &self,
        db: &Database,
        batch_id: Uuid,
    ) -> Result<(Option<Rules>, bool), ServiceError> {
        if let Some(cached) = self.lookup(batch_id) {
            return Ok(cached);
        }

        let (rules, expired) = db
            .fetch_batch_rules(batch_id)
            .await?
            .ok_or(ServiceError::BatchNotFound)?;
        self.store(batch_id, rules, expired);

        Ok((rules, expired))
    }

    fn lookup(&self, batch_id: Uuid) -> Option<(Option<Rules>, bool)> {
        let entry = self.entries.get(&batch_id)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some((entry.rules, entry.expired))
        } else {
            None
        }
    }

    fn store(&self, batch_id: Uuid, rules: Option<Rules>, expired: bool) {
        self.entries.insert(
            batch_id,
            CachedRules {
                rules,
                expired,
                cached_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> Rules {
        Rules {
            maxpercustomer: 1,
            timelimit: 30,
        }
    }

    #[test]
    fn fresh_entries_are_returned() {
        let cache = RulesCache::new(Duration::from_secs(60));
        let batch_id = Uuid::new_v4();

        cache.store(batch_id, Some(sample_rules()), false);

        assert_eq!(
            cache.lookup(batch_id),
            Some((Some(sample_rules()), false))
        );
    }

    #[test]
    fn stale_entries_are_not_returned() {
        let cache = RulesCache::new(Duration::ZERO);
        let batch_id = Uuid::new_v4();

        cache.store(batch_id, Some(sample_rules()), false);

        assert_eq!(cache.lookup(batch_id), None);
    }

    #[test]
    fn unknown_batches_miss() {
        let cache = RulesCache::new(Duration::from_secs(60));
        assert_eq!(cache.lookup(Uuid::new_v4()), None);
    }

    #[test]
    fn refills_are_last_writer_wins() {
        let cache = RulesCache::new(Duration::from_secs(60));
        let batch_id = Uuid::new_v4();

        cache.store(batch_id, Some(sample_rules()), false);
        cache.store(batch_id, Some(sample_rules()), true);

        assert_eq!(cache.lookup(batch_id), Some((Some(sample_rules()), true)));
    }
}
