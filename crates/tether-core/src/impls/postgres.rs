//! PostgreSQL lease store implementation.
//!
//! The production backend. The database is the single time authority here:
//! every availability and expiry comparison uses the server's `now()`, so
//! instances with skewed clocks cannot disagree about who holds what.
//!
//! Mutual exclusion per the port contract: `SELECT ... FOR UPDATE` takes a
//! transaction-scoped row lock on the candidate, and the `UPDATE` re-checks
//! availability in its `WHERE` clause. A concurrent acquirer either blocks
//! on the row lock and then sees the row taken, or races the guard and
//! updates zero rows.

use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{AssignmentName, HolderId, Lease, LeaseError};
use crate::ports::LeaseStore;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS lease_pool (
    id               BIGINT PRIMARY KEY,
    assignment_name  TEXT UNIQUE NOT NULL,
    holder_id        TEXT NULL,
    locked_at        TIMESTAMPTZ NULL,
    lock_expires_at  TIMESTAMPTZ NULL,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at       TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const LEASE_COLUMNS: &str =
    "id, assignment_name, holder_id, locked_at, lock_expires_at, created_at, updated_at";

/// Lease pool backed by a `lease_pool` table.
pub struct PgLeaseStore {
    pool: PgPool,
}

impl PgLeaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small dedicated pool; the lease manager only ever
    /// runs one startup acquisition plus one renewal at a time.
    pub async fn connect(database_url: &str) -> Result<Self, LeaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(LeaseError::storage)?;
        Ok(Self::new(pool))
    }

    /// Create the `lease_pool` table if it does not exist.
    pub async fn migrate(&self) -> Result<(), LeaseError> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(LeaseError::storage)?;
        Ok(())
    }

    /// Idempotently provision pool rows. Existing assignments are left
    /// untouched; the manager never deletes rows.
    pub async fn seed<I>(&self, names: I) -> Result<(), LeaseError>
    where
        I: IntoIterator<Item = AssignmentName>,
    {
        for (i, name) in names.into_iter().enumerate() {
            sqlx::query(
                "INSERT INTO lease_pool (id, assignment_name) VALUES ($1, $2) \
                 ON CONFLICT (assignment_name) DO NOTHING",
            )
            .bind(i as i64 + 1)
            .bind(name.as_str())
            .execute(&self.pool)
            .await
            .map_err(LeaseError::storage)?;
        }
        Ok(())
    }
}

fn lease_from_row(row: &PgRow) -> Result<Lease, sqlx::Error> {
    Ok(Lease {
        id: row.try_get("id")?,
        assignment_name: AssignmentName::new(row.try_get::<String, _>("assignment_name")?),
        holder_id: row
            .try_get::<Option<String>, _>("holder_id")?
            .map(HolderId::new),
        locked_at: row.try_get("locked_at")?,
        lock_expires_at: row.try_get("lock_expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    async fn acquire(
        &self,
        holder: &HolderId,
        duration: Duration,
    ) -> Result<Option<Lease>, LeaseError> {
        let mut tx = self.pool.begin().await.map_err(LeaseError::storage)?;

        // Lowest-id available row, locked for the rest of the transaction.
        let candidate = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM lease_pool \
             WHERE holder_id IS NULL OR lock_expires_at < now() \
             ORDER BY id \
             LIMIT 1 \
             FOR UPDATE",
        ))
        .fetch_optional(&mut *tx)
        .await
        .map_err(LeaseError::storage)?;

        let Some(candidate) = candidate else {
            // No side effects to roll back, but end the transaction cleanly.
            tx.commit().await.map_err(LeaseError::storage)?;
            return Ok(None);
        };
        let candidate = lease_from_row(&candidate).map_err(LeaseError::storage)?;

        // Conditional claim: the WHERE clause re-checks availability, so a
        // racing acquirer that committed first turns this into a no-op.
        let claimed = sqlx::query(
            "UPDATE lease_pool \
             SET holder_id = $1, \
                 locked_at = now(), \
                 lock_expires_at = now() + make_interval(secs => $2), \
                 updated_at = now() \
             WHERE id = $3 AND (holder_id IS NULL OR lock_expires_at < now())",
        )
        .bind(holder.as_str())
        .bind(duration.as_secs_f64())
        .bind(candidate.id)
        .execute(&mut *tx)
        .await
        .map_err(LeaseError::storage)?;

        if claimed.rows_affected() == 0 {
            tx.commit().await.map_err(LeaseError::storage)?;
            return Ok(None);
        }

        // Read back the post-update row by holder identity.
        let acquired = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM lease_pool WHERE holder_id = $1 ORDER BY id LIMIT 1",
        ))
        .bind(holder.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(LeaseError::storage)?;

        tx.commit().await.map_err(LeaseError::storage)?;

        match acquired {
            Some(row) => Ok(Some(lease_from_row(&row).map_err(LeaseError::storage)?)),
            None => Ok(None),
        }
    }

    async fn release(&self, holder: &HolderId) -> Result<bool, LeaseError> {
        let mut tx = self.pool.begin().await.map_err(LeaseError::storage)?;
        let result = sqlx::query(
            "UPDATE lease_pool \
             SET holder_id = NULL, locked_at = NULL, lock_expires_at = NULL, updated_at = now() \
             WHERE holder_id = $1",
        )
        .bind(holder.as_str())
        .execute(&mut *tx)
        .await
        .map_err(LeaseError::storage)?;
        tx.commit().await.map_err(LeaseError::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn renew(&self, holder: &HolderId, duration: Duration) -> Result<bool, LeaseError> {
        let mut tx = self.pool.begin().await.map_err(LeaseError::storage)?;
        // Expiry takes precedence over identity: a renewal that arrives
        // after the deadline must fail rather than resurrect the lease.
        // `>=` is the exact complement of the acquisition guard's
        // `lock_expires_at < now()`: at the instant of expiry the row is
        // still renewable and not yet claimable.
        let result = sqlx::query(
            "UPDATE lease_pool \
             SET lock_expires_at = now() + make_interval(secs => $1), updated_at = now() \
             WHERE holder_id = $2 AND lock_expires_at >= now()",
        )
        .bind(duration.as_secs_f64())
        .bind(holder.as_str())
        .execute(&mut *tx)
        .await
        .map_err(LeaseError::storage)?;
        tx.commit().await.map_err(LeaseError::storage)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_holder(&self, holder: &HolderId) -> Result<Option<Lease>, LeaseError> {
        let row = sqlx::query(&format!(
            "SELECT {LEASE_COLUMNS} FROM lease_pool WHERE holder_id = $1 ORDER BY id LIMIT 1",
        ))
        .bind(holder.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(LeaseError::storage)?;

        match row {
            Some(row) => Ok(Some(lease_from_row(&row).map_err(LeaseError::storage)?)),
            None => Ok(None),
        }
    }
}
