//! SQLite agreement store.
//!
//! Persists bet agreements to a single SQLite file via `sqlx`, with WAL mode
//! for concurrent read throughput. The `address` column carries a unique
//! constraint — the idempotency key for re-delivered creation events — and
//! the judged flip is a single conditional `UPDATE`.
//!
//! # Usage
//! ```rust,no_run
//! use betindex_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./bets.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use betindex_core::store::{AgreementStore, StoreError};
use betindex_core::types::{Agreement, BetState, NewAgreement};

/// SQLite-backed [`AgreementStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./bets.db"`) or a full SQLite
    /// URL (`"sqlite:./bets.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. All data is lost when the pool is
    /// dropped; ideal for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        // A single connection keeps every query on the same :memory: database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS agreements (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                address    TEXT    NOT NULL UNIQUE,
                initiator  TEXT    NOT NULL,
                judge      TEXT    NOT NULL,
                message    TEXT    NOT NULL,
                end_time   INTEGER NOT NULL,
                judged     INTEGER NOT NULL DEFAULT 0,
                verdict    INTEGER,
                state      INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                deleted_at INTEGER
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Covers the scheduler's scan predicate
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_agreements_scan
             ON agreements (judged, end_time);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    fn row_to_agreement(row: &sqlx::sqlite::SqliteRow) -> Agreement {
        Agreement {
            id: row.get("id"),
            address: row.get("address"),
            initiator: row.get("initiator"),
            judge: row.get("judge"),
            message: row.get("message"),
            end_time: row.get("end_time"),
            judged: row.get::<i64, _>("judged") != 0,
            verdict: row
                .get::<Option<i64>, _>("verdict")
                .map(|v| v != 0),
            state: BetState::from_u8(row.get::<i64, _>("state") as u8),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

const SELECT_COLUMNS: &str = "id, address, initiator, judge, message, end_time, \
                              judged, verdict, state, created_at, updated_at";

#[async_trait]
impl AgreementStore for SqliteStore {
    async fn insert(&self, bet: NewAgreement) -> Result<Agreement, StoreError> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO agreements
             (address, initiator, judge, message, end_time, judged, state, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(&bet.address)
        .bind(&bet.initiator)
        .bind(&bet.judge)
        .bind(&bet.message)
        .bind(bet.end_time)
        .bind(bet.state.as_u8() as i64)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::Duplicate {
                    address: bet.address,
                });
            }
            Err(e) => return Err(StoreError::Backend(e.to_string())),
        };

        debug!(address = %bet.address, "agreement stored");
        Ok(Agreement {
            id: result.last_insert_rowid(),
            address: bet.address,
            initiator: bet.initiator,
            judge: bet.judge,
            message: bet.message,
            end_time: bet.end_time,
            judged: false,
            verdict: None,
            state: bet.state,
            created_at: now,
            updated_at: now,
        })
    }

    async fn eligible(&self, now: i64) -> Result<Vec<Agreement>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM agreements
             WHERE end_time < ? AND judged = 0 AND deleted_at IS NULL"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(rows.iter().map(Self::row_to_agreement).collect())
    }

    async fn mark_judged(&self, id: i64, verdict: bool) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE agreements
             SET judged = 1, verdict = ?, updated_at = ?
             WHERE id = ? AND judged = 0",
        )
        .bind(verdict as i64)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // No transition — distinguish "already judged" from "no such row"
        let exists = sqlx::query("SELECT 1 FROM agreements WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound { id }),
        }
    }

    async fn get_by_address(&self, address: &str) -> Result<Option<Agreement>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM agreements WHERE address = ?"
        ))
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.as_ref().map(Self::row_to_agreement))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM agreements")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn bet(address: &str, end_time: i64) -> NewAgreement {
        NewAgreement {
            address: address.into(),
            initiator: "0xbbbb".into(),
            judge: "0xcccc".into(),
            message: "it will rain".into(),
            end_time,
            state: BetState::Open,
        }
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let store = SqliteStore::in_memory().await.unwrap();

        let inserted = store.insert(bet("0xa1", 1000)).await.unwrap();
        assert!(inserted.id > 0);
        assert!(!inserted.judged);

        let loaded = store.get_by_address("0xa1").await.unwrap().unwrap();
        assert_eq!(loaded, inserted);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_address_is_a_conflict_not_a_second_row() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.insert(bet("0xa1", 1000)).await.unwrap();
        let err = store.insert(bet("0xa1", 2000)).await.unwrap_err();
        assert!(err.is_duplicate());

        assert_eq!(store.count().await.unwrap(), 1);
        // The original row is untouched
        let row = store.get_by_address("0xa1").await.unwrap().unwrap();
        assert_eq!(row.end_time, 1000);
    }

    #[tokio::test]
    async fn scan_selects_exactly_the_due_unjudged_set() {
        let store = SqliteStore::in_memory().await.unwrap();

        store.insert(bet("0xpast", 999)).await.unwrap();
        store.insert(bet("0xboundary", 1000)).await.unwrap();
        store.insert(bet("0xfuture", 1001)).await.unwrap();
        let judged = store.insert(bet("0xjudged", 1)).await.unwrap();
        store.mark_judged(judged.id, true).await.unwrap();

        let due = store.eligible(1000).await.unwrap();
        let addresses: Vec<_> = due.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addresses, vec!["0xpast"]);
    }

    #[tokio::test]
    async fn mark_judged_persists_verdict_once() {
        let store = SqliteStore::in_memory().await.unwrap();
        let a = store.insert(bet("0xa1", 999)).await.unwrap();

        assert!(store.mark_judged(a.id, false).await.unwrap());
        assert!(!store.mark_judged(a.id, true).await.unwrap());

        let row = store.get_by_address("0xa1").await.unwrap().unwrap();
        assert!(row.judged);
        assert_eq!(row.verdict, Some(false));
        assert!(store.eligible(10_000).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mark_judged_missing_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(matches!(
            store.mark_judged(42, true).await.unwrap_err(),
            StoreError::NotFound { id: 42 }
        ));
    }

    #[tokio::test]
    async fn state_roundtrips_through_the_integer_column() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut b = bet("0xa1", 999);
        b.state = BetState::Cancelled;
        store.insert(b).await.unwrap();

        let row = store.get_by_address("0xa1").await.unwrap().unwrap();
        assert_eq!(row.state, BetState::Cancelled);
    }
}
