//! SQLite store backing the four Memline collections.
//!
//! One database file, four tables plus the recent-window index:
//! - `streams` — one row per stream scope (summary, next turn number)
//! - `turns` — append-only turn log, `UNIQUE(scope, number)`
//! - `recent_turns` — the not-yet-compacted window per scope
//! - `hard_facts` — append-only fact ledger; `active` is the only column
//!   ever updated, and only as half of a supersession
//! - `compacted_summaries` — append-only summary ranges
//!
//! Supersession and compaction commits run inside a single transaction so
//! readers never observe the intermediate state.

use async_trait::async_trait;
use chrono::Utc;
use memline_core::error::StoreError;
use memline_core::fact::{FactCategory, HardFact, Provenance};
use memline_core::scope::StreamScope;
use memline_core::store::StateStore;
use memline_core::stream::{StreamRecord, TurnRef};
use memline_core::summary::CompactedSummary;
use memline_core::turn::{Citation, Turn, TurnRole};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A durable SQLite-backed store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection, so the pool must
        // hold exactly one and never recycle it.
        let is_memory = path.contains(":memory:");
        let pool = SqlitePoolOptions::new()
            .max_connections(if is_memory { 1 } else { 4 })
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Run schema migrations.
    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS streams (
                id              TEXT UNIQUE NOT NULL,
                scope           TEXT PRIMARY KEY,
                summary         TEXT NOT NULL DEFAULT '',
                next_turn       INTEGER NOT NULL DEFAULT 1,
                last_compaction TEXT,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("streams table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS turns (
                id         TEXT PRIMARY KEY,
                scope      TEXT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                number     INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                citations  TEXT NOT NULL DEFAULT '[]',
                UNIQUE(scope, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_turns_scope_number ON turns(scope, number)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("turns index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recent_turns (
                scope   TEXT NOT NULL,
                turn_id TEXT NOT NULL,
                number  INTEGER NOT NULL,
                PRIMARY KEY(scope, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("recent_turns table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hard_facts (
                iid          INTEGER PRIMARY KEY AUTOINCREMENT,
                id           TEXT UNIQUE NOT NULL,
                scope        TEXT NOT NULL,
                text         TEXT NOT NULL,
                category     TEXT NOT NULL,
                conflict_key TEXT,
                turn_id      TEXT,
                confidence   REAL NOT NULL,
                extractor    TEXT NOT NULL,
                active       INTEGER NOT NULL DEFAULT 1,
                supersedes   TEXT,
                created_at   TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("hard_facts table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_facts_scope_active ON hard_facts(scope, active)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("facts index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS compacted_summaries (
                id               TEXT PRIMARY KEY,
                scope            TEXT NOT NULL,
                text             TEXT NOT NULL,
                turn_range_start INTEGER NOT NULL,
                turn_range_end   INTEGER NOT NULL,
                created_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("compacted_summaries table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_summaries_scope ON compacted_summaries(scope, turn_range_start)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("summaries index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<Turn, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let scope_key: String = row
            .try_get("scope")
            .map_err(|e| StoreError::QueryFailed(format!("scope column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let number: i64 = row
            .try_get("number")
            .map_err(|e| StoreError::QueryFailed(format!("number column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;
        let citations_json: String = row
            .try_get("citations")
            .map_err(|e| StoreError::QueryFailed(format!("citations column: {e}")))?;

        let scope = StreamScope::parse(&scope_key)
            .ok_or_else(|| StoreError::QueryFailed(format!("bad scope key '{scope_key}'")))?;
        let role = match role_str.as_str() {
            "user" => TurnRole::User,
            "assistant" => TurnRole::Assistant,
            other => return Err(StoreError::QueryFailed(format!("bad role '{other}'"))),
        };
        let citations: Vec<Citation> = serde_json::from_str(&citations_json).unwrap_or_default();
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Turn {
            id,
            scope,
            role,
            content,
            number: number as u64,
            created_at,
            citations,
        })
    }

    fn row_to_fact(row: &sqlx::sqlite::SqliteRow) -> Result<HardFact, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let scope_key: String = row
            .try_get("scope")
            .map_err(|e| StoreError::QueryFailed(format!("scope column: {e}")))?;
        let text: String = row
            .try_get("text")
            .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
        let category_str: String = row
            .try_get("category")
            .map_err(|e| StoreError::QueryFailed(format!("category column: {e}")))?;
        let conflict_key: Option<String> = row
            .try_get("conflict_key")
            .map_err(|e| StoreError::QueryFailed(format!("conflict_key column: {e}")))?;
        let turn_id: Option<String> = row
            .try_get("turn_id")
            .map_err(|e| StoreError::QueryFailed(format!("turn_id column: {e}")))?;
        let confidence: f64 = row
            .try_get("confidence")
            .map_err(|e| StoreError::QueryFailed(format!("confidence column: {e}")))?;
        let extractor: String = row
            .try_get("extractor")
            .map_err(|e| StoreError::QueryFailed(format!("extractor column: {e}")))?;
        let active: i64 = row
            .try_get("active")
            .map_err(|e| StoreError::QueryFailed(format!("active column: {e}")))?;
        let supersedes: Option<String> = row
            .try_get("supersedes")
            .map_err(|e| StoreError::QueryFailed(format!("supersedes column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let scope = StreamScope::parse(&scope_key)
            .ok_or_else(|| StoreError::QueryFailed(format!("bad scope key '{scope_key}'")))?;
        let category = FactCategory::parse(&category_str)
            .ok_or_else(|| StoreError::QueryFailed(format!("bad category '{category_str}'")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(HardFact {
            id,
            scope,
            text,
            category,
            conflict_key,
            provenance: Provenance {
                turn_id,
                confidence: confidence as f32,
                extractor,
            },
            active: active != 0,
            supersedes,
            created_at,
        })
    }

    async fn insert_fact_tx<'a>(
        tx: &mut sqlx::Transaction<'a, sqlx::Sqlite>,
        fact: &HardFact,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO hard_facts
                (id, scope, text, category, conflict_key, turn_id,
                 confidence, extractor, active, supersedes, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fact.id)
        .bind(fact.scope.key())
        .bind(&fact.text)
        .bind(fact.category.as_str())
        .bind(&fact.conflict_key)
        .bind(&fact.provenance.turn_id)
        .bind(fact.provenance.confidence as f64)
        .bind(&fact.provenance.extractor)
        .bind(if fact.active { 1i64 } else { 0i64 })
        .bind(&fact.supersedes)
        .bind(fact.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Storage(format!("insert fact: {e}")))?;
        Ok(())
    }

    /// Ensure a stream row exists inside a transaction, returning nothing.
    async fn ensure_stream_tx<'a>(
        tx: &mut sqlx::Transaction<'a, sqlx::Sqlite>,
        scope: &StreamScope,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO streams (id, scope, created_at) VALUES (?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(scope.key())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut **tx)
        .await
        .map_err(|e| StoreError::Storage(format!("ensure stream: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append_turn(
        &self,
        scope: &StreamScope,
        role: TurnRole,
        content: &str,
        citations: Vec<Citation>,
    ) -> Result<Turn, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        Self::ensure_stream_tx(&mut tx, scope).await?;

        let number: i64 = sqlx::query("SELECT next_turn FROM streams WHERE scope = ?")
            .bind(scope.key())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("next_turn: {e}")))?
            .try_get("next_turn")
            .map_err(|e| StoreError::QueryFailed(format!("next_turn column: {e}")))?;

        let turn = Turn::new(scope.clone(), role, content, number as u64, citations);
        let citations_json = serde_json::to_string(&turn.citations)
            .map_err(|e| StoreError::Storage(format!("encode citations: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO turns (id, scope, role, content, number, created_at, citations)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&turn.id)
        .bind(scope.key())
        .bind(turn.role.to_string())
        .bind(&turn.content)
        .bind(number)
        .bind(turn.created_at.to_rfc3339())
        .bind(citations_json)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("insert turn: {e}")))?;

        sqlx::query("UPDATE streams SET next_turn = next_turn + 1 WHERE scope = ?")
            .bind(scope.key())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("bump next_turn: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;

        Ok(turn)
    }

    async fn list_turns(
        &self,
        scope: &StreamScope,
        from: u64,
        to: u64,
    ) -> Result<Vec<Turn>, StoreError> {
        let exists = sqlx::query("SELECT 1 FROM streams WHERE scope = ?")
            .bind(scope.key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("stream lookup: {e}")))?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("stream {scope}")));
        }

        let rows = sqlx::query(
            "SELECT * FROM turns WHERE scope = ? AND number >= ? AND number <= ? ORDER BY number",
        )
        .bind(scope.key())
        .bind(from as i64)
        .bind(to as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("list turns: {e}")))?;

        rows.iter().map(Self::row_to_turn).collect()
    }

    async fn get_stream(&self, scope: &StreamScope) -> Result<Option<StreamRecord>, StoreError> {
        let Some(row) = sqlx::query("SELECT * FROM streams WHERE scope = ?")
            .bind(scope.key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("stream lookup: {e}")))?
        else {
            return Ok(None);
        };

        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let summary: String = row
            .try_get("summary")
            .map_err(|e| StoreError::QueryFailed(format!("summary column: {e}")))?;
        let next_turn: i64 = row
            .try_get("next_turn")
            .map_err(|e| StoreError::QueryFailed(format!("next_turn column: {e}")))?;
        let last_compaction: Option<String> = row
            .try_get("last_compaction")
            .map_err(|e| StoreError::QueryFailed(format!("last_compaction column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let refs = sqlx::query(
            "SELECT turn_id, number FROM recent_turns WHERE scope = ? ORDER BY number",
        )
        .bind(scope.key())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent turns: {e}")))?;

        let recent_turns = refs
            .iter()
            .map(|r| {
                let turn_id: String = r
                    .try_get("turn_id")
                    .map_err(|e| StoreError::QueryFailed(format!("turn_id column: {e}")))?;
                let number: i64 = r
                    .try_get("number")
                    .map_err(|e| StoreError::QueryFailed(format!("number column: {e}")))?;
                Ok(TurnRef { turn_id, number: number as u64 })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let fact_rows = sqlx::query("SELECT id FROM hard_facts WHERE scope = ? ORDER BY iid")
            .bind(scope.key())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("fact ids: {e}")))?;
        let fact_ids = fact_rows
            .iter()
            .map(|r| {
                r.try_get::<String, _>("id")
                    .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let last_compaction = last_compaction.and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        });

        Ok(Some(StreamRecord {
            id,
            scope: scope.clone(),
            recent_turns,
            summary,
            fact_ids,
            last_compaction,
            next_turn: next_turn as u64,
            created_at,
        }))
    }

    async fn push_recent(
        &self,
        scope: &StreamScope,
        turn_ref: TurnRef,
    ) -> Result<usize, StoreError> {
        let exists = sqlx::query("SELECT 1 FROM streams WHERE scope = ?")
            .bind(scope.key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("stream lookup: {e}")))?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("stream {scope}")));
        }

        sqlx::query("INSERT OR REPLACE INTO recent_turns (scope, turn_id, number) VALUES (?, ?, ?)")
            .bind(scope.key())
            .bind(&turn_ref.turn_id)
            .bind(turn_ref.number as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("push recent: {e}")))?;

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM recent_turns WHERE scope = ?")
            .bind(scope.key())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("window size: {e}")))?
            .try_get("n")
            .map_err(|e| StoreError::QueryFailed(format!("count column: {e}")))?;

        Ok(count as usize)
    }

    async fn set_summary(
        &self,
        scope: &StreamScope,
        text: &str,
        clear_through: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        let result = sqlx::query(
            "UPDATE streams SET summary = ?, last_compaction = ? WHERE scope = ?",
        )
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .bind(scope.key())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("set summary: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("stream {scope}")));
        }

        sqlx::query("DELETE FROM recent_turns WHERE scope = ? AND number <= ?")
            .bind(scope.key())
            .bind(clear_through as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("shrink window: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        Ok(())
    }

    async fn insert_fact(&self, fact: HardFact) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;
        Self::ensure_stream_tx(&mut tx, &fact.scope).await?;
        Self::insert_fact_tx(&mut tx, &fact).await?;
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        Ok(())
    }

    async fn supersede_fact(&self, new_fact: HardFact, old_id: &str) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        let result = sqlx::query("UPDATE hard_facts SET active = 0 WHERE id = ?")
            .bind(old_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("deactivate fact: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("fact {old_id}")));
        }

        Self::insert_fact_tx(&mut tx, &new_fact).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        Ok(())
    }

    async fn active_facts(&self, scope: &StreamScope) -> Result<Vec<HardFact>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM hard_facts WHERE scope = ? AND active = 1 ORDER BY iid DESC",
        )
        .bind(scope.key())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("active facts: {e}")))?;

        rows.iter().map(Self::row_to_fact).collect()
    }

    async fn active_fact_by_key(
        &self,
        scope: &StreamScope,
        conflict_key: &str,
    ) -> Result<Option<HardFact>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM hard_facts WHERE scope = ? AND conflict_key = ? AND active = 1",
        )
        .bind(scope.key())
        .bind(conflict_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("fact by key: {e}")))?;

        row.as_ref().map(Self::row_to_fact).transpose()
    }

    async fn get_fact(&self, id: &str) -> Result<HardFact, StoreError> {
        let row = sqlx::query("SELECT * FROM hard_facts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("fact lookup: {e}")))?
            .ok_or_else(|| StoreError::NotFound(format!("fact {id}")))?;

        Self::row_to_fact(&row)
    }

    async fn insert_summary(&self, summary: CompactedSummary) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO compacted_summaries
                (id, scope, text, turn_range_start, turn_range_end, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.id)
        .bind(summary.scope.key())
        .bind(&summary.text)
        .bind(summary.turn_range_start as i64)
        .bind(summary.turn_range_end as i64)
        .bind(summary.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("insert summary: {e}")))?;
        Ok(())
    }

    async fn commit_compaction(
        &self,
        summary: CompactedSummary,
        folded_summary: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin: {e}")))?;

        let result = sqlx::query(
            "UPDATE streams SET summary = ?, last_compaction = ? WHERE scope = ?",
        )
        .bind(folded_summary)
        .bind(Utc::now().to_rfc3339())
        .bind(summary.scope.key())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("fold summary: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("stream {}", summary.scope)));
        }

        sqlx::query("DELETE FROM recent_turns WHERE scope = ? AND number <= ?")
            .bind(summary.scope.key())
            .bind(summary.turn_range_end as i64)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("shrink window: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO compacted_summaries
                (id, scope, text, turn_range_start, turn_range_end, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&summary.id)
        .bind(summary.scope.key())
        .bind(&summary.text)
        .bind(summary.turn_range_start as i64)
        .bind(summary.turn_range_end as i64)
        .bind(summary.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("insert summary: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        Ok(())
    }

    async fn summaries(&self, scope: &StreamScope) -> Result<Vec<CompactedSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM compacted_summaries WHERE scope = ? ORDER BY turn_range_start",
        )
        .bind(scope.key())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("summaries: {e}")))?;

        rows.iter()
            .map(|row| {
                let id: String = row
                    .try_get("id")
                    .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
                let scope_key: String = row
                    .try_get("scope")
                    .map_err(|e| StoreError::QueryFailed(format!("scope column: {e}")))?;
                let text: String = row
                    .try_get("text")
                    .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?;
                let start: i64 = row
                    .try_get("turn_range_start")
                    .map_err(|e| StoreError::QueryFailed(format!("range start column: {e}")))?;
                let end: i64 = row
                    .try_get("turn_range_end")
                    .map_err(|e| StoreError::QueryFailed(format!("range end column: {e}")))?;
                let created_at_str: String = row
                    .try_get("created_at")
                    .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

                let scope = StreamScope::parse(&scope_key).ok_or_else(|| {
                    StoreError::QueryFailed(format!("bad scope key '{scope_key}'"))
                })?;
                let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now());

                Ok(CompactedSummary {
                    id,
                    scope,
                    text,
                    turn_range_start: start as u64,
                    turn_range_end: end as u64,
                    created_at,
                })
            })
            .collect()
    }
}
