//! SQLite-backed deploy store.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{Store, StoreError};
use crate::deploy::Deploy;

/// Persistent [`Store`] keeping the full deploy history per channel.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct DeployRow {
    deploy_id: String,
    user_id: String,
    user_name: String,
    subject: String,
    started_at: i64,
    finished_at: i64,
    aborted: bool,
    abort_reason: String,
    pull_requests: String,
    subscribers: String,
}

impl DeployRow {
    fn into_deploy(self) -> Result<Deploy, StoreError> {
        Ok(Deploy {
            id: self
                .deploy_id
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("bad deploy id {:?}", self.deploy_id)))?,
            user: crate::deploy::ChatUser {
                id: self.user_id,
                name: self.user_name,
            },
            subject: self.subject,
            started_at: self.started_at as u64,
            finished_at: self.finished_at as u64,
            aborted: self.aborted,
            abort_reason: self.abort_reason,
            pull_requests: serde_json::from_str(&self.pull_requests)?,
            subscribers: serde_json::from_str(&self.subscribers)?,
        })
    }
}

const SELECT_COLUMNS: &str = "deploy_id, user_id, user_name, subject, started_at, finished_at, \
                              aborted, abort_reason, pull_requests, subscribers";

impl SqliteStore {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        // An in-memory database exists per connection, so the pool must not
        // grow beyond one.
        let (url, max_connections) = if path == ":memory:" {
            ("sqlite::memory:".to_string(), 1)
        } else {
            (format!("sqlite:{}?mode=rwc", path), 5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.run_migration(
                1,
                &[
                    "CREATE TABLE deploys (
                        seq INTEGER PRIMARY KEY AUTOINCREMENT,
                        channel TEXT NOT NULL,
                        deploy_id TEXT UNIQUE NOT NULL,
                        user_id TEXT NOT NULL,
                        user_name TEXT NOT NULL,
                        subject TEXT NOT NULL DEFAULT '',
                        started_at INTEGER NOT NULL DEFAULT 0,
                        finished_at INTEGER NOT NULL DEFAULT 0,
                        aborted INTEGER NOT NULL DEFAULT 0,
                        abort_reason TEXT NOT NULL DEFAULT '',
                        pull_requests TEXT NOT NULL DEFAULT '[]',
                        subscribers TEXT NOT NULL DEFAULT '[]'
                    )",
                    "CREATE INDEX idx_deploys_channel ON deploys(channel)",
                    "CREATE INDEX idx_deploys_started_at ON deploys(channel, started_at)",
                ],
            )
            .await?;
        }

        Ok(())
    }

    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(query).execute(&mut *tx).await?;
        }
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    fn rows_to_deploys(rows: Vec<DeployRow>) -> Result<Vec<Deploy>, StoreError> {
        rows.into_iter().map(DeployRow::into_deploy).collect()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, channel: &str) -> Result<Option<Deploy>, StoreError> {
        let row: Option<DeployRow> = sqlx::query_as(&format!(
            "SELECT {} FROM deploys WHERE channel = ? ORDER BY seq DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(channel)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DeployRow::into_deploy).transpose()
    }

    async fn set(&self, channel: &str, deploy: Deploy) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO deploys (channel, deploy_id, user_id, user_name, subject, started_at,
                                  finished_at, aborted, abort_reason, pull_requests, subscribers)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(deploy_id) DO UPDATE SET
                 subject = excluded.subject,
                 started_at = excluded.started_at,
                 finished_at = excluded.finished_at,
                 aborted = excluded.aborted,
                 abort_reason = excluded.abort_reason",
        )
        .bind(channel)
        .bind(deploy.id.to_string())
        .bind(&deploy.user.id)
        .bind(&deploy.user.name)
        .bind(&deploy.subject)
        .bind(deploy.started_at as i64)
        .bind(deploy.finished_at as i64)
        .bind(deploy.aborted)
        .bind(&deploy.abort_reason)
        .bind(serde_json::to_string(&deploy.pull_requests)?)
        .bind(serde_json::to_string(&deploy.subscribers)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, channel: &str) -> Result<Option<Deploy>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row: Option<DeployRow> = sqlx::query_as(&format!(
            "SELECT {} FROM deploys WHERE channel = ? ORDER BY seq DESC LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(channel)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM deploys WHERE deploy_id = ?")
            .bind(&row.deploy_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        row.into_deploy().map(Some)
    }

    async fn all(&self, channel: &str) -> Result<Vec<Deploy>, StoreError> {
        let rows: Vec<DeployRow> = sqlx::query_as(&format!(
            "SELECT {} FROM deploys WHERE channel = ? ORDER BY seq",
            SELECT_COLUMNS
        ))
        .bind(channel)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_deploys(rows)
    }

    async fn since(&self, channel: &str, start: u64) -> Result<Vec<Deploy>, StoreError> {
        let rows: Vec<DeployRow> = sqlx::query_as(&format!(
            "SELECT {} FROM deploys WHERE channel = ? AND started_at >= ? ORDER BY seq",
            SELECT_COLUMNS
        ))
        .bind(channel)
        .bind(start as i64)
        .fetch_all(&self.pool)
        .await?;

        Self::rows_to_deploys(rows)
    }
}
