use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use shared::{
    domain::{ChannelId, ChannelKind, EnvelopeId, Owner},
    protocol::{ChannelRecord, EnvelopeDetail, EnvelopeSummary},
};

mod memory;

pub use memory::MemoryStore;

/// Row to insert for a fresh envelope. Channel count always starts at zero.
#[derive(Debug, Clone)]
pub struct NewEnvelope {
    pub name: String,
    pub color: String,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("envelope '{name}' not found")]
    NotFound { name: String },
    #[error("{matches} envelopes named '{name}' exist for this owner")]
    Ambiguous { name: String, matches: usize },
    #[error("channel {id} already exists")]
    DuplicateChannel { id: ChannelId },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Request/response access to the hosted tables. Constructed once and
/// passed to whoever needs it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn health_check(&self) -> Result<()>;

    async fn insert_envelope(&self, owner: &Owner, envelope: &NewEnvelope)
        -> Result<EnvelopeSummary>;

    /// All envelopes of `owner` in insertion order.
    async fn select_envelopes(&self, owner: &Owner) -> Result<Vec<EnvelopeSummary>>;

    async fn select_envelopes_named(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<Vec<EnvelopeSummary>>;

    /// Channels of one envelope, newest first.
    async fn select_channels(&self, envelope_id: EnvelopeId) -> Result<Vec<ChannelRecord>>;

    /// Inserts the channel and bumps the envelope's counter atomically.
    /// Returns the new counter value.
    async fn insert_channel(
        &self,
        envelope_id: EnvelopeId,
        channel: &ChannelRecord,
    ) -> Result<i64, LookupError>;

    /// Records `token_id` as revoked and drops entries that expired before
    /// `now`; expired tokens fail verification on their own.
    async fn revoke_session(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()>;

    async fn is_session_revoked(&self, token_id: &str) -> Result<bool>;

    /// Exactly-one select on (name, owner).
    async fn select_single_envelope(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<EnvelopeSummary, LookupError> {
        let mut matches = self.select_envelopes_named(owner, name).await?;
        match matches.len() {
            0 => Err(LookupError::NotFound {
                name: name.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            count => Err(LookupError::Ambiguous {
                name: name.to_string(),
                matches: count,
            }),
        }
    }

    async fn load_envelope_detail(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<EnvelopeDetail, LookupError> {
        let envelope = self.select_single_envelope(owner, name).await?;
        let channels = self.select_channels(envelope.envelope_id).await?;
        Ok(EnvelopeDetail { envelope, channels })
    }

    /// Appends `channel` to the envelope matching (name, owner).
    async fn append_channel(
        &self,
        owner: &Owner,
        name: &str,
        channel: &ChannelRecord,
    ) -> Result<i64, LookupError> {
        let envelope = self.select_single_envelope(owner, name).await?;
        Ok(self.insert_channel(envelope.envelope_id, channel).await?)
    }
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool_options = if database_url.starts_with("sqlite::memory:") {
            // Every connection to an in-memory database sees its own empty
            // database, so the pool must hold exactly one for its lifetime.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

}

#[async_trait]
impl RecordStore for Storage {
    async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn insert_envelope(
        &self,
        owner: &Owner,
        envelope: &NewEnvelope,
    ) -> Result<EnvelopeSummary> {
        let created_at = Utc::now();
        let row = sqlx::query(
            "INSERT INTO envelopes (owner_email, name, color, description, channel_count, created_at)
             VALUES (?, ?, ?, ?, 0, ?)
             RETURNING id, owner_email, name, color, description, channel_count, created_at",
        )
        .bind(owner.as_str())
        .bind(&envelope.name)
        .bind(&envelope.color)
        .bind(envelope.description.as_deref())
        .bind(created_at)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert envelope")?;
        let summary = envelope_from_row(&row)?;
        debug!(envelope_id = summary.envelope_id.0, %owner, "inserted envelope");
        Ok(summary)
    }

    async fn select_envelopes(&self, owner: &Owner) -> Result<Vec<EnvelopeSummary>> {
        let rows = sqlx::query(
            "SELECT id, owner_email, name, color, description, channel_count, created_at
             FROM envelopes
             WHERE owner_email = ?
             ORDER BY id ASC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await
        .context("failed to select envelopes")?;
        rows.iter().map(envelope_from_row).collect()
    }

    async fn select_envelopes_named(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<Vec<EnvelopeSummary>> {
        let rows = sqlx::query(
            "SELECT id, owner_email, name, color, description, channel_count, created_at
             FROM envelopes
             WHERE owner_email = ? AND name = ?
             ORDER BY id ASC",
        )
        .bind(owner.as_str())
        .bind(name)
        .fetch_all(&self.pool)
        .await
        .context("failed to select envelope by name")?;
        rows.iter().map(envelope_from_row).collect()
    }

    async fn select_channels(&self, envelope_id: EnvelopeId) -> Result<Vec<ChannelRecord>> {
        let rows = sqlx::query(
            "SELECT id, channel_type, channel_url, channel_description, created_at
             FROM channels
             WHERE envelope_id = ?
             ORDER BY rowid DESC",
        )
        .bind(envelope_id.0)
        .fetch_all(&self.pool)
        .await
        .context("failed to select channels")?;
        rows.iter().map(channel_from_row).collect()
    }

    async fn insert_channel(
        &self,
        envelope_id: EnvelopeId,
        channel: &ChannelRecord,
    ) -> Result<i64, LookupError> {
        let mut tx = self.pool.begin().await.context("failed to open transaction")?;
        sqlx::query(
            "INSERT INTO channels (id, envelope_id, channel_type, channel_url, channel_description, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(channel.id.0.to_string())
        .bind(envelope_id.0)
        .bind(channel.channel_type.as_str())
        .bind(&channel.channel_url)
        .bind(&channel.channel_description)
        .bind(channel.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()) {
                LookupError::DuplicateChannel { id: channel.id }
            } else {
                LookupError::Store(anyhow::Error::new(err).context("failed to insert channel"))
            }
        })?;

        let channel_count: i64 = sqlx::query_scalar(
            "UPDATE envelopes SET channel_count = channel_count + 1 WHERE id = ? RETURNING channel_count",
        )
        .bind(envelope_id.0)
        .fetch_one(&mut *tx)
        .await
        .context("failed to bump channel count")?;
        tx.commit().await.context("failed to commit channel")?;

        debug!(envelope_id = envelope_id.0, channel_id = %channel.id, channel_count, "inserted channel");
        Ok(channel_count)
    }

    async fn revoke_session(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let purged = sqlx::query("DELETE FROM revoked_sessions WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("failed to purge expired revocations")?
            .rows_affected();
        sqlx::query(
            "INSERT INTO revoked_sessions (token_id, expires_at) VALUES (?, ?)
             ON CONFLICT(token_id) DO NOTHING",
        )
        .bind(token_id)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .context("failed to revoke session")?;
        tx.commit().await?;
        if purged > 0 {
            debug!(purged, "dropped expired session revocations");
        }
        Ok(())
    }

    async fn is_session_revoked(&self, token_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM revoked_sessions WHERE token_id = ?")
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to check session revocation")?;
        Ok(row.is_some())
    }
}

fn envelope_from_row(row: &SqliteRow) -> Result<EnvelopeSummary> {
    Ok(EnvelopeSummary {
        envelope_id: EnvelopeId(row.try_get::<i64, _>("id")?),
        owner: Owner(row.try_get::<String, _>("owner_email")?),
        name: row.try_get::<String, _>("name")?,
        color: row.try_get::<String, _>("color")?,
        description: row.try_get::<Option<String>, _>("description")?,
        channel_count: row.try_get::<i64, _>("channel_count")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn channel_from_row(row: &SqliteRow) -> Result<ChannelRecord> {
    let raw_id = row.try_get::<String, _>("id")?;
    let id = Uuid::parse_str(&raw_id)
        .with_context(|| format!("stored channel id '{raw_id}' is not a uuid"))?;
    Ok(ChannelRecord {
        id: ChannelId(id),
        channel_type: ChannelKind::from(row.try_get::<String, _>("channel_type")?),
        channel_url: row.try_get::<String, _>("channel_url")?,
        channel_description: row.try_get::<String, _>("channel_description")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
