use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    domain::{EnvelopeId, Owner},
    protocol::{ChannelRecord, EnvelopeSummary},
};
use tokio::sync::Mutex;

use crate::{LookupError, NewEnvelope, RecordStore};

#[derive(Default)]
struct MemoryTables {
    next_envelope_id: i64,
    envelopes: Vec<EnvelopeSummary>,
    /// Insertion order; readers reverse it.
    channels: Vec<(EnvelopeId, ChannelRecord)>,
    revoked_sessions: HashMap<String, DateTime<Utc>>,
    fail_with: Option<String>,
}

/// In-process store with the same semantics as [`crate::Storage`], for tests
/// and demos that should not touch SQLite.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with `message` until cleared.
    pub async fn fail_with(&self, message: Option<&str>) {
        self.tables.lock().await.fail_with = message.map(str::to_string);
    }
}

fn check_available(tables: &MemoryTables) -> Result<()> {
    match &tables.fail_with {
        Some(message) => Err(anyhow!(message.clone())),
        None => Ok(()),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn health_check(&self) -> Result<()> {
        check_available(&*self.tables.lock().await)
    }

    async fn insert_envelope(
        &self,
        owner: &Owner,
        envelope: &NewEnvelope,
    ) -> Result<EnvelopeSummary> {
        let mut tables = self.tables.lock().await;
        check_available(&tables)?;
        tables.next_envelope_id += 1;
        let summary = EnvelopeSummary {
            envelope_id: EnvelopeId(tables.next_envelope_id),
            owner: owner.clone(),
            name: envelope.name.clone(),
            color: envelope.color.clone(),
            description: envelope.description.clone(),
            channel_count: 0,
            created_at: Utc::now(),
        };
        tables.envelopes.push(summary.clone());
        Ok(summary)
    }

    async fn select_envelopes(&self, owner: &Owner) -> Result<Vec<EnvelopeSummary>> {
        let tables = self.tables.lock().await;
        check_available(&tables)?;
        Ok(tables
            .envelopes
            .iter()
            .filter(|envelope| &envelope.owner == owner)
            .cloned()
            .collect())
    }

    async fn select_envelopes_named(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<Vec<EnvelopeSummary>> {
        let tables = self.tables.lock().await;
        check_available(&tables)?;
        Ok(tables
            .envelopes
            .iter()
            .filter(|envelope| &envelope.owner == owner && envelope.name == name)
            .cloned()
            .collect())
    }

    async fn select_channels(&self, envelope_id: EnvelopeId) -> Result<Vec<ChannelRecord>> {
        let tables = self.tables.lock().await;
        check_available(&tables)?;
        Ok(tables
            .channels
            .iter()
            .rev()
            .filter(|(owner_id, _)| *owner_id == envelope_id)
            .map(|(_, channel)| channel.clone())
            .collect())
    }

    async fn insert_channel(
        &self,
        envelope_id: EnvelopeId,
        channel: &ChannelRecord,
    ) -> Result<i64, LookupError> {
        let mut tables = self.tables.lock().await;
        check_available(&tables)?;
        if tables.channels.iter().any(|(_, existing)| existing.id == channel.id) {
            return Err(LookupError::DuplicateChannel { id: channel.id });
        }
        let envelope = tables
            .envelopes
            .iter_mut()
            .find(|envelope| envelope.envelope_id == envelope_id)
            .ok_or_else(|| anyhow!("envelope {} does not exist", envelope_id.0))?;
        envelope.channel_count += 1;
        let channel_count = envelope.channel_count;
        tables.channels.push((envelope_id, channel.clone()));
        Ok(channel_count)
    }

    async fn revoke_session(&self, token_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        check_available(&tables)?;
        let now = Utc::now();
        tables
            .revoked_sessions
            .retain(|_, expiry| *expiry >= now);
        tables
            .revoked_sessions
            .entry(token_id.to_string())
            .or_insert(expires_at);
        Ok(())
    }

    async fn is_session_revoked(&self, token_id: &str) -> Result<bool> {
        let tables = self.tables.lock().await;
        check_available(&tables)?;
        Ok(tables.revoked_sessions.contains_key(token_id))
    }
}
