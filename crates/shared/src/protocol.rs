use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{ChannelId, ChannelKind, EnvelopeId, Owner};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserProfile {
    /// Avatar letter: first character of the display name, `U` otherwise.
    pub fn initial(&self) -> char {
        self.name
            .as_deref()
            .and_then(|name| name.chars().next())
            .unwrap_or('U')
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    Loading,
    Authenticated { profile: UserProfile },
    Unauthenticated,
}

impl SessionStatus {
    pub fn profile(&self) -> Option<&UserProfile> {
        match self {
            SessionStatus::Authenticated { profile } => Some(profile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub token: String,
    pub profile: UserProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSummary {
    pub envelope_id: EnvelopeId,
    pub owner: Owner,
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub channel_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: ChannelId,
    pub channel_type: ChannelKind,
    pub channel_url: String,
    pub channel_description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeDetail {
    #[serde(flatten)]
    pub envelope: EnvelopeSummary,
    /// Newest first. A `null` list decodes as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub channels: Vec<ChannelRecord>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ChannelRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ChannelRecord>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEnvelopeRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddChannelRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChannelId>,
    pub channel_type: ChannelKind,
    pub channel_url: String,
    pub channel_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// `?id=<envelope name>` on detail and channel routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeQuery {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_json(channels: &str) -> String {
        format!(
            r##"{{"envelope_id":1,"owner":"ana@example.com","name":"AI Watch","color":"#60A5FA","channel_count":0,"created_at":"2025-04-01T10:00:00Z","channels":{channels}}}"##
        )
    }

    #[test]
    fn null_channel_list_decodes_as_empty() {
        let detail: EnvelopeDetail =
            serde_json::from_str(&summary_json("null")).expect("detail");
        assert!(detail.channels.is_empty());
        assert_eq!(detail.envelope.name, "AI Watch");
    }

    #[test]
    fn session_status_is_tagged_by_status() {
        let status = SessionStatus::Authenticated {
            profile: UserProfile {
                email: Owner::new("ana@example.com"),
                name: Some("Ana".into()),
            },
        };
        let json = serde_json::to_value(&status).expect("json");
        assert_eq!(json["status"], "authenticated");
        assert_eq!(json["profile"]["email"], "ana@example.com");

        let unauthenticated: SessionStatus =
            serde_json::from_str(r#"{"status":"unauthenticated"}"#).expect("status");
        assert_eq!(unauthenticated, SessionStatus::Unauthenticated);
    }

    #[test]
    fn profile_initial_falls_back_to_u() {
        let named = UserProfile {
            email: Owner::new("ana@example.com"),
            name: Some("Ana".into()),
        };
        let anonymous = UserProfile {
            email: Owner::new("ana@example.com"),
            name: None,
        };
        assert_eq!(named.initial(), 'A');
        assert_eq!(anonymous.initial(), 'U');
    }
}
