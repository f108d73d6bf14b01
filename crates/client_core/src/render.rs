//! Render-ready card data. Layout and styling are left to the front end.

use chrono::{DateTime, Utc};
use shared::{
    domain::{ChannelId, ChannelKind, Owner},
    protocol::{ChannelRecord, EnvelopeSummary, UserProfile},
};

pub const NO_ENVELOPES_MESSAGE: &str = "No envelopes yet. Create one with the + button.";
pub const NO_CHANNELS_MESSAGE: &str =
    "No channels added yet. Add your first channel with the + button above.";
pub const ENVELOPE_NOT_FOUND_MESSAGE: &str = "Envelope not found";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelIcon {
    /// X glyph on a dark tile.
    X,
    /// Feed glyph on a dark tile.
    Feed,
    /// Feed glyph on a muted tile, for any other source type.
    MutedFeed,
}

impl ChannelIcon {
    pub fn for_kind(kind: &ChannelKind) -> Self {
        match kind {
            ChannelKind::X => ChannelIcon::X,
            ChannelKind::Medium => ChannelIcon::Feed,
            _ => ChannelIcon::MutedFeed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeCard {
    pub name: String,
    pub color: String,
    pub channel_count: i64,
    pub description: Option<String>,
}

impl From<&EnvelopeSummary> for EnvelopeCard {
    fn from(envelope: &EnvelopeSummary) -> Self {
        Self {
            name: envelope.name.clone(),
            color: envelope.color.clone(),
            channel_count: envelope.channel_count,
            description: envelope.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelCard {
    pub id: ChannelId,
    pub icon: ChannelIcon,
    pub label: String,
    pub url: String,
    pub created_on: String,
}

impl From<&ChannelRecord> for ChannelCard {
    fn from(channel: &ChannelRecord) -> Self {
        Self {
            id: channel.id,
            icon: ChannelIcon::for_kind(&channel.channel_type),
            label: channel.channel_type.label(),
            url: channel.channel_url.clone(),
            created_on: format_created_on(channel.created_at),
        }
    }
}

/// `4/1/2025` style, month first without padding.
pub fn format_created_on(at: DateTime<Utc>) -> String {
    at.format("%-m/%-d/%Y").to_string()
}

pub fn owner_handle(owner: &Owner) -> String {
    format!("@{}", owner.handle())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileHeader {
    pub initial: char,
    pub display_name: Option<String>,
    pub handle: String,
}

impl From<&UserProfile> for ProfileHeader {
    fn from(profile: &UserProfile) -> Self {
        Self {
            initial: profile.initial(),
            display_name: profile.name.clone(),
            handle: owner_handle(&profile.email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn channel_card_uses_type_icon_and_label() {
        let channel = ChannelRecord {
            id: ChannelId::generate(),
            channel_type: ChannelKind::Website,
            channel_url: "https://example.com".into(),
            channel_description: "headlines".into(),
            created_at: Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap(),
        };
        let card = ChannelCard::from(&channel);
        assert_eq!(card.icon, ChannelIcon::MutedFeed);
        assert_eq!(card.label, "Website");
        assert_eq!(card.created_on, "4/1/2025");
    }

    #[test]
    fn icons_follow_channel_kind() {
        assert_eq!(ChannelIcon::for_kind(&ChannelKind::X), ChannelIcon::X);
        assert_eq!(ChannelIcon::for_kind(&ChannelKind::Medium), ChannelIcon::Feed);
        assert_eq!(
            ChannelIcon::for_kind(&ChannelKind::Other("rss".into())),
            ChannelIcon::MutedFeed
        );
    }

    #[test]
    fn profile_header_shows_handle_and_initial() {
        let header = ProfileHeader::from(&UserProfile {
            email: Owner::new("ana@example.com"),
            name: None,
        });
        assert_eq!(header.initial, 'U');
        assert_eq!(header.handle, "@ana");
    }
}
