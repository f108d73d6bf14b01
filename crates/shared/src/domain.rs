use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(EnvelopeId);

/// Client-assigned random identifier of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub Uuid);

impl ChannelId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address of the signed-in user; the only ownership key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Owner(pub String);

impl Owner {
    pub fn new(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local part of the email, shown as `@handle`.
    pub fn handle(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source type of a channel. Unknown values are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChannelKind {
    #[default]
    X,
    Website,
    Medium,
    Other(String),
}

impl ChannelKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChannelKind::X => "x",
            ChannelKind::Website => "website",
            ChannelKind::Medium => "medium",
            ChannelKind::Other(raw) => raw,
        }
    }

    /// `x` becomes `X`, `website` becomes `Website`.
    pub fn label(&self) -> String {
        let raw = self.as_str();
        let mut chars = raw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Choices offered by the channel dialog, with their display names.
    pub fn choices() -> [(ChannelKind, &'static str); 2] {
        [
            (ChannelKind::X, "X Account"),
            (ChannelKind::Website, "News Website"),
        ]
    }

    pub fn url_placeholder(&self) -> &'static str {
        match self {
            ChannelKind::X => "https://x.com/user",
            _ => "https://example.com",
        }
    }
}

impl From<String> for ChannelKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "x" => ChannelKind::X,
            "website" => ChannelKind::Website,
            "medium" => ChannelKind::Medium,
            _ => ChannelKind::Other(value),
        }
    }
}

impl From<&str> for ChannelKind {
    fn from(value: &str) -> Self {
        ChannelKind::from(value.to_string())
    }
}

impl From<ChannelKind> for String {
    fn from(value: ChannelKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    pub name: &'static str,
    pub value: &'static str,
}

pub const ENVELOPE_PALETTE: [Swatch; 7] = [
    Swatch { name: "Red", value: "#F87171" },
    Swatch { name: "Blue", value: "#60A5FA" },
    Swatch { name: "Green", value: "#34D399" },
    Swatch { name: "Purple", value: "#A78BFA" },
    Swatch { name: "Yellow", value: "#FBBF24" },
    Swatch { name: "Pink", value: "#F472B6" },
    Swatch { name: "Black", value: "#000000" },
];

pub const DEFAULT_ENVELOPE_COLOR: &str = "#F87171";

/// Matches case-insensitively and returns the palette's spelling.
pub fn palette_color(value: &str) -> Option<&'static str> {
    ENVELOPE_PALETTE
        .iter()
        .find(|swatch| swatch.value.eq_ignore_ascii_case(value.trim()))
        .map(|swatch| swatch.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_channel_kind_round_trips_verbatim() {
        let kind: ChannelKind = serde_json::from_str("\"substack\"").expect("kind");
        assert_eq!(kind, ChannelKind::Other("substack".into()));
        assert_eq!(serde_json::to_string(&kind).expect("json"), "\"substack\"");
    }

    #[test]
    fn channel_kind_label_capitalizes_first_letter() {
        assert_eq!(ChannelKind::X.label(), "X");
        assert_eq!(ChannelKind::Website.label(), "Website");
        assert_eq!(ChannelKind::Other(String::new()).label(), "");
    }

    #[test]
    fn owner_handle_is_local_part() {
        assert_eq!(Owner::new("ana@example.com").handle(), "ana");
        assert_eq!(Owner::new("no-at-sign").handle(), "no-at-sign");
    }

    #[test]
    fn palette_lookup_is_case_insensitive() {
        assert_eq!(palette_color("#60a5fa"), Some("#60A5FA"));
        assert_eq!(palette_color("#123456"), None);
    }
}
