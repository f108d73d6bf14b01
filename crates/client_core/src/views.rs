//! View state for the envelope list and envelope detail pages.
//!
//! Each view owns an explicit [`ViewState`]; fetches move it through
//! `Loading` to a terminal state and never leave it ambiguous.

use chrono::Utc;
use shared::{
    domain::{palette_color, ChannelId, ChannelKind, DEFAULT_ENVELOPE_COLOR},
    error::ErrorCode,
    protocol::{
        AddChannelRequest, CreateEnvelopeRequest, EnvelopeDetail, EnvelopeSummary, SessionStatus,
    },
};
use tracing::warn;

use crate::{
    render::{
        owner_handle, ChannelCard, EnvelopeCard, ENVELOPE_NOT_FOUND_MESSAGE, NO_CHANNELS_MESSAGE,
        NO_ENVELOPES_MESSAGE,
    },
    ClientError,
};

pub const ENVELOPE_NAME_REQUIRED: &str = "Please enter an envelope name";
pub const ENVELOPE_CREATE_FAILED: &str = "Failed to create envelope. Please try again.";
pub const CHANNEL_ADD_FAILED: &str = "Failed to add channel. Please try again.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Ready,
    NotFound,
    Error(String),
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ViewState::Loading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Landing,
    Profile,
    EnvelopeDetail { name: String },
    Settings,
}

impl Page {
    fn is_gated(&self) -> bool {
        !matches!(self, Page::Landing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Render,
    /// Session still resolving; show nothing yet.
    RenderNothing,
    Redirect(Page),
}

/// Signed-in users on the landing page go to their profile; signed-out
/// users on a gated page go to the landing page.
pub fn gate(session: &SessionStatus, page: &Page) -> GateDecision {
    match (session, page.is_gated()) {
        (SessionStatus::Loading, _) => GateDecision::RenderNothing,
        (SessionStatus::Authenticated { .. }, false) => GateDecision::Redirect(Page::Profile),
        (SessionStatus::Unauthenticated, true) => GateDecision::Redirect(Page::Landing),
        _ => GateDecision::Render,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeDialog {
    pub name: String,
    pub description: String,
    pub color: &'static str,
    pub submitting: bool,
    pub alert: Option<String>,
}

impl Default for EnvelopeDialog {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            color: DEFAULT_ENVELOPE_COLOR,
            submitting: false,
            alert: None,
        }
    }
}

impl EnvelopeDialog {
    /// Only palette colors are selectable; anything else is ignored.
    pub fn set_color(&mut self, value: &str) -> bool {
        match palette_color(value) {
            Some(color) => {
                self.color = color;
                true
            }
            None => false,
        }
    }

    pub fn submit_disabled(&self) -> bool {
        self.submitting
    }

    /// Returns the request to send, or `None` if nothing should be sent.
    pub fn submit(&mut self) -> Option<CreateEnvelopeRequest> {
        if self.submitting {
            return None;
        }
        let name = self.name.trim();
        if name.is_empty() {
            self.alert = Some(ENVELOPE_NAME_REQUIRED.to_string());
            return None;
        }
        let description = self.description.trim();
        let req = CreateEnvelopeRequest {
            name: name.to_string(),
            description: (!description.is_empty()).then(|| description.to_string()),
            color: Some(self.color.to_string()),
        };
        self.alert = None;
        self.submitting = true;
        Some(req)
    }

    /// Returns `true` when the dialog should close.
    pub fn finish(&mut self, outcome: &Result<EnvelopeSummary, ClientError>) -> bool {
        self.submitting = false;
        match outcome {
            Ok(_) => true,
            Err(error) => {
                warn!(%error, "envelope creation failed");
                self.alert = Some(ENVELOPE_CREATE_FAILED.to_string());
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeListView {
    pub state: ViewState,
    pub envelopes: Vec<EnvelopeSummary>,
    pub dialog: Option<EnvelopeDialog>,
}

impl EnvelopeListView {
    pub fn begin_load(&mut self) {
        self.state = ViewState::Loading;
    }

    /// A failed refresh keeps whatever was shown before.
    pub fn finish_load(&mut self, outcome: Result<Vec<EnvelopeSummary>, ClientError>) {
        match outcome {
            Ok(envelopes) => {
                self.envelopes = envelopes;
                self.state = ViewState::Ready;
            }
            Err(error) => {
                warn!(%error, "failed to load envelopes");
                self.state = ViewState::Error(error.to_string());
            }
        }
    }

    pub fn cards(&self) -> Vec<EnvelopeCard> {
        self.envelopes.iter().map(EnvelopeCard::from).collect()
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        (self.state == ViewState::Ready && self.envelopes.is_empty())
            .then_some(NO_ENVELOPES_MESSAGE)
    }

    pub fn open_dialog(&mut self) {
        self.dialog = Some(EnvelopeDialog::default());
    }

    pub fn close_dialog(&mut self) {
        self.dialog = None;
    }

    /// Navigation target for the card at `index`.
    pub fn select(&self, index: usize) -> Option<Page> {
        self.envelopes.get(index).map(|envelope| Page::EnvelopeDetail {
            name: envelope.name.clone(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelDialog {
    pub kind: ChannelKind,
    pub url: String,
    pub description: String,
    pub submitting: bool,
    pub alert: Option<String>,
}

impl ChannelDialog {
    pub fn url_placeholder(&self) -> &'static str {
        self.kind.url_placeholder()
    }

    pub fn submit_disabled(&self) -> bool {
        self.submitting || self.url.trim().is_empty() || self.description.trim().is_empty()
    }

    /// Missing fields block the submit without an alert.
    pub fn submit(&mut self) -> Option<AddChannelRequest> {
        if self.submit_disabled() {
            return None;
        }
        self.alert = None;
        self.submitting = true;
        Some(AddChannelRequest {
            id: Some(ChannelId::generate()),
            channel_type: self.kind.clone(),
            channel_url: self.url.trim().to_string(),
            channel_description: self.description.trim().to_string(),
            created_at: Some(Utc::now()),
        })
    }

    /// Returns `true` when the dialog should close.
    pub fn finish<T>(&mut self, outcome: &Result<T, ClientError>) -> bool {
        self.submitting = false;
        match outcome {
            Ok(_) => {
                *self = Self::default();
                true
            }
            Err(error) => {
                warn!(%error, "adding channel failed");
                self.alert = Some(CHANNEL_ADD_FAILED.to_string());
                false
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeDetailView {
    pub name: Option<String>,
    pub state: ViewState,
    pub envelope: Option<EnvelopeDetail>,
    pub channel_dialog: Option<ChannelDialog>,
}

impl EnvelopeDetailView {
    pub fn for_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns `false` when there is no envelope name to fetch.
    pub fn begin_load(&mut self) -> bool {
        if self.name.as_deref().map_or(true, |name| name.trim().is_empty()) {
            return false;
        }
        self.state = ViewState::Loading;
        true
    }

    pub fn finish_load(&mut self, outcome: Result<EnvelopeDetail, ClientError>) {
        match outcome {
            Ok(detail) => {
                self.envelope = Some(detail);
                self.state = ViewState::Ready;
            }
            Err(error) if error.code() == Some(ErrorCode::NotFound) => {
                self.envelope = None;
                self.state = ViewState::NotFound;
            }
            Err(error) => {
                warn!(%error, name = ?self.name, "failed to load envelope");
                self.state = ViewState::Error(error.to_string());
            }
        }
    }

    /// `@handle` of the envelope owner, for the page header.
    pub fn owner_handle(&self) -> Option<String> {
        self.envelope
            .as_ref()
            .map(|detail| owner_handle(&detail.envelope.owner))
    }

    pub fn channel_cards(&self) -> Vec<ChannelCard> {
        self.envelope
            .iter()
            .flat_map(|detail| detail.channels.iter())
            .map(ChannelCard::from)
            .collect()
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        match (&self.state, &self.envelope) {
            (ViewState::NotFound, _) => Some(ENVELOPE_NOT_FOUND_MESSAGE),
            (ViewState::Ready, Some(detail)) if detail.channels.is_empty() => {
                Some(NO_CHANNELS_MESSAGE)
            }
            _ => None,
        }
    }

    pub fn open_channel_dialog(&mut self) {
        if self.envelope.is_some() {
            self.channel_dialog = Some(ChannelDialog::default());
        }
    }

    pub fn close_channel_dialog(&mut self) {
        self.channel_dialog = None;
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
