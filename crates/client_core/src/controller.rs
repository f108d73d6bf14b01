//! Command/event loop driving the envelope views.
//!
//! Front ends send [`UiCommand`]s and render from the [`UiEvent`]s that
//! come back. Commands are handled one at a time, so a view never sees
//! two fetches racing each other.

use std::sync::Arc;

use shared::{domain::ChannelKind, protocol::SessionStatus};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    views::{gate, EnvelopeDetailView, EnvelopeListView, GateDecision, Page},
    CurationBackend,
};

#[derive(Debug, Clone)]
pub enum UiCommand {
    RefreshSession,
    SignIn {
        email: String,
        name: Option<String>,
    },
    SignOut,
    Navigate(Page),
    LoadEnvelopes,
    OpenEnvelopeDialog,
    CloseEnvelopeDialog,
    SubmitEnvelope {
        name: String,
        description: String,
        color: Option<String>,
    },
    OpenEnvelope {
        name: String,
    },
    LoadEnvelope,
    OpenChannelDialog,
    CloseChannelDialog,
    SubmitChannel {
        kind: ChannelKind,
        url: String,
        description: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Session(SessionStatus),
    Navigate(Page),
    ListView(EnvelopeListView),
    DetailView(EnvelopeDetailView),
    Alert(String),
}

pub struct Controller {
    backend: Arc<dyn CurationBackend>,
    session: SessionStatus,
    page: Page,
    list: EnvelopeListView,
    detail: EnvelopeDetailView,
}

impl Controller {
    pub fn new(backend: Arc<dyn CurationBackend>) -> Self {
        Self {
            backend,
            session: SessionStatus::Loading,
            page: Page::Landing,
            list: EnvelopeListView::default(),
            detail: EnvelopeDetailView::default(),
        }
    }

    /// Starts on `page`; the first `RefreshSession` gates and loads it.
    pub fn on_page(backend: Arc<dyn CurationBackend>, page: Page) -> Self {
        Self {
            page,
            ..Self::new(backend)
        }
    }

    pub fn session(&self) -> &SessionStatus {
        &self.session
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn list(&self) -> &EnvelopeListView {
        &self.list
    }

    pub fn detail(&self) -> &EnvelopeDetailView {
        &self.detail
    }

    fn signed_in(&self) -> bool {
        matches!(self.session, SessionStatus::Authenticated { .. })
    }

    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<UiCommand>,
        events: mpsc::Sender<UiEvent>,
    ) {
        while let Some(cmd) = commands.recv().await {
            for event in self.handle(cmd).await {
                if events.send(event).await.is_err() {
                    debug!("ui event receiver dropped; stopping controller");
                    return;
                }
            }
        }
    }

    pub async fn handle(&mut self, cmd: UiCommand) -> Vec<UiEvent> {
        let mut out = Vec::new();
        match cmd {
            UiCommand::RefreshSession => {
                self.session = match self.backend.session().await {
                    Ok(status) => status,
                    Err(error) => {
                        warn!(%error, "session lookup failed");
                        SessionStatus::Unauthenticated
                    }
                };
                out.push(UiEvent::Session(self.session.clone()));
                self.navigate(self.page.clone(), &mut out).await;
            }
            UiCommand::SignIn { email, name } => {
                match self.backend.sign_in(&email, name.as_deref()).await {
                    Ok(profile) => {
                        info!(owner = %profile.email, "signed in");
                        self.session = SessionStatus::Authenticated { profile };
                        out.push(UiEvent::Session(self.session.clone()));
                        self.navigate(Page::Profile, &mut out).await;
                    }
                    Err(error) => {
                        warn!(%error, "sign-in failed");
                        out.push(UiEvent::Alert(format!("Sign-in failed: {error}")));
                    }
                }
            }
            UiCommand::SignOut => {
                if let Err(error) = self.backend.sign_out().await {
                    warn!(%error, "sign-out request failed");
                }
                self.session = SessionStatus::Unauthenticated;
                self.list = EnvelopeListView::default();
                self.detail = EnvelopeDetailView::default();
                out.push(UiEvent::Session(self.session.clone()));
                self.navigate(Page::Landing, &mut out).await;
            }
            UiCommand::Navigate(page) => self.navigate(page, &mut out).await,
            UiCommand::LoadEnvelopes => self.load_envelopes(&mut out).await,
            UiCommand::OpenEnvelopeDialog => {
                self.list.open_dialog();
                out.push(UiEvent::ListView(self.list.clone()));
            }
            UiCommand::CloseEnvelopeDialog => {
                self.list.close_dialog();
                out.push(UiEvent::ListView(self.list.clone()));
            }
            UiCommand::SubmitEnvelope {
                name,
                description,
                color,
            } => self.submit_envelope(name, description, color, &mut out).await,
            UiCommand::OpenEnvelope { name } => {
                self.navigate(Page::EnvelopeDetail { name }, &mut out).await
            }
            UiCommand::LoadEnvelope => self.load_envelope(&mut out).await,
            UiCommand::OpenChannelDialog => {
                self.detail.open_channel_dialog();
                out.push(UiEvent::DetailView(self.detail.clone()));
            }
            UiCommand::CloseChannelDialog => {
                self.detail.close_channel_dialog();
                out.push(UiEvent::DetailView(self.detail.clone()));
            }
            UiCommand::SubmitChannel {
                kind,
                url,
                description,
            } => self.submit_channel(kind, url, description, &mut out).await,
        }
        out
    }

    async fn navigate(&mut self, page: Page, out: &mut Vec<UiEvent>) {
        let page = match gate(&self.session, &page) {
            GateDecision::RenderNothing => {
                self.page = page;
                return;
            }
            GateDecision::Redirect(target) => target,
            GateDecision::Render => page,
        };
        if let Page::EnvelopeDetail { name } = &page {
            if self.detail.name.as_deref() != Some(name.as_str()) {
                self.detail = EnvelopeDetailView::for_name(name.clone());
            }
        }
        self.page = page.clone();
        out.push(UiEvent::Navigate(page.clone()));
        match page {
            Page::Profile => self.load_envelopes(out).await,
            Page::EnvelopeDetail { .. } => self.load_envelope(out).await,
            Page::Landing | Page::Settings => {}
        }
    }

    async fn load_envelopes(&mut self, out: &mut Vec<UiEvent>) {
        if !self.signed_in() {
            return;
        }
        self.list.begin_load();
        out.push(UiEvent::ListView(self.list.clone()));
        let outcome = self.backend.list_envelopes().await;
        self.list.finish_load(outcome);
        out.push(UiEvent::ListView(self.list.clone()));
    }

    async fn load_envelope(&mut self, out: &mut Vec<UiEvent>) {
        if !self.signed_in() || !self.detail.begin_load() {
            out.push(UiEvent::DetailView(self.detail.clone()));
            return;
        }
        out.push(UiEvent::DetailView(self.detail.clone()));
        let Some(name) = self.detail.name.clone() else {
            return;
        };
        let outcome = self.backend.envelope_detail(&name).await;
        self.detail.finish_load(outcome);
        out.push(UiEvent::DetailView(self.detail.clone()));
    }

    async fn submit_envelope(
        &mut self,
        name: String,
        description: String,
        color: Option<String>,
        out: &mut Vec<UiEvent>,
    ) {
        let dialog = self.list.dialog.get_or_insert_with(Default::default);
        dialog.name = name;
        dialog.description = description;
        if let Some(color) = color.as_deref() {
            dialog.set_color(color);
        }
        let Some(req) = dialog.submit() else {
            if let Some(alert) = dialog.alert.clone() {
                out.push(UiEvent::Alert(alert));
            }
            out.push(UiEvent::ListView(self.list.clone()));
            return;
        };
        out.push(UiEvent::ListView(self.list.clone()));

        let outcome = self.backend.create_envelope(&req).await;
        let close = self
            .list
            .dialog
            .as_mut()
            .map_or(true, |dialog| dialog.finish(&outcome));
        if let Some(alert) = self.list.dialog.as_ref().and_then(|d| d.alert.clone()) {
            out.push(UiEvent::Alert(alert));
        }
        if close {
            self.list.close_dialog();
            self.load_envelopes(out).await;
        } else {
            out.push(UiEvent::ListView(self.list.clone()));
        }
    }

    async fn submit_channel(
        &mut self,
        kind: ChannelKind,
        url: String,
        description: String,
        out: &mut Vec<UiEvent>,
    ) {
        let Some(name) = self.detail.name.clone() else {
            return;
        };
        let Some(dialog) = self.detail.channel_dialog.as_mut() else {
            return;
        };
        dialog.kind = kind;
        dialog.url = url;
        dialog.description = description;
        let Some(req) = dialog.submit() else {
            out.push(UiEvent::DetailView(self.detail.clone()));
            return;
        };
        out.push(UiEvent::DetailView(self.detail.clone()));

        let outcome = self.backend.add_channel(&name, &req).await;
        let close = self
            .detail
            .channel_dialog
            .as_mut()
            .map_or(true, |dialog| dialog.finish(&outcome));
        if close {
            self.detail.close_channel_dialog();
            self.load_envelope(out).await;
        } else {
            if let Some(alert) = self
                .detail
                .channel_dialog
                .as_ref()
                .and_then(|d| d.alert.clone())
            {
                out.push(UiEvent::Alert(alert));
            }
            out.push(UiEvent::DetailView(self.detail.clone()));
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
