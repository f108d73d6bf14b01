use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    render::ProfileHeader,
    views::{EnvelopeDetailView, EnvelopeListView, Page, ViewState},
    Controller, HttpBackend, UiCommand, UiEvent,
};
use shared::domain::{ChannelKind, ENVELOPE_PALETTE};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "curator", about = "Curate envelopes of content channels")]
struct Args {
    #[arg(long, env = "CURATOR_SERVER_URL", default_value = "http://127.0.0.1:8443")]
    server_url: String,
    /// Session token printed by `sign-in`.
    #[arg(long, env = "CURATOR_TOKEN", hide_env_values = true)]
    token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    SignIn {
        email: String,
        #[arg(long)]
        name: Option<String>,
    },
    Whoami,
    SignOut,
    List,
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// One of the palette hex values; red when omitted.
        #[arg(long)]
        color: Option<String>,
    },
    Show {
        envelope: String,
    },
    AddChannel {
        envelope: String,
        /// `x` or `website`.
        #[arg(long, default_value = "x")]
        kind: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        description: String,
    },
    Colors,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    if let Command::Colors = args.command {
        for swatch in ENVELOPE_PALETTE {
            println!("{:<7} {}", swatch.name, swatch.value);
        }
        return Ok(());
    }

    let mut backend = HttpBackend::new(&args.server_url)?;
    if let Some(token) = args.token {
        backend = backend.with_token(token).await;
    }
    let backend = Arc::new(backend);

    let signing_in = matches!(args.command, Command::SignIn { .. });
    let (start, script) = script_for(args.command);
    let mut commands = vec![UiCommand::RefreshSession];
    commands.extend(script);

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(64);
    let worker = tokio::spawn(Controller::on_page(backend.clone(), start).run(cmd_rx, event_tx));
    for cmd in commands {
        cmd_tx.send(cmd).await?;
    }
    drop(cmd_tx);

    let mut events = Vec::new();
    while let Some(event) = event_rx.recv().await {
        events.push(event);
    }
    worker.await?;

    report(&events)?;
    if signing_in {
        if let Some(token) = backend.token().await {
            println!("export CURATOR_TOKEN={token}");
        }
    }
    Ok(())
}

/// Page the controller starts on, and the commands to run once the
/// session is known. The session refresh loads the start page.
fn script_for(command: Command) -> (Page, Vec<UiCommand>) {
    match command {
        Command::SignIn { email, name } => {
            (Page::Landing, vec![UiCommand::SignIn { email, name }])
        }
        Command::Whoami | Command::Colors => (Page::Settings, Vec::new()),
        Command::SignOut => (Page::Settings, vec![UiCommand::SignOut]),
        Command::List => (Page::Profile, Vec::new()),
        Command::Create {
            name,
            description,
            color,
        } => (
            Page::Profile,
            vec![
                UiCommand::OpenEnvelopeDialog,
                UiCommand::SubmitEnvelope {
                    name,
                    description,
                    color,
                },
            ],
        ),
        Command::Show { envelope } => (Page::EnvelopeDetail { name: envelope }, Vec::new()),
        Command::AddChannel {
            envelope,
            kind,
            url,
            description,
        } => (
            Page::EnvelopeDetail { name: envelope },
            vec![
                UiCommand::OpenChannelDialog,
                UiCommand::SubmitChannel {
                    kind: ChannelKind::from(kind),
                    url,
                    description,
                },
            ],
        ),
    }
}

fn report(events: &[UiEvent]) -> Result<()> {
    let mut list: Option<&EnvelopeListView> = None;
    let mut detail: Option<&EnvelopeDetailView> = None;
    let mut page: Option<&Page> = None;
    let mut session = None;
    let mut alerts = Vec::new();
    for event in events {
        match event {
            UiEvent::Session(status) => session = Some(status),
            UiEvent::Navigate(target) => page = Some(target),
            UiEvent::ListView(view) => list = Some(view),
            UiEvent::DetailView(view) => detail = Some(view),
            UiEvent::Alert(message) => alerts.push(message.as_str()),
        }
    }

    if let Some(profile) = session.and_then(|status| status.profile()) {
        let header = ProfileHeader::from(profile);
        match &header.display_name {
            Some(name) => println!("[{}] {} {}", header.initial, name, header.handle),
            None => println!("[{}] {}", header.initial, header.handle),
        }
    }
    for alert in &alerts {
        eprintln!("! {alert}");
    }

    match page {
        Some(Page::Landing) => {
            println!("Signed out. Run `curator sign-in <email>` to continue.");
        }
        Some(Page::Profile) => {
            if let Some(view) = list {
                print_list(view)?;
            }
        }
        Some(Page::EnvelopeDetail { .. }) => {
            if let Some(view) = detail {
                print_detail(view)?;
            }
        }
        Some(Page::Settings) | None => {}
    }
    if !alerts.is_empty() {
        bail!("request failed");
    }
    Ok(())
}

fn print_list(view: &EnvelopeListView) -> Result<()> {
    if let ViewState::Error(message) = &view.state {
        bail!("could not load envelopes: {message}");
    }
    if let Some(message) = view.empty_message() {
        println!("{message}");
    }
    for card in view.cards() {
        println!(
            "{:<24} {} {:>3} channels  {}",
            card.name,
            card.color,
            card.channel_count,
            card.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn print_detail(view: &EnvelopeDetailView) -> Result<()> {
    if let ViewState::Error(message) = &view.state {
        bail!("could not load envelope: {message}");
    }
    if let Some(detail) = &view.envelope {
        println!(
            "{} ({} channels) {} {}",
            detail.envelope.name,
            detail.envelope.channel_count,
            detail.envelope.color,
            view.owner_handle().unwrap_or_default()
        );
        if let Some(description) = &detail.envelope.description {
            println!("  {description}");
        }
    }
    if let Some(message) = view.empty_message() {
        println!("{message}");
    }
    for card in view.channel_cards() {
        println!(
            "  {:?} {:<8} {:<40} {}",
            card.icon, card.label, card.url, card.created_on
        );
    }
    Ok(())
}
