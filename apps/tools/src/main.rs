use anyhow::Result;
use clap::{Parser, Subcommand};
use server_api::{validate_new_channel, validate_new_envelope};
use shared::{
    domain::{ChannelKind, Owner},
    error::ApiException,
    protocol::{AddChannelRequest, CreateEnvelopeRequest},
};
use storage::{RecordStore, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/curator.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateEnvelope {
        owner: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    AddChannel {
        owner: String,
        envelope: String,
        kind: String,
        url: String,
        description: String,
    },
    List {
        owner: String,
    },
    Show {
        owner: String,
        envelope: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateEnvelope {
            owner,
            name,
            description,
            color,
        } => {
            let envelope = validate_new_envelope(CreateEnvelopeRequest {
                name,
                description,
                color,
            })
            .map_err(ApiException::from)?;
            let created = storage
                .insert_envelope(&Owner::new(owner), &envelope)
                .await?;
            println!(
                "created envelope_id={} name={:?} color={}",
                created.envelope_id.0, created.name, created.color
            );
        }
        Command::AddChannel {
            owner,
            envelope,
            kind,
            url,
            description,
        } => {
            let channel = validate_new_channel(AddChannelRequest {
                id: None,
                channel_type: ChannelKind::from(kind),
                channel_url: url,
                channel_description: description,
                created_at: None,
            })
            .map_err(ApiException::from)?;
            let count = storage
                .append_channel(&Owner::new(owner), &envelope, &channel)
                .await?;
            println!("added channel_id={} channel_count={count}", channel.id);
        }
        Command::List { owner } => {
            for envelope in storage.select_envelopes(&Owner::new(owner)).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    envelope.envelope_id.0, envelope.name, envelope.color, envelope.channel_count
                );
            }
        }
        Command::Show { owner, envelope } => {
            let detail = storage
                .load_envelope_detail(&Owner::new(owner), &envelope)
                .await?;
            println!(
                "{} ({} channels)",
                detail.envelope.name, detail.envelope.channel_count
            );
            for channel in detail.channels {
                println!(
                    "  {}\t{}\t{}\t{}",
                    channel.created_at.format("%Y-%m-%d"),
                    channel.channel_type,
                    channel.channel_url,
                    channel.channel_description
                );
            }
        }
    }

    Ok(())
}
