//! # groupmirror
//!
//! Command-line front end for the group mirror.  Loads a group, pages
//! through its messages or lists its subgroups and prints what was
//! mirrored.  Configuration comes from `GROUPMIRROR_*` environment
//! variables; `GROUPMIRROR_TOKEN` is required.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use groupmirror_client::{Chat, ClientConfig, GroupChat, GroupMirror, Loadable, Queryable};
use groupmirror_net::PageRequest;
use groupmirror_shared::ChatResult;
use groupmirror_store::{Message, MessageKind};

#[derive(Parser)]
#[command(name = "groupmirror", version, about = "Mirror group chats from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show a group's profile, settings and members
    Group { id: String },

    /// Fetch one page of a group's messages
    Messages {
        id: String,
        /// Messages strictly older than this one
        #[arg(long, value_name = "MESSAGE_ID", conflicts_with_all = ["after", "since"])]
        before: Option<String>,
        /// The message right after this one
        #[arg(long, value_name = "MESSAGE_ID", conflicts_with = "since")]
        after: Option<String>,
        /// Most recent messages newer than this one
        #[arg(long, value_name = "MESSAGE_ID")]
        since: Option<String>,
        /// Page size (1-100)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// List a group's subgroups
    Subgroups { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,groupmirror_client=debug,groupmirror_net=debug")
        }))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");
    let token = config
        .token
        .clone()
        .context("GROUPMIRROR_TOKEN is not set")?;

    let client = GroupMirror::connect(&config, token)?;

    // -----------------------------------------------------------------------
    // 3. Run the command, abandoning polls on Ctrl+C
    // -----------------------------------------------------------------------
    tokio::select! {
        result = run(&client, &config, cli.command) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
            client.shutdown();
            Ok(())
        }
    }
}

async fn run(client: &GroupMirror, config: &ClientConfig, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Group { id } => {
            let group = load(client, &id).await?;
            print_group(&group);
        }
        Command::Messages {
            id,
            before,
            after,
            since,
            limit,
        } => {
            let limit = limit.unwrap_or(config.page_limit);
            let page = match (before, after, since) {
                (Some(m), _, _) => PageRequest::before(m, limit),
                (_, Some(m), _) => PageRequest::after(m, limit),
                (_, _, Some(m)) => PageRequest::since(m, limit),
                _ => PageRequest::latest(limit),
            };
            let group = client.group(id.as_str());
            let outcome = group.query_messages(page).await?;
            check(outcome.result, "query messages")?;
            let store = group.core().messages().read().await;
            for message in store.iter() {
                print_message(message);
            }
            info!(received = outcome.received, "Done");
        }
        Command::Subgroups { id } => {
            let group = load(client, &id).await?;
            for sub in group.subgroups() {
                let profile = sub.profile();
                println!(
                    "{}\t{}\t{}",
                    sub.id(),
                    profile.topic,
                    profile.description.unwrap_or_default()
                );
            }
        }
    }
    Ok(())
}

async fn load(client: &GroupMirror, id: &str) -> anyhow::Result<GroupChat> {
    let group = client.group(id);
    let result = group.load().await?;
    check(result, "load group")?;
    Ok(group)
}

fn check(result: ChatResult, what: &str) -> anyhow::Result<()> {
    if !result.is_success() {
        bail!("{what} failed: {result}");
    }
    Ok(())
}

fn print_group(group: &GroupChat) {
    let profile = group.profile();
    let settings = group.group_settings();
    println!("{} ({})", profile.name, group.id());
    if let Some(description) = profile.description {
        println!("  {description}");
    }
    if let Some(created) = profile.created_at {
        println!("  created {}", created.format("%Y-%m-%d"));
    }
    if let Some(creator) = group.creator() {
        println!("  creator {}", creator.nickname);
    }
    if let Some(url) = group.share_url() {
        println!("  share   {url}");
    }
    println!(
        "  type {}, approval {}",
        settings.visibility.as_deref().unwrap_or("unknown"),
        if settings.requires_approval { "required" } else { "not required" }
    );
    println!("  members ({}):", group.members().len());
    for user in group.members().snapshot() {
        println!("    {}\t{}", user.id(), user.nickname);
    }
    println!("  subgroups: {}", group.subgroups().len());
}

fn print_message(message: &Message) {
    let id = message.id.as_ref().map(|id| id.as_str()).unwrap_or("-");
    let who = match message.kind {
        MessageKind::System => "system",
        MessageKind::User => message.sender.nickname.as_str(),
    };
    let likes = if message.favorited_by.is_empty() {
        String::new()
    } else {
        format!(" [{} likes]", message.favorited_by.len())
    };
    println!(
        "{} {} <{}> {}{} (+{} attachments)",
        message.created_at.format("%Y-%m-%d %H:%M:%S"),
        id,
        who,
        message.text.as_deref().unwrap_or(""),
        likes,
        message.attachments.len()
    );
}
