use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nostr_sdk::prelude::*;
use tracing_subscriber::EnvFilter;

use murmur_core::{
    CancelToken, ConversationEngine, ConversationSummary, CoreConfig, DeliveryState, Nip44Cipher,
    RelayTransport, ThreadMessage,
};

/// How often watch mode re-pulls the envelope window from relays.
const WATCH_REFRESH_SECS: u64 = 30;

#[derive(Parser)]
#[command(name = "murmur")]
#[command(about = "Encrypted direct-message conversations over Nostr relays")]
struct Cli {
    /// Secret key (nsec or hex). Falls back to the MURMUR_NSEC environment
    /// variable.
    #[arg(long)]
    nsec: Option<String>,

    /// Relay URL(s) to use instead of the built-in defaults (repeatable)
    #[arg(long)]
    relay: Vec<String>,

    /// Print machine-readable JSON instead of formatted text
    #[arg(long, short)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List conversations, most recently active first
    List,

    /// Show the message thread with one partner
    Thread {
        /// Partner public key (npub or hex)
        partner: String,

        /// Keep the thread open and print updates as they arrive
        #[arg(long)]
        watch: bool,
    },

    /// Send a message to a partner
    Send {
        /// Partner public key (npub or hex)
        partner: String,
        /// Message text
        message: String,
    },

    /// Print the public key for the configured secret
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let keys = load_keys(cli.nsec.as_deref())?;

    if let Commands::Whoami = cli.command {
        println!("{}", keys.public_key().to_bech32()?);
        return Ok(());
    }

    let mut config = CoreConfig::default();
    if let Some((primary, rest)) = cli.relay.split_first() {
        config.relay.default_relay = primary.clone();
        config.relay.fallback_relays = rest.to_vec();
    }

    let transport = RelayTransport::connect(&config)
        .await
        .context("relay connection failed")?;
    let engine = ConversationEngine::new(
        keys,
        Arc::new(Nip44Cipher),
        Arc::new(transport),
        config,
    );

    match cli.command {
        Commands::List => list_conversations(&engine, cli.json).await,
        Commands::Thread { partner, watch } => {
            let partner = parse_pubkey(&partner)?;
            show_thread(&engine, partner, watch, cli.json).await
        }
        Commands::Send { partner, message } => {
            let partner = parse_pubkey(&partner)?;
            send(&engine, partner, &message).await
        }
        Commands::Whoami => unreachable!("handled before connecting"),
    }
}

fn load_keys(flag: Option<&str>) -> Result<Keys> {
    let secret = match flag {
        Some(s) => s.to_string(),
        None => std::env::var("MURMUR_NSEC")
            .context("no key material: pass --nsec or set MURMUR_NSEC")?,
    };
    Keys::parse(&secret).context("invalid secret key")
}

fn parse_pubkey(input: &str) -> Result<PublicKey> {
    PublicKey::parse(input).with_context(|| format!("invalid public key: {input}"))
}

async fn list_conversations(engine: &ConversationEngine, json: bool) -> Result<()> {
    engine.refresh(&CancelToken::new()).await?;
    let index = engine.conversation_index();

    if json {
        println!("{}", serde_json::to_string_pretty(&index)?);
        return Ok(());
    }

    if index.is_empty() {
        println!("no conversations");
        return Ok(());
    }
    for summary in &index {
        print_summary(summary);
    }
    Ok(())
}

async fn show_thread(
    engine: &ConversationEngine,
    partner: PublicKey,
    watch: bool,
    json: bool,
) -> Result<()> {
    let mut thread = engine.open_thread(partner);
    engine.refresh(&CancelToken::new()).await?;

    print_messages(&thread.borrow_and_update().clone(), json)?;
    if !watch {
        return Ok(());
    }

    // Re-pull the envelope window on a timer; the watch channel delivers
    // each new snapshot as it is folded.
    loop {
        tokio::select! {
            changed = thread.changed() => {
                if changed.is_err() {
                    break;
                }
                print_messages(&thread.borrow_and_update().clone(), json)?;
            }
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(WATCH_REFRESH_SECS)) => {
                engine.refresh(&CancelToken::new()).await?;
            }
        }
    }

    Ok(())
}

async fn send(engine: &ConversationEngine, partner: PublicKey, message: &str) -> Result<()> {
    engine.open_thread(partner);
    let receipt = engine
        .send_message(partner, message, &CancelToken::new())
        .await?;

    if receipt.delivery != DeliveryState::Confirmed {
        bail!("send did not confirm");
    }
    println!("sent {} to {}", receipt.wrap_id, short_key(&partner));
    Ok(())
}

fn print_summary(summary: &ConversationSummary) {
    println!(
        "{}  {}  {}",
        format_timestamp(summary.last_timestamp),
        short_key(&summary.partner),
        summary.last_message
    );
}

fn print_messages(messages: &[ThreadMessage], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(messages)?);
        return Ok(());
    }
    for message in messages {
        let who = if message.is_local_author {
            "me".to_string()
        } else {
            short_key(&message.author)
        };
        let marker = match message.delivery {
            DeliveryState::Pending => " (sending…)",
            DeliveryState::Failed => " (failed)",
            DeliveryState::Confirmed => "",
        };
        println!(
            "{}  {:>12}  {}{}",
            format_timestamp(message.created_at),
            who,
            message.content,
            marker
        );
    }
    Ok(())
}

fn format_timestamp(ts: Timestamp) -> String {
    chrono::DateTime::from_timestamp(ts.as_secs() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.as_secs().to_string())
}

fn short_key(pk: &PublicKey) -> String {
    let hex = pk.to_hex();
    format!("{}…{}", &hex[..8], &hex[hex.len() - 4..])
}
