//! Parrot CLI
//!
//! Thin wrapper around parrot-core: loads or creates the identity, starts a
//! session and then echoes everything the agent reports to the terminal
//! while sending whatever the operator types.
//!
//! ## Usage
//!
//! ```bash
//! # First start: create an identity in ./bot without asking
//! parrot --confdir ./bot --createid
//!
//! # Connect to a relay and greet someone
//! parrot --confdir ./bot --relay relay.example.org:7000 --testid ECHOECHO
//!
//! # Quote every received text back to its sender
//! parrot --confdir ./bot --relay relay.example.org:7000 --echo
//! ```
//!
//! Once running, send messages by typing `IDENTITY` followed directly by
//! the text, e.g. `1337ABCDHello World!`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use parrot_core::config::DEFAULT_PASSPHRASE;
use parrot_core::logging::JsonlLayer;
use parrot_core::{
    Agent, AgentConfig, DispatchConfig, Identity, LocalIdentity, Passphrase, Transport,
};
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;

/// Parrot - a command-line messaging agent
#[derive(Parser, Debug)]
#[command(name = "parrot")]
#[command(version = "0.1.0")]
#[command(about = "Parrot - send and receive messages from the command line")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the configuration directory
    #[arg(long, default_value = ".")]
    confdir: PathBuf,

    /// The public nickname for the account (max. 32 bytes)
    #[arg(long)]
    pubnick: Option<String>,

    /// Passphrase for the identity file; should be at least 8 characters
    #[arg(long, default_value = DEFAULT_PASSPHRASE)]
    pass: String,

    /// Like --pass but hex encoded, overrides --pass (e.g. 4d7954696e795057)
    #[arg(long)]
    hexpass: Option<String>,

    /// Send --testmsg to this identity on startup
    #[arg(long)]
    testid: Option<String>,

    /// Message sent to --testid
    #[arg(long, default_value = "Say something!")]
    testmsg: String,

    /// Create a new identity if necessary without asking
    #[arg(long)]
    createid: bool,

    /// Relay to connect to (HOST:PORT); offline loopback if omitted
    #[arg(long)]
    relay: Option<String>,

    /// Directory service base URL
    #[arg(long, default_value = parrot_core::DEFAULT_DIRECTORY_URL)]
    directory_url: String,

    /// Quote every received text back to its sender
    #[arg(long)]
    echo: bool,

    /// Reply with this text whenever a known group talks
    #[arg(long)]
    group_reply: Option<String>,

    /// Also write JSONL logs into this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn setup_logging(verbosity: u8, jsonl: Option<JsonlLayer>) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(jsonl)
        .init();
}

/// Ask the operator whether to create a new identity
async fn confirm_create<R>(lines: &mut tokio::io::Lines<R>) -> Result<bool>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("  No existing ID found. Create a new one? Enter YES (upper case) or NO: ");
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?;
    Ok(answer.as_deref() == Some("YES"))
}

fn create_identity(path: &Path, passphrase: &Passphrase) -> Result<LocalIdentity> {
    let identity = LocalIdentity::generate();
    println!("  Saving ID to {}", path.display());
    identity
        .save(path, passphrase.as_bytes())
        .context("Saving ID failed")?;
    Ok(identity)
}

fn build_config(cli: &Cli, passphrase: Passphrase) -> AgentConfig {
    let mut config = AgentConfig::new(&cli.confdir);
    if let Some(nick) = &cli.pubnick {
        config = config.with_nickname(nick);
        println!("  Setting public nickname to: {}", config.nickname);
    }
    config.passphrase = passphrase;
    config.transport = match &cli.relay {
        Some(addr) => Transport::Relay(addr.clone()),
        None => Transport::Loopback,
    };
    config.directory_url = cli.directory_url.clone();
    config.dispatch = DispatchConfig {
        echo: cli.echo,
        group_reply: cli.group_reply.clone(),
    };
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let passphrase = match &cli.hexpass {
        Some(hex) => Passphrase::from_hex(hex).context("Error decoding hexpass")?,
        None => Passphrase::plain(&cli.pass),
    };
    if passphrase.is_weak() {
        println!("  Warning: Password should have at least 8 characters!");
    }

    let testid = cli
        .testid
        .as_deref()
        .map(Identity::parse)
        .transpose()
        .context("Invalid --testid")?;

    let config = build_config(&cli, passphrase);
    let mut stdin = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    let identity_path = config.paths.identity.clone();
    let identity = if LocalIdentity::exists(&identity_path) {
        println!("  Loading ID from {}", identity_path.display());
        LocalIdentity::load(&identity_path, config.passphrase.as_bytes())?
    } else if cli.createid || confirm_create(&mut stdin).await? {
        create_identity(&identity_path, &config.passphrase)?
    } else {
        println!("  No ID, exiting.");
        std::process::exit(1);
    };

    let jsonl = match &cli.log_dir {
        Some(dir) => Some(
            JsonlLayer::new(dir, identity.identity().as_str())
                .with_context(|| format!("Cannot open log directory {}", dir.display()))?,
        ),
        None => None,
    };
    setup_logging(cli.verbose, jsonl);

    println!(
        "  Using ID {} and public nickname: {}",
        identity.identity(),
        config.nickname
    );
    println!("  Public key: {}", hex::encode(identity.public_key().as_bytes()));
    if config.paths.address_book.exists() {
        println!(
            "  Loading addressbook from: {}",
            config.paths.address_book.display()
        );
    }
    if config.paths.group_directory.exists() {
        println!(
            "  Loading group directory from: {}",
            config.paths.group_directory.display()
        );
    }
    println!("  Starting session");

    let (agent, inbound) = Agent::connect(&identity, config).await?;
    let mut events = agent.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", event),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    println!("  ({} events skipped)", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    if let Some(testid) = testid {
        agent.send_test_message(&testid, &cli.testmsg).await?;
    }

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            println!("Exiting...");
            ctrl_c.cancel();
        }
    });

    println!("  Sending thread started! Send messages via: ---ID---MESSAGE (e.g. 1337ABCDHello World!)");
    let result = agent.run(inbound, stdin.into_inner(), shutdown).await;

    drop(agent);
    let _ = printer.await;

    // A pending stdin read lives on a blocking thread and would keep the
    // runtime from shutting down, so both outcomes exit directly.
    match result {
        Ok(exit) => {
            tracing::info!(?exit, "Agent stopped");
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {:?}", anyhow::Error::new(e));
            std::process::exit(1);
        }
    }
}
