// padsync: mirror a text file to another machine as you edit it
//
// Cross-platform (macOS, Linux, Windows) command-line front end for padsync-core.
// Status goes to stderr; `receive` writes the document itself to stdout.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use padsync_core::replica::{ApplyOutcome, Replica};
use padsync_core::transport::{
    bind_responder, discover, respond, run_receiver, CloseWatch, Outbound, ReceiverEvent,
    SenderLink,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// How long `send` waits for a discovery reply before retrying
const DISCOVERY_WAIT: Duration = Duration::from_secs(2);

/// Receiver events buffered between the network task and the display
const EVENT_QUEUE: usize = 64;

#[derive(Parser)]
#[command(name = "padsync")]
#[command(about = "padsync — live one-way text mirroring over the LAN", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch a file and mirror it to a receiver
    Send {
        /// Receiver address (HOST:PORT); falls back to config, then discovery
        #[arg(short, long)]
        to: Option<String>,
        file: PathBuf,
    },
    /// Accept a sender and show the mirrored document
    Receive {
        #[arg(short, long)]
        port: Option<u16>,
        /// Rewrite this file on every update instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Look for a receiver on the local network
    Discover {
        /// Seconds to wait for a reply
        #[arg(short, long, default_value = "3")]
        wait: u64,
    },
    /// Configure settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Set { key: String, value: String },
    Get { key: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Send { to, file } => cmd_send(to, file).await,
        Commands::Receive { port, output } => cmd_receive(port, output).await,
        Commands::Discover { wait } => cmd_discover(wait).await,
        Commands::Config { action } => cmd_config(action).await,
    }
}

async fn cmd_send(to: Option<String>, file: PathBuf) -> Result<()> {
    let config = config::Config::load()?;
    let sync = config.to_sync_config();
    let target = to.or_else(|| config.receiver_addr.clone());

    eprintln!("{}", "padsync — Sending".bold());
    eprintln!("  File:     {}", file.display().to_string().bright_cyan());
    eprintln!(
        "  Receiver: {}",
        target.as_deref().unwrap_or("(discover on LAN)").bright_cyan()
    );
    eprintln!();

    let mut outbound = Outbound::new(sync.debounce, sync.patch, Instant::now());
    let mut ticker = tokio::time::interval(sync.debounce);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut link: Option<(SenderLink<OwnedWriteHalf>, CloseWatch<OwnedReadHalf>)> = None;
    let mut next_attempt = Instant::now();
    let mut last_sent: Option<Instant> = None;

    loop {
        let peer_closed = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            _ = receiver_hung_up(link.as_mut().map(|(_, watch)| watch)) => true,
            _ = ticker.tick() => false,
        };
        let now = Instant::now();

        if peer_closed {
            link = None;
            eprintln!("{} Receiver closed the connection", "○".yellow());
            // A close right after a send may have raced it: resend in full
            if last_sent.is_some_and(|at| now.duration_since(at) < sync.read_timeout) {
                outbound.reset();
            }
        }

        match tokio::fs::read_to_string(&file).await {
            Ok(text) => {
                outbound.observe(&text, now);
            }
            Err(e) => {
                warn!("Cannot read {}: {}", file.display(), e);
                continue;
            }
        }

        // Reconnect only once there is something to deliver
        if link.is_none() {
            if !outbound.has_unsent() || now < next_attempt {
                continue;
            }
            next_attempt = now + config.reconnect_interval();

            let connected = async {
                let addr = resolve_receiver(&config, target.as_deref()).await?;
                let link = SenderLink::connect(addr, sync.connect_timeout).await?;
                Ok::<_, anyhow::Error>((addr, link))
            }
            .await;

            match connected {
                Ok((addr, fresh)) => {
                    eprintln!("{} Connected to {}", "✓".green(), addr);
                    outbound.reset();
                    link = Some(fresh);
                }
                Err(e) => {
                    warn!("Connect failed: {:#}", e);
                    continue;
                }
            }
        }

        let Some((active, _)) = link.as_ref() else {
            continue;
        };
        let Some(planned) = outbound.poll(now) else {
            continue;
        };

        match active.send(planned.body.clone()).await {
            Ok(seq) => {
                eprintln!("{} {} seq {}", "→".bright_blue(), planned.body.kind(), seq);
                outbound.commit(planned);
                last_sent = Some(now);
            }
            Err(e) => {
                warn!("Send failed: {}", e);
                eprintln!("{} Disconnected, retrying", "✗".red());
                link = None;
                next_attempt = now + config.reconnect_interval();
            }
        }
    }

    if let Some((active, _)) = link {
        if let Err(e) = active.shutdown().await {
            debug!("Shutdown: {}", e);
        }
    }
    Ok(())
}

/// Resolves when the receiver closes the link; never without one.
async fn receiver_hung_up(watch: Option<&mut CloseWatch<OwnedReadHalf>>) {
    match watch {
        Some(watch) => watch.closed().await,
        None => std::future::pending().await,
    }
}

async fn resolve_receiver(config: &config::Config, target: Option<&str>) -> Result<SocketAddr> {
    match target {
        Some(addr) => tokio::net::lookup_host(addr)
            .await
            .with_context(|| format!("Failed to resolve {}", addr))?
            .next()
            .with_context(|| format!("No address found for {}", addr)),
        None => discover(config.discovery_port, config.data_port, DISCOVERY_WAIT)
            .await?
            .context("No receiver answered the discovery probe"),
    }
}

async fn cmd_receive(port: Option<u16>, output: Option<PathBuf>) -> Result<()> {
    let config = config::Config::load()?;
    let sync = config.to_sync_config();
    let port = port.unwrap_or(config.data_port);

    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("Failed to listen on port {}", port))?;

    match bind_responder(config.discovery_port).await {
        Ok(socket) => {
            tokio::spawn(async move { respond(&socket).await });
        }
        Err(e) => warn!("Discovery disabled: {}", e),
    }

    eprintln!("{}", "padsync — Receiving".bold());
    eprintln!("  Port:   {}", port.to_string().bright_cyan());
    if let Some(path) = &output {
        eprintln!("  Output: {}", path.display().to_string().bright_cyan());
    }
    eprintln!();

    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE);
    let server = tokio::spawn(run_receiver(listener, sync.clone(), tx));
    let mut replica = Replica::with_growth_slack(sync.patch.growth_slack);

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(event) = event else {
            break;
        };

        match event {
            ReceiverEvent::Connected { peer } => {
                replica.reset();
                eprintln!("{} Sender connected: {}", "✓".green(), peer);
            }
            ReceiverEvent::Disconnected { peer, reason } => {
                eprintln!("{} Sender {} gone ({})", "○".yellow(), peer, reason);
            }
            ReceiverEvent::Message(message) => {
                let outcome = replica.apply(&message);
                if let ApplyOutcome::Stale { seq, last } = outcome {
                    debug!("Ignoring seq {} (at {})", seq, last);
                    continue;
                }
                show_document(replica.text(), output.as_deref()).await?;
            }
        }
    }

    server.abort();
    Ok(())
}

async fn show_document(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => tokio::fs::write(path, text)
            .await
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            println!("{}", "─".repeat(40).dimmed());
            println!("{}", text);
            Ok(())
        }
    }
}

async fn cmd_discover(wait: u64) -> Result<()> {
    let config = config::Config::load()?;

    eprintln!("Probing for receivers on UDP port {}...", config.discovery_port);
    match discover(config.discovery_port, config.data_port, Duration::from_secs(wait)).await? {
        Some(addr) => println!("{} Receiver at {}", "✓".green(), addr.to_string().bright_cyan()),
        None => println!("{} No receiver answered", "✗".red()),
    }
    Ok(())
}

async fn cmd_config(action: ConfigAction) -> Result<()> {
    let mut config = config::Config::load()?;

    match action {
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} Set {} = {}", "✓".green(), key.bright_cyan(), value);
        }

        ConfigAction::Get { key } => {
            if let Some(value) = config.get(&key) {
                println!("{} = {}", key.bright_cyan(), value);
            } else if key == "receiver_addr" {
                println!("{} = {}", key.bright_cyan(), "(discover)".dimmed());
            } else {
                anyhow::bail!("Unknown config key: {}", key);
            }
        }

        ConfigAction::List => {
            println!("{}", "Configuration".bold());
            println!();

            for (key, value) in config.list() {
                println!("  {:<24} {}", key.bright_cyan(), value);
            }

            println!();
            println!("File: {}", config::Config::config_file()?.display());
        }
    }

    Ok(())
}
