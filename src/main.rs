use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use mailwatch::config::{Config, ConfigOverrides};
use mailwatch::events::MailboxEvent;
use mailwatch::mailbox::{format_size, Message};
use mailwatch::AppContext;

#[derive(Parser)]
#[command(
    name = "mailwatch",
    about = "Live mailbox viewer for SMTP-mock backends",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Backend base URL, e.g. http://127.0.0.1:8080
    #[arg(long, env = "MAILWATCH_SERVER")]
    server: Option<String>,

    /// Path to a TOML config file
    #[arg(long, env = "MAILWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MAILWATCH_LOG")]
    log: Option<String>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "MAILWATCH_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Log format: pretty (default) or json
    #[arg(long, env = "MAILWATCH_LOG_FORMAT")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the mailbox, then tail the live feed (default when no
    /// subcommand given).
    ///
    /// Prints the current list once, then every newly arrived message as the
    /// backend pushes it. Reconnects automatically if the feed drops.
    ///
    /// Examples:
    ///   mailwatch watch
    ///   mailwatch watch --to alice@example.com
    Watch {
        /// Only show messages addressed to this recipient (to/cc/bcc,
        /// case-insensitive)
        #[arg(long)]
        to: Option<String>,
    },
    /// Fetch and print the mailbox once.
    ///
    /// Examples:
    ///   mailwatch list
    ///   mailwatch list --to bob@example.com --json
    List {
        /// Only show messages addressed to this recipient
        #[arg(long)]
        to: Option<String>,
        /// Print the raw JSON instead of formatted lines
        #[arg(long)]
        json: bool,
    },
    /// Delete one message by id.
    Delete {
        /// Message id as shown by `list`
        id: String,
    },
    /// Delete every message.
    ///
    /// Skips the remote call entirely when the mailbox is already empty.
    Clear,
    /// Download one attachment.
    ///
    /// Examples:
    ///   mailwatch attachment <MESSAGE_ID> <ATTACHMENT_ID> -o report.pdf
    Attachment {
        message_id: String,
        attachment_id: String,
        /// Output path (default: the attachment id in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(
        args.config.as_deref(),
        ConfigOverrides {
            server_url: args.server,
            log_level: args.log,
            log_file: args.log_file,
            log_format: args.log_format,
        },
    )?;
    let _guard = setup_logging(&config.log_level, config.log_file.as_deref(), &config.log_format);

    let ctx = AppContext::new(config);
    match args.command.unwrap_or(Command::Watch { to: None }) {
        Command::Watch { to } => cmd_watch(ctx, to).await,
        Command::List { to, json } => cmd_list(ctx, to, json).await,
        Command::Delete { id } => cmd_delete(ctx, id).await,
        Command::Clear => cmd_clear(ctx).await,
        Command::Attachment {
            message_id,
            attachment_id,
            output,
        } => cmd_attachment(ctx, message_id, attachment_id, output).await,
    }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn cmd_watch(ctx: AppContext, to: Option<String>) -> Result<()> {
    if let Some(addr) = to {
        ctx.mailbox.write().await.set_filter(addr);
    }

    // Subscribe before loading so nothing published during startup is missed.
    let mut events = ctx.broadcaster.subscribe();

    match ctx.client.fetch_all().await {
        Ok(messages) => {
            let mut store = ctx.mailbox.write().await;
            store.load(messages);
            for message in store.filtered_view() {
                print_message_line(message);
            }
            info!(count = store.len(), "mailbox loaded");
            ctx.broadcaster.broadcast(MailboxEvent::Loaded { count: store.len() });
        }
        Err(e) => {
            // Non-fatal: the pull path can be retried by restarting the
            // command, and the feed below still delivers new arrivals.
            error!("could not fetch the mailbox: {e} — is the server running?");
        }
    }

    let feed = ctx.spawn_feed();
    info!("watching for new messages — press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(MailboxEvent::MessageArrived(message)) => {
                    let store = ctx.mailbox.read().await;
                    if is_visible(store.filter(), &message) {
                        print_message_line(&message);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    feed.shutdown_and_join().await;
    Ok(())
}

async fn cmd_list(ctx: AppContext, to: Option<String>, json: bool) -> Result<()> {
    let messages = ctx.client.fetch_all().await.context("fetching the mailbox")?;

    let mut store = ctx.mailbox.write().await;
    store.load(messages);
    if let Some(addr) = to {
        store.set_filter(addr);
    }

    let view = store.filtered_view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }
    if view.is_empty() {
        println!("(no messages)");
        return Ok(());
    }
    for message in &view {
        print_message_line(message);
    }
    Ok(())
}

async fn cmd_delete(ctx: AppContext, id: String) -> Result<()> {
    ctx.client.remove(&id).await.context("deleting the message")?;
    ctx.mailbox.write().await.remove(&id);
    ctx.broadcaster
        .broadcast(MailboxEvent::MessageRemoved { id: id.clone() });
    println!("deleted {id}");
    Ok(())
}

async fn cmd_clear(ctx: AppContext) -> Result<()> {
    let messages = ctx.client.fetch_all().await.context("fetching the mailbox")?;
    if messages.is_empty() {
        // Skip the redundant round trip
        println!("mailbox is already empty");
        return Ok(());
    }
    ctx.client.clear_all().await.context("clearing the mailbox")?;
    ctx.mailbox.write().await.clear();
    ctx.broadcaster.broadcast(MailboxEvent::Cleared);
    println!("cleared {} messages", messages.len());
    Ok(())
}

async fn cmd_attachment(
    ctx: AppContext,
    message_id: String,
    attachment_id: String,
    output: Option<PathBuf>,
) -> Result<()> {
    let url = ctx.client.attachment_url(&message_id, &attachment_id);
    let bytes = ctx
        .client
        .fetch_attachment(&message_id, &attachment_id)
        .await
        .with_context(|| format!("downloading {url}"))?;

    let path = output.unwrap_or_else(|| PathBuf::from(&attachment_id));
    tokio::fs::write(&path, &bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("saved {} to {}", format_size(bytes.len() as u64), path.display());
    Ok(())
}

// ─── Output helpers ───────────────────────────────────────────────────────────

fn print_message_line(message: &Message) {
    let received = message
        .received_at()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| message.received_at.clone());
    let attachments = if message.attachments.is_empty() {
        String::new()
    } else {
        format!("  [{} attachment(s)]", message.attachments.len())
    };
    println!(
        "{received}  {:<30}  {}{attachments}  ({})",
        message.from_display(),
        message.subject_display(),
        message.id
    );
}

fn is_visible(filter: &str, message: &Message) -> bool {
    let filter = filter.trim().to_lowercase();
    filter.is_empty() || message.matches_recipient(&filter)
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("mailwatch.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt().json().with_env_filter(log_level).init();
            } else {
                tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt().json().with_env_filter(log_level).init();
        None
    } else {
        tracing_subscriber::fmt().with_env_filter(log_level).compact().init();
        None
    }
}
