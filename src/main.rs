// ABOUTME: Main entry point for the chatline terminal client
// ABOUTME: Loads config, configures the account, runs the event pipeline and the input loop

use anyhow::{bail, Context, Result};
use chatline::compose::Composer;
use chatline::{logging, session};
use chatline::view::ChatView;
use chatline_account::{AccountRegistry, AccountService};
use chatline_core::{Config, NewMessageHub, Pipeline};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "chatline")]
#[command(about = "Minimal terminal chat client", long_about = None)]
struct Cli {
    /// E-mail address, needed only while the account is unconfigured
    addr: Option<String>,

    /// Mail password for ADDR
    mail_pw: Option<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Account database path, for backends that persist
    #[arg(long)]
    db: Option<String>,

    /// Answer every sent message with an echo (memory backend)
    #[arg(long)]
    echo: bool,

    /// Also log to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(addr) = cli.addr {
        config.account.addr = Some(addr);
    }
    if let Some(mail_pw) = cli.mail_pw {
        config.account.mail_pw = Some(mail_pw);
    }
    if let Some(db) = cli.db {
        config.account.db_path = Some(db);
    }
    if cli.echo {
        config.account.options.insert("echo".into(), true.into());
    }

    let _log_guard = logging::init(&config.logging, cli.verbose)?;
    tracing::info!(
        backend = %config.account.backend_type(),
        channel_capacity = config.pipeline.channel_capacity,
        "Starting chatline"
    );

    let account = AccountRegistry::default().create_from_config(&config.account)?;
    ensure_configured(account.as_ref(), &config).await?;

    let stdout = std::io::stdout();
    let view = Arc::new(ChatView::new(Arc::clone(&account), stdout));
    let hub = Arc::new(NewMessageHub::new(config.pipeline.subscriber_timeout()));
    hub.subscribe(view.clone());

    let mut lines = spawn_input_reader()?;
    let pipeline = Pipeline::builder(Arc::clone(&account))
        .config(&config.pipeline)
        .hub(hub)
        .start()?;

    let mut composer = Composer::new(Arc::clone(&account), Arc::clone(&view));
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let outcome = session::run(pipeline, &mut composer, &*view, &mut lines, interrupt).await;
    account.close();
    let report = outcome?;
    tracing::info!(
        dispatched = report.stats.total(),
        consumer = ?report.consumer,
        "chatline stopped"
    );
    Ok(())
}

/// Configure the account from config/CLI credentials if it is not yet set up
async fn ensure_configured(account: &dyn AccountService, config: &Config) -> Result<()> {
    if account.is_configured().await? {
        return Ok(());
    }
    let (Some(addr), Some(mail_pw)) = (
        config.account.addr.as_deref(),
        config.account.mail_pw.as_deref(),
    ) else {
        bail!("Account is not configured yet: run `chatline ADDR MAIL_PW` once");
    };
    tracing::info!(addr = %addr, "Configuring account");
    account
        .configure(addr, mail_pw)
        .await
        .with_context(|| format!("Failed to configure account {}", addr))
}

/// Read stdin lines on a dedicated thread; blocking reads would otherwise
/// keep the runtime from shutting down
fn spawn_input_reader() -> Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("chatline-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn input thread")?;
    Ok(rx)
}
