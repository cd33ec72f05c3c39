//! LinkMe back-office CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration**: load `linkme-admin.toml`, apply environment
//!    overrides and validate it before anything starts.
//! 2. **Wire observability**: see [`telemetry`].
//! 3. **Construct infrastructure**: the Postgres or in-memory
//!    [`orders::OrderRepository`], the mail or log [`orders::Notifier`], and
//!    the system clock, injected into [`workflow::ApprovalService`].
//! 4. **Run a command**: `serve` the HTTP API, `migrate` the schema, `quote`
//!    a pricing file, or `orders list` from the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use api::AppState;
use clap::{Parser, Subcommand};
use mailer::{LogNotifier, MailClient};
use orders::{
    ApprovalStatus, ChannelKind, Notifier, OrderFilter, OrderRepository, SystemClock,
};
use store::{MemoryOrderRepository, PgOrderRepository};
use tracing::{info, warn};
use workflow::{ApprovalService, QuoteRequest};

mod config;
mod telemetry;

use config::AppConfig;
use telemetry::LogFormat;

const DEFAULT_CONFIG: &str = "linkme-admin.toml";

#[derive(Debug, Parser)]
#[command(name = "linkme-admin", version, about = "LinkMe order approval back-office")]
struct Cli {
    /// Config file. Defaults to ./linkme-admin.toml when present.
    #[arg(long, global = true, env = "LINKME_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve,
    /// Apply pending database migrations.
    Migrate,
    /// Price the lines of a JSON quote request without creating an order.
    Quote {
        #[arg(long)]
        file: PathBuf,
    },
    /// Inspect stored orders.
    #[command(subcommand)]
    Orders(OrdersCommand),
}

#[derive(Debug, Subcommand)]
enum OrdersCommand {
    /// List orders, newest first.
    List {
        #[arg(long)]
        status: Option<ApprovalStatus>,
        #[arg(long)]
        channel: Option<ChannelKind>,
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG), false),
    };
    let config = AppConfig::load(&path, required)?;
    let _telemetry = telemetry::init(cli.log_format, &config.telemetry)?;

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Migrate => migrate(&config).await,
        Command::Quote { file } => quote(&config, &file),
        Command::Orders(OrdersCommand::List {
            status,
            channel,
            limit,
        }) => {
            list_orders(
                &config,
                OrderFilter {
                    status,
                    channel,
                    limit,
                },
            )
            .await
        }
    }
}

async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let admin_token = config.admin_token()?.to_string();
    let addr = config.bind_addr()?;

    let repository: Arc<dyn OrderRepository> = match &config.database.url {
        Some(url) => {
            let repo = PgOrderRepository::connect(url, config.database.max_connections)
                .await
                .context("connecting to postgres")?;
            if config.database.migrate_on_start {
                let applied = repo.migrate().await?;
                info!(?applied, "migrations applied");
            }
            Arc::new(repo)
        }
        None => {
            warn!("no database.url configured; orders are kept in memory");
            Arc::new(MemoryOrderRepository::new())
        }
    };

    let notifier: Arc<dyn Notifier> = if config.mail.enabled {
        Arc::new(MailClient::new(config.mail_settings()?)?)
    } else {
        info!("mail disabled; notifications are logged only");
        Arc::new(LogNotifier)
    };

    let service = ApprovalService::new(
        repository,
        notifier,
        Arc::new(SystemClock),
        config.workflow_settings()?,
    );
    let app = api::build_router(AppState::new(service, admin_token));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "linkme-admin listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("linkme-admin stopped");
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let repo = PgOrderRepository::connect(config.database_url()?, config.database.max_connections)
        .await
        .context("connecting to postgres")?;
    let applied = repo.migrate().await?;
    if applied.is_empty() {
        println!("schema is up to date");
    } else {
        println!("applied migrations: {}", applied.join(", "));
    }
    Ok(())
}

fn quote(config: &AppConfig, file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let request: QuoteRequest = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", file.display()))?;

    let service = ApprovalService::new(
        Arc::new(MemoryOrderRepository::new()),
        Arc::new(LogNotifier),
        Arc::new(SystemClock),
        config.workflow_settings()?,
    );
    let quote = service.quote(&request)?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

async fn list_orders(config: &AppConfig, filter: OrderFilter) -> anyhow::Result<()> {
    let repo = PgOrderRepository::connect(config.database_url()?, config.database.max_connections)
        .await
        .context("connecting to postgres")?;
    let orders = repo.list(&filter).await?;

    println!(
        "{:<20} {:<26} {:<18} {:>12}  {}",
        "REFERENCE", "STATUS", "CHANNEL", "TOTAL TTC", "CREATED"
    );
    for order in &orders {
        let channel = order
            .channel()
            .map(|c| c.kind().as_str())
            .unwrap_or("conflict");
        let total = order
            .totals()
            .map(|t| t.total_ttc.to_string())
            .unwrap_or_else(|_| "n/a".to_string());
        println!(
            "{:<20} {:<26} {:<18} {:>12}  {}",
            order.reference.as_str(),
            order.status.as_str(),
            channel,
            total,
            order.created_at.as_datetime().format("%Y-%m-%d %H:%M")
        );
    }
    println!("{} order(s)", orders.len());
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
