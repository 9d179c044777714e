//! pricedrop - watch tracked products and get notified when prices drop.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use pricedrop::config::{self, LoggingConfig};
use pricedrop::notify::format_price;
use pricedrop::{App, Config};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(version, about = "Watch tracked products and get notified when prices drop")]
struct Cli {
    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the background monitor (default)
    Run,
    /// Check every tracked product once, now
    Check,
    /// Register a product page for price tracking
    Track {
        /// Product page URL
        url: String,
        /// Alert when the price is at or below this value
        #[arg(long)]
        target_price: Option<Decimal>,
        /// Alert when the price drops by this percentage
        #[arg(long)]
        drop_percent: Option<Decimal>,
    },
    /// List tracked products
    List,
    /// Stop tracking a product
    Untrack {
        /// Product id issued by the API
        id: String,
    },
    /// Set the price-tracking API base URL
    SetApiUrl { url: String },
    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(logging: &LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = if logging.file {
        let dir = config::log_dir()?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        let appender = tracing_appender::rolling::daily(dir, "pricedrop.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(guard)
}

fn init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config::default_config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let written = Config::default().save(Some(path))?;
    println!("Wrote {}", written.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Command::Run);
    if let Command::InitConfig { force } = command {
        return init_config(cli.config, force);
    }

    // Load configuration
    let config = Config::load(cli.config).context("loading configuration")?;
    let _log_guard = init_logging(&config.logging)?;

    let mut app = App::new(config)?;

    match command {
        Command::Run => app.run().await?,
        Command::Check => {
            let report = app.check_now().await?;
            println!("{report}");
        }
        Command::Track {
            url,
            target_price,
            drop_percent,
        } => {
            let product = app.track(&url, target_price, drop_percent).await?;
            println!("Tracking {} ({}) as {}", product.domain, product.url, product.id);
        }
        Command::List => {
            let settings = app.settings().await?;
            println!("API: {}", settings.api_base_url);
            if settings.tracked_products.is_empty() {
                println!("No products tracked.");
            }
            for product in &settings.tracked_products {
                let mut conditions = Vec::new();
                if let Some(target) = product.target_price {
                    conditions.push(format!("target {}", format_price(target)));
                }
                if let Some(percent) = product.drop_percent {
                    conditions.push(format!("drop {percent}%"));
                }
                println!(
                    "{}  {}  {}  added {}{}",
                    product.id,
                    product.domain,
                    conditions.join(", "),
                    product.added_at.format("%Y-%m-%d"),
                    if product.muted { "  [muted]" } else { "" }
                );
            }
        }
        Command::Untrack { id } => {
            if app.untrack(&id).await? {
                println!("Stopped tracking {id}");
            } else {
                bail!("no tracked product with id {id}");
            }
        }
        Command::SetApiUrl { url } => {
            app.set_api_url(&url).await?;
            println!("API URL set to {}", url.trim().trim_end_matches('/'));
        }
        // Handled before the configuration is loaded.
        Command::InitConfig { .. } => {}
    }

    Ok(())
}
