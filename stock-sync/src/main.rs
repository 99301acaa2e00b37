//! stock-sync - keeps Dynamics 365 products in step with the stock database
//!
//! - `sync` runs a single reconciliation pass
//! - `daemon` runs passes on the configured cron schedule
//! - `product` and `categories` inspect what the CRM currently holds

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use stock_sync::api::DynamicsClient;
use stock_sync::api::constants::entity_sets;
use stock_sync::api::query::fetchxml;
use stock_sync::config::Config;
use stock_sync::entities::{ItemCategory, Product};
use stock_sync::scheduler::SyncScheduler;
use stock_sync::source::SqliteStockItemRepository;
use stock_sync::sync::{PassReport, StockSync};

#[derive(Parser)]
#[command(name = "stock-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/stock-sync/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass and exit
    Sync,

    /// Run sync passes on the configured cron schedule
    Daemon,

    /// Show the CRM product for a stock code
    Product {
        /// Stock code (product number)
        code: String,
    },

    /// List item categories
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let client = DynamicsClient::from_options(&config.crm)?;
    log::debug!("Using Web API at {}", client.base_url());

    match cli.command {
        Commands::Sync => {
            let sync = build_sync(&config, client).await?;
            let report = sync.run_pass().await;
            check_report(&report)
        }
        Commands::Daemon => {
            let scheduler = SyncScheduler::new(&config.cron_expression)?;
            let sync = build_sync(&config, client).await?;
            log::info!("Running on schedule '{}'", scheduler.expression());

            let sync = &sync;
            scheduler
                .run(
                    move || async move {
                        sync.run_pass().await;
                    },
                    async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            log::error!("Failed to listen for shutdown signal: {}", e);
                            std::future::pending::<()>().await;
                        }
                    },
                )
                .await;
            Ok(())
        }
        Commands::Product { code } => {
            let query = fetchxml::product_with_category_by_number(&code, &[]);
            match client
                .get_by_fetchxml::<Product>(entity_sets::PRODUCTS, &query)
                .await?
            {
                Some(product) => {
                    println!("{}", serde_json::to_string_pretty(&product)?);
                    if let Some(category) = &product.category_code {
                        println!("category: {}", category);
                    }
                }
                None => println!("No product with number '{}'", code),
            }
            Ok(())
        }
        Commands::Categories => {
            let query = fetchxml::item_categories(&[]);
            let categories = client
                .get_all_by_fetchxml::<ItemCategory>(entity_sets::ITEM_CATEGORIES, &query)
                .await?;
            println!("{}", serde_json::to_string_pretty(&categories)?);
            log::info!("{} item categories", categories.len());
            Ok(())
        }
    }
}

async fn build_sync(
    config: &Config,
    client: DynamicsClient,
) -> Result<StockSync<SqliteStockItemRepository>> {
    let source = SqliteStockItemRepository::connect(&config.connection_string)
        .await
        .context("Failed to connect to the stock database")?;
    Ok(StockSync::new(source, client, config.sales.clone()))
}

fn check_report(report: &PassReport) -> Result<()> {
    if let Some(error) = &report.source_error {
        anyhow::bail!("Stock items could not be read: {}", error);
    }
    if report.failed() > 0 {
        let codes: Vec<&str> = report.failures().map(|o| o.stock_code()).collect();
        anyhow::bail!("{} stock items failed to sync: {}", codes.len(), codes.join(", "));
    }
    Ok(())
}
