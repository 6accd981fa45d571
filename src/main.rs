//! klinelab - kline feature pipeline
//!
//! Fetches candles from Binance, derives features and GARCH volatility, and
//! optionally saves the processed table and prints training-set statistics.
//!
//! # Usage
//! ```sh
//! cargo run -- process --symbols BTCUSDT,ETHUSDT --interval 1h --days 30 --save
//! cargo run -- coin bitcoin
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use klinelab::application::market_data::feature_engineering_service::FeatureDeriver;
use klinelab::application::ml::training_set::TrainingSetBuilder;
use klinelab::application::pipeline::{BatchInput, FeaturePipeline, PipelineReport};
use klinelab::application::volatility::estimator::VolatilityEstimator;
use klinelab::config::Config;
use klinelab::domain::ports::MarketDataSource;
use klinelab::infrastructure::{BinanceKlineSource, CoinGeckoClient, ProcessedDataStore};
use tracing::{Level, error, info, warn};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch klines and run the feature pipeline
    Process {
        /// Symbol(s) to process (comma separated)
        #[arg(short, long, default_value = "BTCUSDT")]
        symbols: String,

        /// Kline interval (e.g. 1m, 1h, 1d)
        #[arg(short, long, default_value = "1h")]
        interval: String,

        /// Lookback days
        #[arg(short, long, default_value_t = 30)]
        days: u32,

        /// Save each processed table as <SYMBOL>_<interval>.csv
        #[arg(long)]
        save: bool,

        /// Print labelled training-set statistics
        #[arg(long)]
        dataset: bool,
    },
    /// Fetch and clean coin metadata, printed as JSON
    Coin {
        /// CoinGecko coin id (e.g. bitcoin)
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(Level::INFO.as_str())),
        )
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    info!("klinelab {} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Process {
            symbols,
            interval,
            days,
            save,
            dataset,
        } => {
            let symbols: Vec<String> = symbols
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            process(&config, &symbols, &interval, days, save, dataset).await
        }
        Command::Coin { id } => coin(&config, &id).await,
    }
}

async fn process(
    config: &Config,
    symbols: &[String],
    interval: &str,
    days: u32,
    save: bool,
    dataset: bool,
) -> Result<()> {
    let store = ProcessedDataStore::new(&config.pipeline.processed_data_dir);
    let pipeline = FeaturePipeline::new(
        FeatureDeriver::default(),
        VolatilityEstimator::new(config.pipeline.volatility_config()),
        TrainingSetBuilder::new(config.pipeline.label_config()),
        Some(store),
    );
    let source = BinanceKlineSource::new(
        config.sources.binance.base_url.clone(),
        config.sources.binance.api_key.clone(),
        config.pipeline.http_timeout(),
    );

    let filename = |symbol: &str| format!("{}_{}.csv", symbol.replace('/', ""), interval);

    if let [symbol] = symbols {
        let save_as = save.then(|| filename(symbol));
        let report = pipeline
            .process_symbol(&source, symbol, interval, days, save_as.as_deref())
            .await
            .with_context(|| format!("Processing {} failed", symbol))?;
        summarize(&pipeline, symbol, &report, dataset);
        return Ok(());
    }

    let mut batches = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match source.fetch_klines(symbol, interval, days).await {
            Ok(klines) => batches.push(BatchInput {
                symbol: symbol.clone(),
                klines,
                save_as: save.then(|| filename(symbol)),
            }),
            Err(e) => error!("Error fetching data for {}: {:#}", symbol, e),
        }
    }

    for result in pipeline.run_batch(batches) {
        let Some(report) = result.report else {
            continue;
        };
        summarize(&pipeline, &result.symbol, &report, dataset);
    }
    Ok(())
}

fn summarize(pipeline: &FeaturePipeline, symbol: &str, report: &PipelineReport, dataset: bool) {
    info!(
        "{}: {} rows, {} columns, stage {}",
        symbol,
        report.table.len(),
        report.table.column_names().count(),
        report.stage
    );
    if let Some(warning) = &report.volatility_warning {
        warn!("{}: volatility unavailable ({})", symbol, warning);
    }
    if let Some(Err(e)) = &report.persisted {
        error!("{}: not saved ({})", symbol, e);
    }

    for (column, pct) in report.table.missing_percentages() {
        if pct > 0.0 {
            info!("{}: {} missing {:.2}%", symbol, column, pct);
        }
    }

    if dataset {
        match pipeline.prepare_training_data(report) {
            Ok(data) => info!(
                "{}: training set {} x {} ({:.1}% positive)",
                symbol,
                data.len(),
                data.feature_names().len(),
                data.positive_ratio() * 100.0
            ),
            Err(e) => warn!("{}: no training set ({})", symbol, e),
        }
    }
}

async fn coin(config: &Config, id: &str) -> Result<()> {
    let client = CoinGeckoClient::new(
        config.sources.coingecko.base_url.clone(),
        config.sources.coingecko.api_key.clone(),
        config.pipeline.http_timeout(),
    );
    let metrics = client.coin_metrics(id).await?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}
