use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use enforcement_builder::app::ports::DatasetSource;
use enforcement_builder::common::constants::{DEFAULT_MAX_ROWS, MAX_WINDOW_DAYS};
use enforcement_builder::config::Config;
use enforcement_builder::infra::{HubRowsClient, JsonlSource};
use enforcement_builder::logging;
use enforcement_builder::pipeline::banding::Banding;
use enforcement_builder::pipeline::normalize::registry::MapperRegistry;
use enforcement_builder::pipeline::output::{write_rows, OutputFormat};
use enforcement_builder::pipeline::summary::RunSummary;
use enforcement_builder::pipeline::{Pipeline, RowCaps};

#[derive(Parser)]
#[command(name = "enforcement_builder")]
#[command(about = "Build a unified enforcement-event dataset from public moderation corpora")]
#[command(version = "0.1.0")]
struct Cli {
    /// Output file
    #[arg(long)]
    out: PathBuf,

    /// Max rows from HateXplain
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    max_hx: usize,

    /// Max rows from HatEval
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    max_he: usize,

    /// Max rows from HH-RLHF (harmless-base)
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    max_hh: usize,

    /// Max rows from RealToxicityPrompts
    #[arg(long, default_value_t = DEFAULT_MAX_ROWS)]
    max_rtp: usize,

    /// Load HatEval from the open Spanish superset instead of the gated release
    #[arg(long)]
    he_fallback: bool,

    /// Block threshold [default: 0.85]
    #[arg(long)]
    bands_high: Option<f64>,

    /// Suggest threshold [default: 0.60]
    #[arg(long)]
    bands_medium: Option<f64>,

    /// Timestamp window in days [default: 7]
    #[arg(long, value_parser = clap::value_parser!(u32).range(..=MAX_WINDOW_DAYS as i64))]
    window_days: Option<u32>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,

    /// Also write run KPIs as JSON to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Read datasets from a local JSONL mirror instead of the hub
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn create_source(config: &Config) -> Result<Box<dyn DatasetSource>> {
    if let Some(dir) = &config.source.data_dir {
        info!(data_dir = %dir.display(), "Using local JSONL mirror");
        return Ok(Box::new(JsonlSource::new(dir)));
    }
    let token = std::env::var("HF_TOKEN").ok();
    let client = HubRowsClient::new(
        &config.source.base_url,
        &config.source.hub_url,
        Duration::from_secs(config.source.timeout_seconds),
        token,
    )
    .context("Failed to build dataset hub client")?;
    info!(base_url = %config.source.base_url, "Using dataset hub");
    Ok(Box::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();
    let cli = Cli::parse();

    let mut config = Config::load_optional(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.source.data_dir = Some(dir);
    }
    if let Some(high) = cli.bands_high {
        config.run.bands_high = high;
    }
    if let Some(medium) = cli.bands_medium {
        config.run.bands_medium = medium;
    }
    if let Some(days) = cli.window_days {
        config.run.window_days = days;
    }
    config.validate().context("Invalid configuration")?;

    let bands = Banding::new(config.run.bands_high, config.run.bands_medium);
    if !bands.is_well_ordered() {
        warn!(
            high = bands.high,
            medium = bands.medium,
            "Bands are not ordered within [0, 1]; some decisions may never occur"
        );
    }

    let source = create_source(&config)?;
    let pipeline = Pipeline::new(MapperRegistry::standard(cli.he_fallback))
        .with_caps(RowCaps {
            hatexplain: cli.max_hx,
            hateval: cli.max_he,
            hh_rlhf: cli.max_hh,
            real_toxicity: cli.max_rtp,
        })
        .with_bands(bands)
        .with_window_days(config.run.window_days)
        .with_page_size(config.source.page_size);

    println!("🚀 Building enforcement dataset...");
    let result = pipeline
        .run(source.as_ref())
        .await
        .context("Dataset build failed")?;

    let report = write_rows(&result.rows, &cli.out, cli.format)
        .with_context(|| format!("Failed to write output to {}", cli.out.display()))?;
    println!("✅ Wrote {} rows to {}", report.rows, report.path.display());

    let summary = RunSummary::from_rows(&result.rows).with_output_digest(report.sha256);
    info!(
        total = summary.total,
        block_rate = summary.block_rate,
        over_refusal_rate = summary.over_refusal_rate,
        p95_latency_ms = summary.p95_latency_ms,
        duration_secs = result.duration_secs,
        "Run summary"
    );
    summary.print();
    if let Some(path) = &cli.summary {
        summary
            .write_json(path)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
        println!("📝 Summary written to {}", path.display());
    }

    Ok(())
}
