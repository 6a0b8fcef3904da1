use log::info;

use crate::cli::{Cli, Commands};
use crate::config::{load_config, validate_config, AppConfig};
use crate::engine::{AggregationEngine, EngineSettings, RunSummary, Universe};
use crate::error::{AppError, Result};
use crate::fetch::{BatchPlanner, HttpQuoteSource};
use crate::records::{load_symbols, ReportWriter};
use crate::utils::{current_human_timestamp, format_elapsed};

/// Entry point used by `main` once logging is set up.
pub async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    match cli.command() {
        Commands::Rank => rank(&cli, &config).await.map(|_| ()),
        Commands::Plan => plan(&cli, &config),
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::builtin(),
    };
    config.apply_overrides(&cli.overrides());
    validate_config(&config)?;
    Ok(config)
}

fn load_universe(cli: &Cli) -> Result<Universe> {
    let symbols = load_symbols(&cli.symbols)?;
    let universe = Universe::from_symbols(symbols);
    info!(
        "Loaded {} symbols from {}",
        universe.len(),
        cli.symbols.display()
    );
    Ok(universe)
}

async fn rank(cli: &Cli, config: &AppConfig) -> Result<RunSummary> {
    info!("Start ranking daily returns at {}", current_human_timestamp());

    let universe = load_universe(cli)?;
    let batches = BatchPlanner::new(config.batch.size).plan(&universe, &config.provider.request)?;
    let source = HttpQuoteSource::new(config.provider.response.clone(), config.timeouts.request)?;

    let mut engine = AggregationEngine::new(
        universe,
        batches,
        source,
        EngineSettings::from_config(config),
    )?;
    let mut writer = ReportWriter::from_config(&config.report);

    let summary = engine
        .run(&mut writer)
        .await?
        .ok_or_else(|| AppError::message("ranking engine was already triggered"))?;

    info!(
        "Report with {} lines written to {} ({} records merged, {} skipped, fetched in {})",
        summary.reported,
        writer.path().display(),
        summary.join.merged.applied,
        summary.join.merged.skipped,
        format_elapsed(summary.join.elapsed)
    );

    Ok(summary)
}

fn plan(cli: &Cli, config: &AppConfig) -> Result<()> {
    let universe = load_universe(cli)?;
    let batches = BatchPlanner::new(config.batch.size).plan(&universe, &config.provider.request)?;

    println!(
        "{} symbols in {} groups of up to {} ({} in flight)",
        universe.len(),
        batches.len(),
        config.batch.size,
        config.batch.concurrency
    );
    for batch in &batches {
        println!(
            "group {:>4}  symbols {:>4}  {}",
            batch.group_index,
            batch.len(),
            batch.request.url
        );
    }

    Ok(())
}
