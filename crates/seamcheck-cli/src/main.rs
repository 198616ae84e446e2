use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use seamcheck_core::{combine_json, Schema};
use seamcheck_runtime::{write_atomic, JsonFileSource, Pipeline, RuntimeConfig};

mod cli;

use cli::{CheckArgs, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check(args) => check(args).await,
        Commands::Combine {
            global,
            props,
            output,
        } => combine(&global, &props, output.as_deref()).await,
        Commands::Schema { index } => print_schema(index),
    }
}

/// RUST_LOG wins; otherwise `-v` count picks the level. Logs go to stderr so
/// reports on stdout stay clean.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn standard_schema() -> Result<&'static Schema> {
    Schema::standard().context("Standard schema is invalid")
}

fn load_config(args: &CheckArgs) -> Result<RuntimeConfig> {
    let config = match &args.config {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RuntimeConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid environment override")?;

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(shards) = args.shards {
        config.shards = shards;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(output) = &args.output {
        config.output.report_path = Some(output.clone());
    }
    if let Some(evicted) = &args.evicted {
        config.output.evicted_path = Some(evicted.clone());
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn check(args: CheckArgs) -> Result<()> {
    let config = load_config(&args)?;
    let schema = Arc::new(standard_schema()?.clone());
    let pipeline = Pipeline::new(schema, config)?;

    let source = JsonFileSource::new(&args.input);
    let output = pipeline
        .run(&source)
        .await
        .with_context(|| format!("Failed to check {}", args.input.display()))?;

    if !output.rejected.is_empty() {
        tracing::warn!(rejected = output.rejected.len(), "Some predictions were not ingested");
    }

    pipeline
        .persist(&output.report)
        .await
        .context("Failed to write outputs")?;

    if pipeline.config().output.report_path.is_none() {
        print!("{}", output.report.render(pipeline.config().output.format)?);
    }
    Ok(())
}

async fn combine(global: &Path, props: &Path, output: Option<&Path>) -> Result<()> {
    let categories = tokio::fs::read_to_string(global)
        .await
        .with_context(|| format!("Failed to read {}", global.display()))?;
    let attributes = tokio::fs::read_to_string(props)
        .await
        .with_context(|| format!("Failed to read {}", props.display()))?;

    let batch = combine_json(standard_schema()?, &categories, &attributes)
        .context("Failed to combine classifier outputs")?;
    let json = batch.to_json()?;

    match output {
        Some(path) => write_atomic(path, &json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}

fn print_schema(index: bool) -> Result<()> {
    let schema = standard_schema()?;

    if index {
        println!("{}", serde_json::to_string_pretty(&schema.property_index())?);
        return Ok(());
    }

    for category in schema.all_categories() {
        if let Some(formula) = schema.formula_for(category) {
            println!("{} := {}", category, formula);
        }
    }
    Ok(())
}
