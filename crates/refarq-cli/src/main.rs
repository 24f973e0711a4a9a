//! refarq entry point

use anyhow::{Context, bail};
use clap::Parser;
use refarq_cli::{CliConfig, OutputFormat, render, run};
use std::path::PathBuf;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

/// Evaluate a graph-query algebra expression against an N-Quads dataset
#[derive(Debug, Parser)]
#[command(name = "refarq", version, about)]
struct Args {
    /// N-Triples or N-Quads file to load
    #[arg(short, long, env = "REFARQ_DATA")]
    data: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format (overrides the configuration file)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Log level when RUST_LOG is not set (overrides the configuration file)
    #[arg(long)]
    log_level: Option<String>,

    /// Maximum operator nesting depth (overrides the configuration file)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Refuse to call services
    #[arg(long)]
    no_services: bool,

    /// Algebra expression given inline
    #[arg(short = 'e', long = "expr", conflicts_with = "algebra_file")]
    expr: Option<String>,

    /// File containing the algebra expression
    algebra_file: Option<PathBuf>,
}

impl Args {
    fn resolve_config(&self) -> anyhow::Result<CliConfig> {
        let mut config = match &self.config {
            Some(path) => CliConfig::from_file(path)
                .with_context(|| format!("loading configuration {}", path.display()))?,
            None => CliConfig::default(),
        };
        if let Some(format) = self.format {
            config = config.format(format);
        }
        if let Some(level) = &self.log_level {
            config = config.log_level(level);
        }
        if let Some(depth) = self.max_depth {
            config.engine = config.engine.max_depth(depth);
        }
        if self.no_services {
            config.engine = config.engine.disable_services();
        }
        Ok(config)
    }

    fn algebra(&self) -> anyhow::Result<String> {
        match (&self.expr, &self.algebra_file) {
            (Some(expr), _) => Ok(expr.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("reading algebra file {}", path.display())),
            (None, None) => bail!("no algebra given; pass a file or -e <expr>"),
        }
    }
}

fn main() {
    let args = Args::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("refarq: {:#}", e);
            std::process::exit(2);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!("Configuration: {:?}", config);

    if let Err(e) = execute(&args, &config) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn execute(args: &Args, config: &CliConfig) -> anyhow::Result<()> {
    let algebra = args.algebra()?;
    let result = run(config, args.data.as_deref(), &algebra)?;
    println!("{}", render(&result.table, config.format)?);
    Ok(())
}
