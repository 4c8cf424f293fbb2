//! catflow CLI

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use cf_analysis::cutflow::{self, Cutflow, RenderOptions, TableFormat};
use cf_analysis::workspace::DEFAULT_POI;
use cf_analysis::{AnalysisConfig, EventFile, MassRegions, Region, Sample, SampleKind, Workspace, hadhad};
use cf_core::Year;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catflow")]
#[command(about = "catflow - event categories and binned channels for collider analyses")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the analysis categories
    Categories {
        /// Only this registry group (mva, controls, cuts)
        #[arg(long)]
        group: Option<String>,

        /// Also print the complete selection for this year
        #[arg(long)]
        year: Option<Year>,

        /// JSON output
        #[arg(long)]
        json: bool,
    },

    /// Print the mass-region selections
    Regions {
        /// Lower signal-region boundary (GeV)
        #[arg(long, default_value = "110")]
        low: f64,

        /// Upper boundary (GeV)
        #[arg(long, default_value = "180")]
        high: f64,

        /// Count events above `high` as control region
        #[arg(long)]
        high_sideband: bool,
    },

    /// Cumulative yields through the selection of one category
    Cutflow {
        /// JSON event file
        #[arg(long)]
        events: PathBuf,

        /// Category name
        #[arg(long)]
        category: String,

        /// Data-taking year
        #[arg(long)]
        year: Year,

        /// Charge/track region applied last
        #[arg(long, default_value = "OS")]
        region: Region,

        /// Table format (text, latex)
        #[arg(long, default_value = "text")]
        format: TableFormat,

        /// Decimal places
        #[arg(long, default_value = "2")]
        precision: usize,

        /// Show statistical errors
        #[arg(long)]
        errors: bool,

        /// Wrap the text table in a reStructuredText table directive
        #[arg(long)]
        rst: bool,

        /// Class of the reStructuredText table
        #[arg(long, default_value = "cutflow")]
        rst_class: String,
    },

    /// Build the channels of an analysis configuration and export a workspace
    Channels {
        /// Analysis configuration (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output workspace (pyhf JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Categories { group, year, json } => cmd_categories(group.as_deref(), year, json),
        Commands::Regions { low, high, high_sideband } => cmd_regions(low, high, high_sideband),
        Commands::Cutflow { events, category, year, region, format, precision, errors, rst, rst_class } => {
            let options = RenderOptions { format, precision, errors, rst_class: rst.then_some(rst_class) };
            cmd_cutflow(&events, &category, year, region, &options)
        }
        Commands::Channels { config, output } => cmd_channels(&config, output.as_ref()),
    }
}

fn cmd_categories(group: Option<&str>, year: Option<Year>, json: bool) -> Result<()> {
    let registry = hadhad::registry()?;
    let groups: Vec<&str> = match group {
        Some(g) => vec![g],
        None => registry.group_names().collect(),
    };

    let mut rows = Vec::new();
    for g in groups {
        for c in registry.group(g)? {
            let selection = match year {
                Some(y) => Some(c.selection(y, c.target_region)?.to_string()),
                None => None,
            };
            rows.push((g, c, selection));
        }
    }

    if json {
        let value: Vec<serde_json::Value> = rows
            .iter()
            .map(|(g, c, selection)| {
                serde_json::json!({
                    "group": g,
                    "name": c.name,
                    "label": c.label,
                    "features": c.features,
                    "fit_bins": c.fit_bins,
                    "limit_bins": c.limit_bins,
                    "norm_category": registry.norm_category_of(c).map(|n| n.name.clone()).ok(),
                    "selection": selection,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (g, c, selection) in rows {
        println!("{g:<10} {:<28} {}", c.name, c.label);
        if let Some(s) = selection {
            println!("    {s}");
        }
    }
    Ok(())
}

fn cmd_regions(low: f64, high: f64, high_sideband: bool) -> Result<()> {
    let regions = MassRegions::new(low, high, high_sideband)?;
    println!("control: {}", regions.control_region());
    println!("signal:  {}", regions.signal_region());
    println!("train:   {}", regions.train_region());
    Ok(())
}

fn cmd_cutflow(events: &Path, category: &str, year: Year, region: Region, options: &RenderOptions) -> Result<()> {
    let registry = hadhad::registry()?;
    let category = registry.get(category)?;
    let events = EventFile::from_path(events).with_context(|| format!("failed to read {}", events.display()))?;

    let mut samples: Vec<Arc<dyn Sample>> = vec![Arc::new(events.data.table_sample(SampleKind::Data, year)?)];
    for b in &events.backgrounds {
        samples.push(Arc::new(b.table_sample(b.kind, year)?));
    }
    for s in &events.signals {
        samples.push(Arc::new(s.sample.table_sample(SampleKind::Signal, year)?));
    }

    let steps = cutflow::category_steps(category, year, region)?;
    let flow = Cutflow::compute(&samples, &steps)?;
    print!("{}", flow.render(options));
    Ok(())
}

fn cmd_channels(config_path: &Path, output: Option<&PathBuf>) -> Result<()> {
    let config = AnalysisConfig::from_path(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let events_path = config.events_path(base_dir);
    let events =
        EventFile::from_path(&events_path).with_context(|| format!("failed to read {}", events_path.display()))?;

    let analysis = config.analysis(&events)?;
    let mut channels = Vec::new();
    let mut failed = Vec::new();
    for (category, built) in config.build_channels(&analysis)? {
        match built {
            Ok(c) => {
                tracing::info!(category = %category, channels = c.len(), "category built");
                channels.extend(c);
            }
            Err(e) => {
                tracing::error!(category = %category, error = %e, "category failed");
                failed.push(category);
            }
        }
    }
    if channels.is_empty() {
        anyhow::bail!("no channel was built (failed categories: {})", failed.join(", "));
    }
    if !failed.is_empty() {
        tracing::warn!("skipped categories: {}", failed.join(", "));
    }

    let ws = Workspace::from_channels(&channels, DEFAULT_POI);
    let json = serde_json::to_string_pretty(&ws)?;
    match output {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
