use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use county_population_join::config::AppConfig;
use county_population_join::pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Attach populations to the boundaries and write GeoJSON
    Join {
        #[command(flatten)]
        input: InputArgs,

        /// Destination GeoJSON file
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Property name for the attached population
        #[arg(long, value_name = "NAME")]
        population_field: Option<String>,

        /// Indent the written document
        #[arg(long)]
        pretty: bool,
    },
    /// Report regions that have no population entry, without writing anything
    Check {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[derive(Args)]
struct InputArgs {
    /// TOML configuration; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Boundary dataset (.json, .geojson or .shp)
    #[arg(short, long, value_name = "FILE")]
    boundaries: Option<PathBuf>,

    /// Population table (.json object or .csv)
    #[arg(short, long, value_name = "FILE")]
    populations: Option<PathBuf>,

    /// Property or column holding the region identifier
    #[arg(long, value_name = "NAME")]
    id_field: Option<String>,
}

impl InputArgs {
    fn resolve(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::load_or_default(self.config.as_deref())?;
        if let Some(b) = &self.boundaries {
            config.input.boundaries = b.clone();
        }
        if let Some(p) = &self.populations {
            config.input.populations = p.clone();
        }
        if let Some(f) = &self.id_field {
            config.input.id_field = f.clone();
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Join {
            input,
            output,
            population_field,
            pretty,
        } => {
            let mut app_config = input.resolve()?;
            if let Some(o) = output {
                app_config.output.path = o.clone();
            }
            if let Some(f) = population_field {
                app_config.output.population_field = f.clone();
            }
            app_config.output.pretty |= *pretty;

            println!(
                "Joining {:?} with {:?}",
                app_config.input.boundaries, app_config.input.populations
            );
            let summary = pipeline::run(&app_config)
                .with_context(|| format!("Failed to produce {:?}", app_config.output.path))?;

            println!(
                "Wrote {} regions (total population {}) to {:?}",
                summary.regions, summary.total_population, app_config.output.path
            );
            if let Some(b) = summary.bounds {
                println!(
                    "Bounds: ({}, {}) - ({}, {})",
                    b.min().x,
                    b.min().y,
                    b.max().x,
                    b.max().y
                );
            }
        }
        Commands::Check { input } => {
            let app_config = input.resolve()?;
            let missing = pipeline::check(&app_config).context("Failed to load inputs")?;

            if !missing.is_empty() {
                for id in &missing {
                    println!("missing population for region '{}'", id);
                }
                bail!("{} region(s) have no population entry", missing.len());
            }
            println!("Every region has a population entry.");
        }
    }

    Ok(())
}
