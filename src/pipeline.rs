use crate::config::AppConfig;
use crate::data::load_boundaries;
use crate::error::Result;
use crate::join::{join_population, missing_identifiers, JoinSummary};
use crate::output::write_geojson;
use crate::population::load_population_table;
use tracing::info;

/// Load, join and write in one forward pass. Nothing is written unless
/// every region found its population.
pub fn run(config: &AppConfig) -> Result<JoinSummary> {
    // Boundaries first: a missing dataset fails before the table is touched
    let regions = load_boundaries(&config.input.boundaries, &config.input.id_field)?;
    let table = load_population_table(&config.input.populations, &config.input.population_columns)?;

    let index = join_population(regions, &table)?;
    write_geojson(&index, &config.output)?;

    let summary = JoinSummary::from_index(&index);
    info!(
        regions = summary.regions,
        total_population = summary.total_population,
        "join complete"
    );
    Ok(summary)
}

/// Loads both inputs and reports identifiers missing from the table.
pub fn check(config: &AppConfig) -> Result<Vec<String>> {
    let regions = load_boundaries(&config.input.boundaries, &config.input.id_field)?;
    let table = load_population_table(&config.input.populations, &config.input.population_columns)?;
    Ok(missing_identifiers(&regions, &table))
}
