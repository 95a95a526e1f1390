//! Joins per-region population counts onto boundary polygons and writes the
//! result as a GeoJSON FeatureCollection.
//!
//! The stages are usable on their own: [`data::load_boundaries`],
//! [`population::load_population_table`], [`join::join_population`] and
//! [`output::write_geojson`]. [`pipeline::run`] chains them.

pub mod config;
pub mod data;
pub mod error;
pub mod join;
pub mod output;
pub mod pipeline;
pub mod population;
pub mod types;

pub use crate::error::{JoinError, Result};
