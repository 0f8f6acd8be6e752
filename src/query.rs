use std::time::Instant;

use crate::analysis::pca::{ProjectionMap, project_2d};
use crate::assemble::{DashboardPayload, assemble};
use crate::config::DashboardConfig;
use crate::data::filter::CountryAllowList;
use crate::data::loader::load_file;
use crate::error::DashboardError;

// ---------------------------------------------------------------------------
// Query surface
// ---------------------------------------------------------------------------

/// Read-only queries over the indicator table. Every call reloads the source
/// file, so answers always reflect what is on disk.
#[derive(Debug, Clone)]
pub struct Dashboard {
    config: DashboardConfig,
    allow_list: CountryAllowList,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        let allow_list = CountryAllowList::new(config.countries.iter().cloned());
        Self { config, allow_list }
    }

    /// Indicators, current-year values, time series and projection.
    pub fn full_payload(&self) -> Result<DashboardPayload, DashboardError> {
        let started = Instant::now();
        let table = load_file(&self.config.data_path)?;
        let payload = assemble(&table, &self.allow_list, self.config.reference_year)?;
        log::debug!(
            "full payload: {} countries in {:?}",
            payload.time_series.len(),
            started.elapsed()
        );
        Ok(payload)
    }

    /// Only the reference-year projection.
    pub fn projection_only(&self) -> Result<ProjectionMap, DashboardError> {
        let started = Instant::now();
        let table = load_file(&self.config.data_path)?;
        let projection = project_2d(
            &table,
            &table.indicators(),
            &self.allow_list,
            self.config.reference_year,
        )?;
        log::debug!(
            "projection: {} points in {:?}",
            projection.points.len(),
            started.elapsed()
        );
        Ok(projection.points)
    }
}
