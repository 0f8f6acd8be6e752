use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn the source file into an [`IndicatorTable`](crate::data::model::IndicatorTable).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("data file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("unsupported file extension: .{extension}")]
    UnsupportedFormat { extension: String },

    /// Unreadable or malformed content. `source` carries the row/column context.
    #[error("failed to load {}: {source:#}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

/// Everything a dashboard query can fail with. Both variants are terminal
/// for the request that triggered them.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(
        "insufficient data for a 2D projection: {countries} countries and {indicators} indicators (need at least 2 of each)"
    )]
    InsufficientData { countries: usize, indicators: usize },
}
