use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Year used for map colouring and the projection snapshot.
pub const REFERENCE_YEAR: i32 = 2020;

/// Default location of the indicator table, relative to the working directory.
pub const DEFAULT_DATA_PATH: &str = "static/data/cleaned_filtered_agriRuralDevelopment.csv";

/// Countries the dashboard reports on.
pub const COUNTRIES: &[&str] = &[
    "Afghanistan",
    "Albania",
    "Algeria",
    "Angola",
    "Argentina",
    "Armenia",
    "Australia",
    "Austria",
    "Azerbaijan",
    "Brazil",
    "Bulgaria",
    "Cameroon",
    "Chile",
    "China",
    "Colombia",
    "Croatia",
    "Cuba",
    "Cyprus",
    "Czech Republic",
    "Ecuador",
    "Egypt, Arab Rep.",
    "Eritrea",
    "Ethiopia",
    "France",
    "Germany",
    "Ghana",
    "Greece",
    "India",
    "Indonesia",
    "Iran, Islamic Rep.",
    "Iraq",
    "Ireland",
    "Italy",
    "Japan",
    "Jordan",
    "Kazakhstan",
    "Kenya",
    "Lebanon",
    "Malta",
    "Mexico",
    "Morocco",
    "Pakistan",
    "Peru",
    "Philippines",
    "Russian Federation",
    "Syrian Arab Republic",
    "Tunisia",
    "Turkey",
    "Ukraine",
];

// ---------------------------------------------------------------------------
// Dashboard configuration
// ---------------------------------------------------------------------------

/// What the query surface reads and how it slices it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub reference_year: i32,
    pub countries: Vec<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            reference_year: REFERENCE_YEAR,
            countries: COUNTRIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl DashboardConfig {
    /// Defaults, with the data path taken from `AGRI_DATA_PATH` when set.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("AGRI_DATA_PATH").filter(|p| !p.trim().is_empty()) {
            config.data_path = PathBuf::from(path);
        }
        config
    }
}

// ---------------------------------------------------------------------------
// Server configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    /// Read `HOST` and `PORT`; an unparsable `PORT` is an error.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT '{port}'"))?;
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid HOST/PORT {}:{}", self.host, self.port))
    }
}
