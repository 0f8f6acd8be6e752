use anyhow::{Context, Result};

use agri_atlas::config::{DashboardConfig, ServerConfig};
use agri_atlas::query::Dashboard;
use agri_atlas::server;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let dashboard_config = DashboardConfig::from_env();
    let server_config = ServerConfig::from_env()?;
    let addr = server_config.socket_addr()?;

    log::info!(
        "serving {} (reference year {}, {} countries)",
        dashboard_config.data_path.display(),
        dashboard_config.reference_year,
        dashboard_config.countries.len()
    );

    let app = server::router(Dashboard::new(dashboard_config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log::info!("listening on http://{addr}");

    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
