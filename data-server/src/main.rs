use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use grid_data_server::{layout_from, router, AppState};
use virtual_grid::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);

    // Layout comes from the shared grid config when one exists
    let layout = layout_from(&Config::get_config_path()?)?;
    let state = AppState::load_dir(&data_dir, &layout)?;
    info!("Loaded segments: {:?}", state.segments());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Data server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;

    Ok(())
}
