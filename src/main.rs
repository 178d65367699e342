use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use virtual_grid::config::Config;
use virtual_grid::data::dataset::Dataset;
use virtual_grid::logging::{init_tracing, LogRingBuffer};
use virtual_grid::model::{ClientSize, GridModel, RenderSurface, ScrollOffset};
use virtual_grid::services::data_source::{DataSource, HttpDataSource, InMemoryDataSource};

mod table_display;

use table_display::TableSurface;

/// Load a dataset into a virtual grid and print the window visible at a
/// given scroll position.
#[derive(Parser, Debug)]
#[command(name = "vgrid", version, about)]
struct Cli {
    /// Serve rows from a local CSV file instead of the remote service
    #[arg(long, conflicts_with = "url")]
    csv: Option<PathBuf>,

    /// Base URL of the remote data service (defaults to the configured one)
    #[arg(long)]
    url: Option<String>,

    /// Dataset segment to load from the remote service
    #[arg(long, default_value = "population")]
    segment: String,

    #[arg(long, default_value_t = 0.0)]
    scroll_left: f64,

    #[arg(long, default_value_t = 0.0)]
    scroll_top: f64,

    /// Client area width in pixels
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Client area height in pixels
    #[arg(long, default_value_t = 400.0)]
    height: f64,

    /// Use this config file instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write a commented default config file and exit
    #[arg(long)]
    generate_config: bool,

    /// Log debug output to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Print the last N captured log lines before exiting
    #[arg(long, value_name = "N")]
    show_logs: Option<usize>,
}

fn print_recent_logs(buffer: &LogRingBuffer, count: usize) {
    let entries = buffer.get_recent(count);
    println!("--- last {} log line(s) ---", entries.len());
    for entry in entries {
        println!("{}", entry.format_for_display());
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path),
        None => Ok(Config::load().unwrap_or_else(|e| {
            eprintln!("Using default configuration: {:#}", e);
            Config::default()
        })),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        let path = match &cli.config {
            Some(path) => path.clone(),
            None => Config::get_config_path()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Config::create_default_with_comments())?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = load_config(&cli)?;
    if cli.verbose {
        config.logging.log_to_stderr = true;
        config.logging.level = "debug".to_string();
    }
    let log_buffer = init_tracing(&config.logging)?;

    let (segment, source): (String, Arc<dyn DataSource>) = match &cli.csv {
        Some(path) => {
            let segment = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("data")
                .to_lowercase();
            let dataset = Dataset::from_csv_path(path, &config.layout)?;
            let source = InMemoryDataSource::new().with_dataset(segment.clone(), dataset);
            (segment, Arc::new(source))
        }
        None => {
            let base_url = cli.url.as_deref().unwrap_or(&config.loader.base_url);
            (cli.segment.clone(), Arc::new(HttpDataSource::new(base_url)))
        }
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;

    let mut model = GridModel::new(segment.clone());
    model.on_refresh(|reason| debug!("refresh: {:?}", reason));
    model.start_loading(runtime.handle(), source, &config.loader);

    if let Err(err) = runtime.block_on(model.wait_until_loaded()) {
        if let Some(count) = cli.show_logs {
            print_recent_logs(&log_buffer, count);
        }
        return Err(err).with_context(|| format!("Failed to load segment '{}'", segment));
    }

    let scroll = ScrollOffset::new(cli.scroll_left, cli.scroll_top);
    let client = ClientSize::new(cli.width, cli.height);
    let mut surface = TableSurface::new(None);

    match model.refresh_viewport(scroll, client) {
        Some(viewport) => surface.render(&model.frame(&viewport)),
        None => {
            warn!("Nothing visible at scroll ({}, {})", scroll.left, scroll.top);
            println!(
                "Nothing to display: {} columns x {} rows, content {:.0}x{:.0}px",
                model.columns().len(),
                model.rows().len(),
                model.content_size().width,
                model.content_size().height
            );
        }
    }

    debug!("Rendered {} frame(s)", surface.frames_rendered());
    model.terminate();

    if let Some(count) = cli.show_logs {
        print_recent_logs(&log_buffer, count);
    }
    Ok(())
}
