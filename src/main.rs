//! rediscope HTTP server
//!
//! Loads configuration, starts the background scrape loop, and serves the
//! exported metrics over HTTP.

use clap::Parser;
use rediscope::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    metrics::Metrics,
    scraper::{RedisScraper, schedule},
    telemetry,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Wrote template configuration to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting rediscope on {}:{}, scraping {}",
        config.server.host,
        config.server.port,
        config.redis.endpoint
    );

    let metrics = Metrics::new()?;
    let scraper = RedisScraper::from_config(&config)?;

    tokio::spawn(schedule::run_scrape_loop(
        scraper,
        metrics.clone(),
        Duration::from_secs(config.scrape.collection_interval_seconds()),
        Duration::from_secs(config.scrape.timeout_seconds()),
    ));

    // Create socket address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    let state = AppState::new(Arc::new(metrics));
    let app = handlers::router(state);

    tracing::info!("Listening on {}", addr);
    tracing::info!("Metrics available at http://{}/metrics", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
