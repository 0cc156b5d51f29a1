//! REST API server example
//!
//! Runs media-dl with the REST API enabled and shuts down cleanly on
//! Ctrl+C or SIGTERM.
//!
//! After starting, you can:
//! - Submit a job via POST http://localhost:6790/jobs
//! - Watch jobs via GET http://localhost:6790/jobs
//! - Fetch finished files from http://localhost:6790/files/<filename>

use media_dl::config::{ApiConfig, Config, DownloadConfig, ServerIntegrationConfig};
use media_dl::{MediaDownloader, run_with_shutdown};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let bind_address: SocketAddr = "127.0.0.1:6790".parse()?;

    let config = Config {
        download: DownloadConfig {
            output_dir: "downloads".into(),
            max_concurrent_jobs: 2,
            ..Default::default()
        },
        server: ServerIntegrationConfig {
            api: ApiConfig {
                bind_address,
                ..Default::default()
            },
        },
        ..Default::default()
    };

    let downloader = Arc::new(MediaDownloader::new(config).await?);
    let api_handle = downloader.spawn_api_server();

    println!("media-dl REST API listening on http://{}", bind_address);
    println!();
    println!("Example commands:");
    println!("  # Submit an audio download");
    println!("  curl -X POST http://{}/jobs \\", bind_address);
    println!("    -H 'Content-Type: application/json' \\");
    println!(
        "    -d '{{\"url\": \"https://www.youtube.com/watch?v=dQw4w9WgXcQ\", \"format\": \"audio\"}}'"
    );
    println!();
    println!("  # List recent jobs");
    println!("  curl http://{}/jobs?limit=10", bind_address);
    println!();
    println!("Press Ctrl+C to stop");

    run_with_shutdown((*downloader).clone()).await?;
    api_handle.abort();

    Ok(())
}
