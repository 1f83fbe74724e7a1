//! Serve command: runs the aggregator in the foreground.

use std::net::IpAddr;
use std::sync::Arc;

use calmerge_feeds::HttpFetcher;
use calmerge_server::{Aggregator, ServerConfig, SignalHandler, bind};
use tracing::info;

use crate::error::CliResult;

/// Starts the server and blocks until SIGTERM or SIGINT.
///
/// SIGHUP triggers an immediate refresh of every feed.
pub async fn run(
    mut config: ServerConfig,
    port: Option<u16>,
    bind_addr: Option<IpAddr>,
) -> CliResult<()> {
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(addr) = bind_addr {
        config.bind = addr;
    }

    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    let addr = config.socket_addr();
    let aggregator = Aggregator::new(config, fetcher)?;
    for source in &aggregator.config().sources {
        info!(source = %source.id(), url = %source.url(), "Feed registered");
    }

    let listener = bind(addr).await?;

    let signal_handler = SignalHandler::new();
    signal_handler.spawn_listener();

    aggregator
        .serve(listener, signal_handler.shutdown(), signal_handler.reload())
        .await?;

    info!("Server stopped");
    Ok(())
}
