//! Once command: a single refresh cycle, printed to stdout.

use std::io::Write;
use std::sync::Arc;

use calmerge_feeds::{FeedFetcher, HttpFetcher};
use calmerge_server::{Aggregator, CycleOutcome, ServerConfig};

use crate::error::{CliError, CliResult};

/// Output rendering for [`run_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Ics,
    Json,
}

/// Fetches every feed once over HTTP and writes the merged calendar.
pub async fn run(config: ServerConfig, output: Output) -> CliResult<()> {
    let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
    run_with(config, fetcher, output, &mut std::io::stdout()).await
}

/// Runs one cycle with `fetcher` and writes the result to `out`.
///
/// Fails when every feed failed; partial failures are only logged.
pub async fn run_with<W: Write>(
    config: ServerConfig,
    fetcher: Arc<dyn FeedFetcher>,
    output: Output,
    out: &mut W,
) -> CliResult<()> {
    let aggregator = Aggregator::new(config, fetcher)?;

    if let CycleOutcome::SkippedOnTotalFailure = aggregator.run_once().await {
        let state = aggregator.state();
        let message = state
            .read()
            .await
            .last_error
            .clone()
            .unwrap_or_else(|| "no feed could be loaded".to_string());
        return Err(CliError::Refresh(message));
    }

    let snapshot = aggregator.store().read();
    let Some(entry) = snapshot.entry() else {
        return Err(CliError::Refresh("no calendar was produced".to_string()));
    };

    match output {
        Output::Ics => out.write_all(&entry.ics)?,
        Output::Json => {
            serde_json::to_writer_pretty(&mut *out, &entry.calendar).map_err(std::io::Error::from)?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}
