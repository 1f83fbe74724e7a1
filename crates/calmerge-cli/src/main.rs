//! calmerge CLI entry point.

use std::process::ExitCode;

use clap::Parser;

use calmerge_cli::cli::{Cli, Command, ConfigAction};
use calmerge_cli::commands;
use calmerge_cli::commands::once::Output;
use calmerge_cli::config::FileConfig;
use calmerge_cli::error::CliResult;
use calmerge_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let command = cli.command.clone().unwrap_or_default();

    if let Command::Config {
        action: ConfigAction::Path,
    } = command
    {
        return commands::config::path(cli.config.as_deref());
    }

    let (path, file) = FileConfig::load(cli.config.as_deref())?;
    init_tracing(tracing_config(&cli, &command, &file)?)?;

    match command {
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&path, &file),
            ConfigAction::Validate => commands::config::validate(&path, &file),
            ConfigAction::Path => commands::config::path(Some(path.as_path())),
        },
        Command::Once { json } => {
            let output = if json { Output::Json } else { Output::Ics };
            commands::once::run(file.to_server_config()?, output).await
        }
        Command::Serve { port, bind } => {
            tracing::info!(config = %path.display(), "Loaded configuration");
            commands::serve::run(file.to_server_config()?, port, bind).await
        }
    }
}

fn tracing_config(cli: &Cli, command: &Command, file: &FileConfig) -> CliResult<TracingConfig> {
    let mut config = if cli.debug {
        TracingConfig::cli_debug()
    } else if let Command::Serve { .. } = command {
        file.tracing_config(TracingConfig::daemon())?
    } else {
        file.tracing_config(TracingConfig::one_shot())?
    };
    if let Some(format) = cli.log_format {
        config = config.with_format(format);
    }
    Ok(config)
}
