//! Configuration commands.

use std::path::Path;

use calmerge_core::TracingConfig;

use crate::config::{FileConfig, locate, search_paths};
use crate::error::CliResult;

/// Dump the effective configuration, defaults included, to stdout.
pub fn dump(path: &Path, config: &FileConfig) -> CliResult<()> {
    let toml_str = config.to_toml()?;
    println!("# {}", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validate the configuration.
pub fn validate(path: &Path, config: &FileConfig) -> CliResult<()> {
    config.tracing_config(TracingConfig::one_shot())?;
    let server = config.to_server_config()?;
    println!(
        "{}: configuration is valid ({} feeds).",
        path.display(),
        server.sources.len()
    );
    Ok(())
}

/// Show which configuration file would be used.
pub fn path(explicit: Option<&Path>) -> CliResult<()> {
    match locate(explicit, &search_paths()) {
        Ok(path) => println!("config: {}", path.display()),
        Err(_) => {
            println!("config: none found, searched:");
            for candidate in search_paths() {
                println!("  {}", candidate.display());
            }
        }
    }
    Ok(())
}
