//! Config command handler

use crate::config::CliConfig;
use crate::error::CliResult;

/// Print the effective configuration as YAML
pub fn execute_config(config: &CliConfig) -> CliResult<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
