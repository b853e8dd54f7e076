//! TypeMotion CLI: typographic reveal videos from the command line
//!
//! ## Usage
//!
//! ```bash
//! typemotion generate AURORA --preset cosmic -e gif   # Generate and export
//! typemotion suggest OCEAN                            # Ask for a style
//! typemotion gif clip.mp4 --width 320                 # Convert a local video
//! typemotion presets --category "Surreal & Abstract"  # Browse presets
//! ```

use clap::Parser;
use std::process::ExitCode;
use typemotion_cli::{handlers, logging, Cli, CliConfig, CliResult, Commands, Verbosity};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    logging::init(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Generate(args) => {
            runtime.block_on(handlers::execute_generate(&config, &args))
        }
        Commands::Suggest(args) => runtime.block_on(handlers::execute_suggest(&config, &args)),
        Commands::Gif(args) => runtime.block_on(handlers::execute_gif(&config, &args)),
        Commands::Webm(args) => runtime.block_on(handlers::execute_webm(&config, &args)),
        Commands::Presets(args) => handlers::execute_presets(&args),
        Commands::Config => handlers::execute_config(&config),
    }
}

fn build_config(cli: &Cli) -> CliResult<CliConfig> {
    let config = CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_json(cli.log_json);

    match &cli.config {
        Some(path) => config.with_config_file(path),
        None => Ok(config),
    }
}
