pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use ard_core::error::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env("ARDCHECK_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    match cli.command {
        Commands::Validate {
            dir,
            csv,
            xsd,
            out,
            verbose,
            tolerance,
        } => handlers::handle_validate(dir, csv, xsd, out, verbose, tolerance),
        Commands::Extent { csv, region, h, v } => handlers::handle_extent(csv, region, h, v),
        Commands::Name { file_name } => handlers::handle_name(file_name),
        Commands::Digest { file, algo } => handlers::handle_digest(file, algo),
    }
}
