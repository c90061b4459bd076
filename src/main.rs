//! dds140 - capture tool for DDS140 USB oscilloscopes
//!
//! Opens the scope, commits calibration and acquisition settings, and pulls
//! raw sample blocks off the device through the acquisition handshake in
//! `dds140-core`. The captured bytes are written out undecoded.

mod cli;
mod commands;
mod session;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::List { profile } => commands::run_list(&profile),
        Commands::Init { device } => commands::run_init(&device),
        Commands::Capture {
            device,
            output,
            blocks,
            size,
            flush,
        } => commands::run_capture(&device, &output, blocks, size, flush),
    }
}
