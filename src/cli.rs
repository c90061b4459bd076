//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u16>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a byte count with an optional K/M suffix (binary units)
fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (num, mult) = if let Some(n) = s.strip_suffix(['K', 'k']) {
        (n, 1024)
    } else if let Some(n) = s.strip_suffix(['M', 'm']) {
        (n, 1024 * 1024)
    } else {
        (s, 1)
    };
    num.trim()
        .parse::<usize>()
        .map(|n| n * mult)
        .map_err(|e| format!("Invalid size: {}", e))
}

#[derive(Parser)]
#[command(name = "dds140")]
#[command(author, version, about = "DDS140 USB oscilloscope capture tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// USB ids of the device variant
#[derive(clap::Args, Debug, Clone)]
pub struct ProfileArgs {
    /// Vendor id with firmware loaded (hex, e.g. 0x04b4)
    #[arg(long, value_parser = parse_hex_u16)]
    pub vid: u16,

    /// Product id with firmware loaded
    #[arg(long, value_parser = parse_hex_u16)]
    pub pid: u16,

    /// Vendor id before firmware upload (defaults to --vid)
    #[arg(long, value_parser = parse_hex_u16)]
    pub orig_vid: Option<u16>,

    /// Product id before firmware upload (defaults to --pid)
    #[arg(long, value_parser = parse_hex_u16)]
    pub orig_pid: Option<u16>,

    /// The variant has a coupling relay
    #[arg(long)]
    pub coupling: bool,
}

/// Options for opening a device
#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device and acquisition options, e.g. "dds140:samplerate=10M,vdiv1=500mV"
    #[arg(short, long, default_value = "dds140")]
    pub device: String,

    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Physical USB port path (e.g. "1-4.2"); first match if omitted
    #[arg(long)]
    pub connection: Option<String>,

    /// Give up after this many not-ready FIFO polls
    #[arg(long)]
    pub poll_limit: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List attached devices
    List {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Open the device and commit its configuration
    Init {
        #[command(flatten)]
        device: DeviceArgs,
    },

    /// Capture raw sample blocks to a file
    Capture {
        #[command(flatten)]
        device: DeviceArgs,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of blocks to capture
        #[arg(short, long, default_value = "1")]
        blocks: usize,

        /// Block size in bytes (e.g. "64K"); derived from limit_samples if omitted
        #[arg(short, long, value_parser = parse_size)]
        size: Option<usize>,

        /// Read and discard a flush block before capturing
        #[arg(long)]
        flush: bool,
    },
}
