//! Capture command implementation

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use dds140_core::protocol::FLUSH_PACKET_SIZE;
use dds140_usb::Dds140;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::DeviceArgs;
use crate::session;

/// Run the capture command
pub fn run_capture(
    args: &DeviceArgs,
    output: &Path,
    blocks: usize,
    size: Option<usize>,
    flush: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut scope = session::open_session(args)?;
    let block_size = size.unwrap_or_else(|| scope.config().block_size());
    let total = capture_total(blocks, block_size)?;

    let mut out = BufWriter::new(File::create(output)?);

    if flush {
        log::debug!("Flushing {} bytes", FLUSH_PACKET_SIZE);
        scope.arm_trigger()?;
        scope.acquire_block(FLUSH_PACKET_SIZE)?;
    }

    let written = capture_with_progress(&mut scope, &mut out, blocks, block_size, total)?;
    scope.close();
    out.flush()?;

    println!("Wrote {} bytes to {:?}", written, output);

    Ok(())
}

/// Bytes a capture of `blocks` blocks will produce
fn capture_total(blocks: usize, block_size: usize) -> Result<u64, String> {
    blocks
        .checked_mul(block_size)
        .map(|total| total as u64)
        .ok_or_else(|| format!("{} blocks of {} bytes is too large", blocks, block_size))
}

/// Capture up to `blocks` blocks of `block_size` bytes into `out` with a
/// progress bar, stopping early once the session's time limit is used up.
///
/// Returns the number of bytes written.
fn capture_with_progress<W: Write>(
    scope: &mut Dds140,
    out: &mut W,
    blocks: usize,
    block_size: usize,
    total: u64,
) -> Result<u64, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")?
            .progress_chars("#>-"),
    );

    let started = Instant::now();
    let mut written = 0u64;
    for block in 0..blocks {
        scope.arm_trigger()?;
        let chunk = scope.acquire_block(block_size).inspect_err(|e| {
            pb.abandon_with_message(format!("Block {} failed: {}", block, e));
        })?;
        out.write_all(&chunk)?;
        written += chunk.len() as u64;
        pb.set_position(written);

        if block + 1 < blocks && scope.config().time_limit_reached(started.elapsed()) {
            log::info!(
                "Time limit of {} ms reached after {} of {} blocks",
                scope.config().limit_msec,
                block + 1,
                blocks
            );
            break;
        }
    }

    pb.finish_with_message("Capture complete");
    Ok(written)
}
