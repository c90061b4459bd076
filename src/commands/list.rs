//! List command implementation

use dds140_usb::Dds140;

use crate::cli::ProfileArgs;
use crate::session;

/// List attached devices and whether their firmware is loaded
pub fn run_list(args: &ProfileArgs) -> Result<(), Box<dyn std::error::Error>> {
    let profile = session::profile(args);
    let devices = Dds140::list_devices(&profile)?;

    if devices.is_empty() {
        println!(
            "No DDS140 devices found ({:04x}:{:04x})",
            profile.fw_vid, profile.fw_pid
        );
        return Ok(());
    }

    println!("{:<12} {:>8} {:<10}", "Connection", "Address", "Firmware");
    println!("{}", "-".repeat(32));

    for dev in &devices {
        println!(
            "{:<12} {:>8} {:<10}",
            dev.connection_id,
            dev.address,
            if dev.firmware_loaded { "loaded" } else { "cold" }
        );
    }

    let cold = devices.iter().filter(|d| !d.firmware_loaded).count();
    if cold > 0 {
        log::warn!("{} device(s) need firmware before they can be opened", cold);
    }

    Ok(())
}
