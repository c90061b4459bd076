//! Init command implementation

use dds140_core::config;

use crate::cli::DeviceArgs;
use crate::session;

/// Open the device, commit the configuration, and close it again
pub fn run_init(args: &DeviceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut scope = session::open_session(args)?;

    println!(
        "Initialized {} ({})",
        scope.identity(),
        config::describe(scope.config())
    );

    scope.close();
    Ok(())
}
