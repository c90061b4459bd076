//! Device spec parsing and session setup

use std::collections::HashMap;

use dds140_core::config::{self, AcquisitionConfig};
use dds140_core::DeviceProfile;
use dds140_usb::{Dds140, UsbIdentity};

use crate::cli::{DeviceArgs, ProfileArgs};

/// Parsed `-d` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Driver name (always "dds140")
    pub name: String,
    /// Options in command line order
    pub options: Vec<(String, String)>,
}

/// Parse a device string of the form "name" or "name:key=value,key=value"
pub fn parse_device_spec(s: &str) -> Result<DeviceSpec, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    if name != "dds140" {
        return Err(format!("Unknown device driver: '{}'", name).into());
    }

    let mut options = Vec::new();
    let mut seen = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            let Some((key, value)) = opt.split_once('=') else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            };
            if let Some(prev) = seen.insert(key.to_string(), value.to_string()) {
                log::warn!("Option '{}' given twice, '{}' overrides '{}'", key, value, prev);
            }
            options.push((key.to_string(), value.to_string()));
        }
    }

    Ok(DeviceSpec {
        name: name.to_string(),
        options,
    })
}

impl DeviceSpec {
    /// Build the acquisition configuration from the options
    pub fn config(&self) -> Result<AcquisitionConfig, Box<dyn std::error::Error>> {
        let pairs: Vec<(&str, &str)> = self
            .options
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Ok(config::parse_options(&pairs)?)
    }
}

/// Build the device profile from the id arguments
pub fn profile(args: &ProfileArgs) -> DeviceProfile {
    let profile = DeviceProfile::new(args.vid, args.pid).with_orig_ids(
        args.orig_vid.unwrap_or(args.vid),
        args.orig_pid.unwrap_or(args.pid),
    );
    if args.coupling {
        profile.with_coupling(&["AC", "DC"])
    } else {
        profile
    }
}

/// Open and initialize a session, then commit coupling and channel count
pub fn open_session(args: &DeviceArgs) -> Result<Dds140, Box<dyn std::error::Error>> {
    let spec = parse_device_spec(&args.device)?;
    let config = spec.config()?;
    log::info!("Configuration: {}", config::describe(&config));

    let identity = match &args.connection {
        Some(conn) => UsbIdentity::at(conn.clone()),
        None => UsbIdentity::default(),
    };

    let mut scope = Dds140::new(profile(&args.profile), identity).with_config(config);
    if let Some(limit) = args.poll_limit {
        scope = scope.with_poll_limit(limit);
    }

    scope.open()?;
    scope.update_coupling()?;
    scope.update_channels()?;

    Ok(scope)
}
