//! dds140-usb - USB backend for DDS140 oscilloscopes
//!
//! Opens the device with nusb, implements register access over vendor
//! control transfers, and drives the acquisition handshake from
//! `dds140-core` over the device's control pipe and bulk-in endpoint 0x82.
//!
//! # Example
//!
//! ```no_run
//! use dds140_core::{config::parse_options, DeviceProfile};
//! use dds140_usb::{Dds140, UsbIdentity};
//!
//! let profile = DeviceProfile::new(0x04b4, 0x1004);
//! let config = parse_options(&[("samplerate", "10M"), ("vdiv1", "500mV")])?;
//!
//! let mut scope = Dds140::new(profile, UsbIdentity::default()).with_config(config);
//! scope.open()?;
//! scope.arm_trigger()?;
//! let data = scope.acquire_block(4096)?;
//! println!("Captured {} bytes", data.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod device;
mod error;
mod queue;

pub use device::{format_connection_id, Dds140, Dds140DeviceInfo, SessionStatus, UsbIdentity};
pub use error::{Error, Result, TransferTarget};
