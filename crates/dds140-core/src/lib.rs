//! dds140-core - Core library for DDS140 USB oscilloscopes
//!
//! This crate holds everything about the DDS140 control protocol that does
//! not depend on a particular USB stack:
//!
//! - [`codec`]: translation of sample rates and voltage ranges into device
//!   register values
//! - [`config`]: the device profile and acquisition configuration, including
//!   key=value option parsing
//! - [`transport`]: the [`RegisterIo`](transport::RegisterIo) and
//!   [`TransferQueue`](transport::TransferQueue) seams a USB backend implements
//! - [`setters`]: configuration sequences built on top of register writes
//! - [`acquisition`]: the completion-driven capture handshake
//!
//! It is `no_std` compatible (with `alloc`) so the state machine can be
//! driven from any executor or event loop.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` via thiserror)
//!
//! # Example
//!
//! ```ignore
//! use dds140_core::{setters, AcquisitionConfig};
//!
//! fn configure<R: dds140_core::transport::RegisterIo>(io: &mut R) {
//!     let config = AcquisitionConfig::default();
//!     if let Err(e) = setters::init(io, &config) {
//!         println!("Init failed: {:?}", e);
//!     }
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod acquisition;
pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod setters;
pub mod transport;

pub use acquisition::{Acquisition, AcquisitionState, CompletionHandler, Step};
pub use config::{AcquisitionConfig, Coupling, DeviceProfile};
pub use error::{Error, Result, TransferFault, TransferTarget};
pub use transport::{Completion, PendingTransfer, RegisterIo, TransferKind, TransferQueue};
