//! Error types for dds140-core
//!
//! A single error type is shared by the codec, the setters, the acquisition
//! state machine and the USB backend so that every layer reports the same
//! kinds of failure.

use alloc::string::String;
use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

/// What a failed transfer was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferTarget {
    /// A vendor control request addressed to a device register
    Register(u8),
    /// A bulk endpoint
    Endpoint(u8),
}

impl fmt::Display for TransferTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "register 0x{:02x}", reg),
            Self::Endpoint(ep) => write!(f, "endpoint 0x{:02x}", ep),
        }
    }
}

/// Underlying cause of a failed USB transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFault {
    /// The transfer did not complete before its deadline
    Timeout,
    /// The device stalled the request
    Stall,
    /// The device went away (or the handle is not open)
    Disconnected,
    /// The transfer was cancelled
    Cancelled,
    /// Host controller or protocol fault
    Fault,
    /// The transfer completed without returning any data
    Empty,
    /// Any other error reported by the USB stack
    Other(String),
}

impl fmt::Display for TransferFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timed out"),
            Self::Stall => write!(f, "stalled"),
            Self::Disconnected => write!(f, "device disconnected"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Fault => write!(f, "hardware fault"),
            Self::Empty => write!(f, "no data returned"),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// DDS140 error type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Error))]
pub enum Error {
    /// Enumeration found no device matching the profile and identity
    #[cfg_attr(feature = "std", error("DDS140 device not found"))]
    DeviceNotFound,

    /// Opening or claiming the device failed
    #[cfg_attr(feature = "std", error("Failed to open device: {0}"))]
    OpenFailure(String),

    /// A control or bulk transfer failed or timed out
    #[cfg_attr(feature = "std", error("Transfer on {target} failed: {fault}"))]
    TransferFailure {
        /// Register or endpoint the transfer was addressed to
        target: TransferTarget,
        /// Underlying cause
        fault: TransferFault,
    },

    /// A receive buffer could not be allocated
    #[cfg_attr(feature = "std", error("Failed to allocate {0} byte transfer buffer"))]
    AllocationFailure(usize),

    /// An acquisition is already running on this session
    #[cfg_attr(feature = "std", error("Acquisition already in progress"))]
    Busy,

    /// Requested transfer amount is zero or exceeds the platform maximum
    #[cfg_attr(feature = "std", error("Invalid transfer amount: {0} bytes"))]
    InvalidAmount(usize),

    /// A configuration option could not be parsed
    #[cfg_attr(feature = "std", error("Invalid parameter: {0}"))]
    InvalidParameter(String),

    /// The operation has no known device sequence
    #[cfg_attr(feature = "std", error("{0} is not implemented for this device"))]
    Unimplemented(&'static str),
}

impl Error {
    /// Shorthand for a transfer failure on a register
    pub fn register(reg: u8, fault: TransferFault) -> Self {
        Self::TransferFailure {
            target: TransferTarget::Register(reg),
            fault,
        }
    }

    /// Shorthand for a transfer failure on a bulk endpoint
    pub fn endpoint(ep: u8, fault: TransferFault) -> Self {
        Self::TransferFailure {
            target: TransferTarget::Endpoint(ep),
            fault,
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
