//! Error mapping from nusb into the shared DDS140 error type

use dds140_core::error::TransferFault;
use nusb::transfer::TransferError;

pub use dds140_core::error::{Error, Result, TransferTarget};

/// Map a completed transfer's error onto the protocol-level fault
pub(crate) fn transfer_fault(e: TransferError) -> TransferFault {
    match e {
        TransferError::Cancelled => TransferFault::Cancelled,
        TransferError::Stall => TransferFault::Stall,
        TransferError::Disconnected => TransferFault::Disconnected,
        TransferError::Fault => TransferFault::Fault,
        other => TransferFault::Other(other.to_string()),
    }
}

/// Control transfers are only ever cancelled by their own deadline
pub(crate) fn control_fault(e: TransferError) -> TransferFault {
    match e {
        TransferError::Cancelled => TransferFault::Timeout,
        other => transfer_fault(other),
    }
}

/// Opening or claiming failed
pub(crate) fn open_failure(e: nusb::Error) -> Error {
    Error::OpenFailure(e.to_string())
}
