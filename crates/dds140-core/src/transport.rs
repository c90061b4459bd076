//! Transport seams
//!
//! Two traits separate the protocol logic from the USB stack:
//!
//! - [`RegisterIo`] is the blocking register primitive used by the
//!   configuration setters.
//! - [`TransferQueue`] carries the non-blocking requests issued by the
//!   acquisition state machine and hands their completions back.
//!
//! ## Buffer ownership
//!
//! A [`PendingTransfer`] owns its receive buffer. Submitting it moves the
//! transfer into the queue; the queue gives the same buffer back inside a
//! [`Completion`]. If submission fails the queue returns the transfer in a
//! [`SubmitError`] so the caller can drop it. There is no path on which a
//! buffer is neither returned nor dropped.

use alloc::vec::Vec;
use core::time::Duration;

use crate::error::{Error, Result, TransferFault, TransferTarget};

/// Blocking register access over vendor control transfers
pub trait RegisterIo {
    /// Write `value` to `register`.
    ///
    /// Vendor request, host-to-device, `wIndex` 0, one data byte.
    fn write_register(&mut self, register: u8, value: u16) -> Result<()>;

    /// Read `length` bytes from `register`.
    ///
    /// An empty response is a transfer failure.
    fn read_register(&mut self, register: u8, length: u16) -> Result<Vec<u8>>;
}

impl<T: RegisterIo + ?Sized> RegisterIo for &mut T {
    fn write_register(&mut self, register: u8, value: u16) -> Result<()> {
        (**self).write_register(register, value)
    }

    fn read_register(&mut self, register: u8, length: u16) -> Result<Vec<u8>> {
        (**self).read_register(register, length)
    }
}

/// What a pending transfer asks the device to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Vendor control write of `value` to `register`
    ControlOut {
        /// Register address (`bRequest`)
        register: u8,
        /// Value (`wValue`)
        value: u16,
    },
    /// Vendor control read from `register`
    ControlIn {
        /// Register address (`bRequest`)
        register: u8,
    },
    /// Bulk read from `endpoint`
    BulkIn {
        /// Endpoint address
        endpoint: u8,
    },
}

impl TransferKind {
    /// Register or endpoint the transfer addresses
    pub fn target(&self) -> TransferTarget {
        match *self {
            TransferKind::ControlOut { register, .. } | TransferKind::ControlIn { register } => {
                TransferTarget::Register(register)
            }
            TransferKind::BulkIn { endpoint } => TransferTarget::Endpoint(endpoint),
        }
    }
}

/// A request that has been issued but not yet completed
#[derive(Debug)]
pub struct PendingTransfer {
    kind: TransferKind,
    length: usize,
    buffer: Vec<u8>,
    timeout: Duration,
}

impl PendingTransfer {
    /// Control write; carries no receive buffer
    pub fn control_out(register: u8, value: u16, timeout: Duration) -> Self {
        Self {
            kind: TransferKind::ControlOut { register, value },
            length: 0,
            buffer: Vec::new(),
            timeout,
        }
    }

    /// Control read of `length` bytes
    pub fn control_in(register: u8, length: u16, timeout: Duration) -> Self {
        Self {
            kind: TransferKind::ControlIn { register },
            length: length as usize,
            buffer: Vec::with_capacity(length as usize),
            timeout,
        }
    }

    /// Bulk read of `length` bytes into a caller-provided buffer.
    ///
    /// The buffer is cleared; its capacity is kept so a pre-reserved
    /// allocation is reused for the received data.
    pub fn bulk_in(endpoint: u8, mut buffer: Vec<u8>, length: usize, timeout: Duration) -> Self {
        buffer.clear();
        Self {
            kind: TransferKind::BulkIn { endpoint },
            length,
            buffer,
            timeout,
        }
    }

    /// Request kind
    pub fn kind(&self) -> TransferKind {
        self.kind
    }

    /// Number of bytes requested (0 for writes)
    pub fn length(&self) -> usize {
        self.length
    }

    /// Deadline for the transfer
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Receive buffer, for the transport to fill
    pub fn buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buffer
    }

    /// Finish the transfer, handing the buffer back with its status
    pub fn complete(self, status: core::result::Result<(), TransferFault>) -> Completion {
        Completion {
            kind: self.kind,
            buffer: self.buffer,
            status,
        }
    }

    /// Finish a read, copying at most `length` bytes of `data` into the buffer
    pub fn complete_with(mut self, data: &[u8]) -> Completion {
        let len = data.len().min(self.length);
        self.buffer.clear();
        self.buffer.extend_from_slice(&data[..len]);
        self.complete(Ok(()))
    }
}

/// A finished transfer with its buffer returned
#[derive(Debug)]
pub struct Completion {
    /// Kind of the transfer that completed
    pub kind: TransferKind,
    /// Received data (empty for writes)
    pub buffer: Vec<u8>,
    /// Transport status
    pub status: core::result::Result<(), TransferFault>,
}

impl Completion {
    /// Convert a failed status into the matching error
    pub fn error(&self) -> Option<Error> {
        self.status.as_ref().err().map(|fault| Error::TransferFailure {
            target: self.kind.target(),
            fault: fault.clone(),
        })
    }
}

/// A transfer the queue refused, returned so it can be released
#[derive(Debug)]
pub struct SubmitError {
    /// The transfer that was not submitted
    pub transfer: PendingTransfer,
    /// Why submission failed
    pub error: Error,
}

/// Non-blocking transfer issuance with completion delivery
pub trait TransferQueue {
    /// Submit a transfer. Ownership moves to the queue on success.
    fn submit(&mut self, transfer: PendingTransfer) -> core::result::Result<(), SubmitError>;

    /// Wait for the next completion.
    ///
    /// Returns `None` if nothing is in flight. Every submitted transfer
    /// completes exactly once, including on timeout.
    fn wait_completion(&mut self) -> Option<Completion>;
}
