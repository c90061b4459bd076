//! [`TransferQueue`] over an nusb interface
//!
//! Control requests block: `submit` waits for the request to finish (bounded
//! by the transfer's timeout) and holds the result until the next
//! `wait_completion`. The handshake never has a control request and another
//! transfer outstanding together, so nothing overlaps them.
//!
//! Bulk reads go through the endpoint's own transfer queue. The pending
//! transfer's buffer is handed to nusb as is and comes back in the
//! completion, so a capture allocates its receive buffer once.

use std::time::Duration;

use dds140_core::error::TransferFault;
use dds140_core::transport::{
    Completion, PendingTransfer, SubmitError, TransferKind, TransferQueue,
};
use dds140_core::Error;
use nusb::transfer::{Buffer, Bulk, ControlIn, ControlOut, ControlType, In, Recipient};
use nusb::{Endpoint, Interface, MaybeFuture};

use crate::error::{control_fault, transfer_fault};

/// Per-session transfer queue; at most one transfer outstanding
pub(crate) struct UsbQueue<'a> {
    interface: &'a Interface,
    bulk_in: &'a mut Endpoint<Bulk, In>,
    ready: Option<Completion>,
    bulk: Option<PendingTransfer>,
}

impl<'a> UsbQueue<'a> {
    pub(crate) fn new(interface: &'a Interface, bulk_in: &'a mut Endpoint<Bulk, In>) -> Self {
        Self {
            interface,
            bulk_in,
            ready: None,
            bulk: None,
        }
    }

    fn control_out(&self, transfer: PendingTransfer, register: u8, value: u16) -> Completion {
        log::trace!("async write 0x{:02x} <- 0x{:02x}", register, value);
        let status = self
            .interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: register,
                    value,
                    index: 0,
                    data: &[0],
                },
                transfer.timeout(),
            )
            .wait()
            .map_err(control_fault);
        transfer.complete(status)
    }

    fn control_in(&self, transfer: PendingTransfer, register: u8) -> Completion {
        let result = self
            .interface
            .control_in(
                ControlIn {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: register,
                    value: 0,
                    index: 0,
                    length: transfer.length() as u16,
                },
                transfer.timeout(),
            )
            .wait();

        match result {
            Ok(data) => {
                log::trace!("async read 0x{:02x} -> {:02x?}", register, data);
                transfer.complete_with(&data)
            }
            Err(e) => transfer.complete(Err(control_fault(e))),
        }
    }

    fn submit_bulk(
        &mut self,
        mut transfer: PendingTransfer,
        endpoint: u8,
    ) -> Result<(), SubmitError> {
        let request_len = bulk_request_len(transfer.length(), self.bulk_in.max_packet_size());
        log::trace!(
            "bulk read 0x{:02x}: {} bytes ({} requested)",
            endpoint,
            transfer.length(),
            request_len
        );

        let Some(vec) = take_receive_buffer(transfer.buffer_mut(), request_len) else {
            log::error!("Failed to allocate {} byte USB endpoint buffer", request_len);
            return Err(SubmitError {
                transfer,
                error: Error::AllocationFailure(request_len),
            });
        };
        let mut buf = Buffer::from(vec);
        buf.set_requested_len(request_len);
        self.bulk_in.submit(buf);
        self.bulk = Some(transfer);
        Ok(())
    }

    fn reap_bulk(&mut self, mut transfer: PendingTransfer) -> Completion {
        match self.bulk_in.wait_next_complete(transfer.timeout()) {
            Some(completion) => match completion.status {
                Ok(()) => {
                    let mut data = completion.buffer.into_vec();
                    let len = data.len().min(transfer.length());
                    data.truncate(len);
                    *transfer.buffer_mut() = data;
                    if len < transfer.length() {
                        log::warn!("Short bulk read: {} of {} bytes", len, transfer.length());
                    }
                    transfer.complete(Ok(()))
                }
                Err(e) => transfer.complete(Err(transfer_fault(e))),
            },
            None => {
                log::error!(
                    "Bulk read of {} bytes timed out after {:?}",
                    transfer.length(),
                    transfer.timeout()
                );
                self.bulk_in.cancel_all();
                while self.bulk_in.pending() > 0 {
                    let _ = self.bulk_in.wait_next_complete(Duration::from_secs(1));
                }
                transfer.complete(Err(TransferFault::Timeout))
            }
        }
    }
}

/// Bulk request length: `length` rounded up to whole packets
fn bulk_request_len(length: usize, max_packet_size: usize) -> usize {
    length.div_ceil(max_packet_size) * max_packet_size
}

/// Take the transfer's buffer for submission, growing it to `capacity` only
/// if it is short. Leaves the buffer in place when the allocation fails.
fn take_receive_buffer(slot: &mut Vec<u8>, capacity: usize) -> Option<Vec<u8>> {
    slot.clear();
    if slot.capacity() < capacity {
        slot.try_reserve_exact(capacity).ok()?;
    }
    Some(std::mem::take(slot))
}

/// Control requests complete inside `submit`; see the module docs.
impl TransferQueue for UsbQueue<'_> {
    fn submit(&mut self, transfer: PendingTransfer) -> Result<(), SubmitError> {
        if self.ready.is_some() || self.bulk.is_some() {
            return Err(SubmitError {
                transfer,
                error: Error::Busy,
            });
        }

        match transfer.kind() {
            TransferKind::ControlOut { register, value } => {
                self.ready = Some(self.control_out(transfer, register, value));
            }
            TransferKind::ControlIn { register } => {
                self.ready = Some(self.control_in(transfer, register));
            }
            TransferKind::BulkIn { endpoint } => return self.submit_bulk(transfer, endpoint),
        }
        Ok(())
    }

    fn wait_completion(&mut self) -> Option<Completion> {
        if let Some(completion) = self.ready.take() {
            return Some(completion);
        }
        let transfer = self.bulk.take()?;
        Some(self.reap_bulk(transfer))
    }
}
