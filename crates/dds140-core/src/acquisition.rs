//! Acquisition state machine
//!
//! A capture is a three-step handshake, each step one non-blocking transfer
//! whose completion decides the next:
//!
//! ```text
//! Idle --start()--> RequestingStart          write 0x33 <- 0
//! RequestingStart --write done--> AwaitingFifoReady   read 0x50 (1 byte)
//! AwaitingFifoReady --0x21--> TransferringData        bulk read `amount`
//! AwaitingFifoReady --other--> AwaitingFifoReady      read 0x50 again
//! TransferringData --bulk done--> Idle                handler(buffer)
//! ```
//!
//! The machine never performs I/O itself. [`Acquisition::start`] and
//! [`Acquisition::handle_completion`] return the next [`PendingTransfer`] for
//! the caller to submit, and [`Acquisition::drive`] runs that loop over any
//! [`TransferQueue`]. All per-capture state (amount, handler, the in-flight
//! slot) lives on the `Acquisition`, one per device session.
//!
//! The FIFO poll has no backoff and, by default, no retry limit: the device
//! answers within a few polls once a block is captured. Each poll is still
//! bounded by its own transfer timeout, and a timed-out poll ends the
//! acquisition instead of being retried. [`Acquisition::with_poll_limit`]
//! adds an upper bound for hosts that need one.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{Error, Result, TransferFault};
use crate::protocol::{
    regs, BULK_TIMEOUT, CONTROL_ASYNC_TIMEOUT, EP_IN, FIFO_READY, MAX_PACKET_SIZE,
    MIN_PACKET_SIZE,
};
use crate::transport::{Completion, PendingTransfer, TransferKind, TransferQueue};

/// Receives the bulk buffer (or the bulk transfer error) of one acquisition
pub type CompletionHandler = Box<dyn FnOnce(Result<Vec<u8>>) + Send>;

/// Where the handshake currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    /// No acquisition running
    Idle,
    /// Start-capture write in flight
    RequestingStart,
    /// FIFO status poll in flight
    AwaitingFifoReady,
    /// Bulk read in flight
    TransferringData,
}

/// Outcome of feeding a completion into the machine
#[derive(Debug)]
pub enum Step {
    /// Submit this transfer next
    Submit(PendingTransfer),
    /// The bulk read completed and the handler has been called
    Finished,
    /// A control step failed; the handler was dropped without being called
    Failed(Error),
    /// The receive buffer could not be allocated; the handler was dropped
    Abandoned(Error),
    /// The completion did not belong to the current state and was dropped
    Ignored,
}

/// Per-session acquisition handshake
pub struct Acquisition {
    state: AcquisitionState,
    amount: usize,
    handler: Option<CompletionHandler>,
    in_flight: bool,
    polls: u32,
    poll_limit: Option<u32>,
}

impl fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquisition")
            .field("state", &self.state)
            .field("amount", &self.amount)
            .field("has_handler", &self.handler.is_some())
            .field("in_flight", &self.in_flight)
            .field("polls", &self.polls)
            .field("poll_limit", &self.poll_limit)
            .finish()
    }
}

impl Default for Acquisition {
    fn default() -> Self {
        Self::new()
    }
}

impl Acquisition {
    /// Create an idle machine with unbounded FIFO polling
    pub fn new() -> Self {
        Self {
            state: AcquisitionState::Idle,
            amount: 0,
            handler: None,
            in_flight: false,
            polls: 0,
            poll_limit: None,
        }
    }

    /// Give up after `limit` consecutive not-ready polls
    pub fn with_poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = Some(limit);
        self
    }

    /// Current state
    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Whether a transfer issued by this machine is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Not-ready polls seen during the current acquisition
    pub fn fifo_polls(&self) -> u32 {
        self.polls
    }

    /// Begin an acquisition of `amount` bytes.
    ///
    /// Records the amount and handler and returns the start-capture write to
    /// submit. Nothing touches the FIFO until that write completes.
    pub fn start<F>(&mut self, amount: usize, handler: F) -> Result<PendingTransfer>
    where
        F: FnOnce(Result<Vec<u8>>) + Send + 'static,
    {
        if self.state != AcquisitionState::Idle || self.in_flight {
            return Err(Error::Busy);
        }
        if amount == 0 || amount > MAX_PACKET_SIZE {
            return Err(Error::InvalidAmount(amount));
        }

        log::debug!("Request channel data ({} bytes)", amount);
        self.amount = amount;
        self.handler = Some(Box::new(handler));
        self.polls = 0;
        self.state = AcquisitionState::RequestingStart;
        Ok(self.issue(PendingTransfer::control_out(
            regs::START_CAPTURE,
            0,
            CONTROL_ASYNC_TIMEOUT,
        )))
    }

    /// Stop a running capture.
    ///
    /// The device's stop sequence is unknown, so this writes nothing and
    /// reports [`Error::Unimplemented`].
    pub fn stop(&mut self) -> Result<()> {
        log::warn!("Stopping a capture is not supported by this device driver");
        Err(Error::Unimplemented("stop"))
    }

    /// Advance the handshake with a finished transfer
    pub fn handle_completion(&mut self, completion: Completion) -> Step {
        if !self.in_flight {
            log::warn!("Dropping stray completion for {:?}", completion.kind);
            return Step::Ignored;
        }

        match (self.state, completion.kind) {
            (AcquisitionState::RequestingStart, TransferKind::ControlOut { .. }) => {
                self.in_flight = false;
                if let Some(err) = completion.error() {
                    return self.fail(err);
                }
                log::trace!("start capture acknowledged");
                self.state = AcquisitionState::AwaitingFifoReady;
                Step::Submit(self.poll_fifo())
            }
            (AcquisitionState::AwaitingFifoReady, TransferKind::ControlIn { register }) => {
                self.in_flight = false;
                if let Some(err) = completion.error() {
                    return self.fail(err);
                }
                let Some(&status) = completion.buffer.first() else {
                    return self.fail(Error::register(register, TransferFault::Empty));
                };
                drop(completion);

                if status == FIFO_READY {
                    log::trace!("FIFO ready after {} polls", self.polls);
                    return self.start_data_transfer();
                }

                self.polls = self.polls.saturating_add(1);
                if self.poll_limit.is_some_and(|limit| self.polls >= limit) {
                    log::error!("FIFO not ready after {} polls", self.polls);
                    return self.fail(Error::register(register, TransferFault::Timeout));
                }
                log::trace!("FIFO status 0x{:02x}, polling again", status);
                Step::Submit(self.poll_fifo())
            }
            (AcquisitionState::TransferringData, TransferKind::BulkIn { .. }) => {
                self.in_flight = false;
                self.state = AcquisitionState::Idle;
                let result = match completion.error() {
                    Some(err) => {
                        log::error!("Bulk transfer failed: {:?}", err);
                        Err(err)
                    }
                    None => {
                        log::debug!("Received {} bytes", completion.buffer.len());
                        Ok(completion.buffer)
                    }
                };
                if let Some(handler) = self.handler.take() {
                    handler(result);
                }
                Step::Finished
            }
            (state, kind) => {
                log::warn!("Unexpected completion {:?} in state {:?}", kind, state);
                Step::Ignored
            }
        }
    }

    /// Drop the current acquisition without waiting for its transfer.
    ///
    /// For a caller that received [`Step::Ignored`] while a transfer was
    /// still in flight, or that gave up on its queue. The handler is dropped
    /// without being called and the machine is ready for a new
    /// [`Acquisition::start`].
    pub fn abort(&mut self) {
        if self.state != AcquisitionState::Idle || self.in_flight {
            log::warn!("Aborting acquisition in {:?}", self.state);
        }
        self.reset();
    }

    /// Release a transfer the queue refused and end the acquisition.
    ///
    /// The handler is dropped without being called.
    pub fn submission_failed(&mut self, transfer: PendingTransfer, error: Error) {
        log::error!(
            "Failed to submit transfer {:?}: {:?}",
            transfer.kind(),
            error
        );
        drop(transfer);
        self.reset();
    }

    /// Run an acquisition to the end over `queue`, starting with `first`
    /// (the transfer returned by [`Acquisition::start`]).
    pub fn drive<Q: TransferQueue + ?Sized>(
        &mut self,
        queue: &mut Q,
        first: PendingTransfer,
    ) -> Result<()> {
        let mut next = first;
        loop {
            if let Err(e) = queue.submit(next) {
                let error = e.error.clone();
                self.submission_failed(e.transfer, e.error);
                return Err(error);
            }

            let Some(completion) = queue.wait_completion() else {
                self.abort();
                return Err(Error::endpoint(EP_IN, TransferFault::Cancelled));
            };

            match self.handle_completion(completion) {
                Step::Submit(transfer) => next = transfer,
                Step::Finished => return Ok(()),
                Step::Failed(e) | Step::Abandoned(e) => return Err(e),
                Step::Ignored => {
                    self.abort();
                    return Err(Error::endpoint(EP_IN, TransferFault::Cancelled));
                }
            }
        }
    }

    fn poll_fifo(&mut self) -> PendingTransfer {
        self.issue(PendingTransfer::control_in(
            regs::FIFO_STATUS,
            1,
            CONTROL_ASYNC_TIMEOUT,
        ))
    }

    fn start_data_transfer(&mut self) -> Step {
        let Some(buf) = bulk_buffer(self.amount) else {
            log::error!("Failed to allocate {} byte USB endpoint buffer", self.amount);
            let amount = self.amount;
            self.reset();
            return Step::Abandoned(Error::AllocationFailure(amount));
        };

        self.state = AcquisitionState::TransferringData;
        Step::Submit(self.issue(PendingTransfer::bulk_in(
            EP_IN,
            buf,
            self.amount,
            BULK_TIMEOUT,
        )))
    }

    fn issue(&mut self, transfer: PendingTransfer) -> PendingTransfer {
        self.in_flight = true;
        transfer
    }

    fn fail(&mut self, err: Error) -> Step {
        log::error!("Acquisition failed in {:?}: {:?}", self.state, err);
        self.reset();
        Step::Failed(err)
    }

    fn reset(&mut self) {
        self.state = AcquisitionState::Idle;
        self.handler = None;
        self.in_flight = false;
        self.amount = 0;
    }
}

/// Reserve a receive buffer for `amount` bytes, rounded up to whole
/// packets so the queue can hand it to the host controller as is.
fn bulk_buffer(amount: usize) -> Option<Vec<u8>> {
    let capacity = amount.checked_next_multiple_of(MIN_PACKET_SIZE)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(capacity).ok()?;
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferTarget;
    use crate::transport::SubmitError;
    use alloc::collections::VecDeque;
    use alloc::sync::Arc;
    use alloc::vec;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers transfers from a script of FIFO status bytes
    #[derive(Default)]
    struct ScriptedQueue {
        fifo: VecDeque<u8>,
        pending: Option<PendingTransfer>,
        submitted: Vec<TransferKind>,
        refuse_bulk: bool,
        fail_writes: bool,
        bulk_fault: Option<TransferFault>,
    }

    impl ScriptedQueue {
        fn with_fifo(bytes: &[u8]) -> Self {
            Self {
                fifo: bytes.iter().copied().collect(),
                ..Default::default()
            }
        }
    }

    impl TransferQueue for ScriptedQueue {
        fn submit(&mut self, transfer: PendingTransfer) -> core::result::Result<(), SubmitError> {
            assert!(self.pending.is_none(), "two transfers in flight");
            if self.refuse_bulk && matches!(transfer.kind(), TransferKind::BulkIn { .. }) {
                return Err(SubmitError {
                    transfer,
                    error: Error::endpoint(EP_IN, TransferFault::Disconnected),
                });
            }
            self.submitted.push(transfer.kind());
            self.pending = Some(transfer);
            Ok(())
        }

        fn wait_completion(&mut self) -> Option<Completion> {
            let mut transfer = self.pending.take()?;
            Some(match transfer.kind() {
                TransferKind::ControlOut { .. } if self.fail_writes => {
                    transfer.complete(Err(TransferFault::Timeout))
                }
                TransferKind::ControlOut { .. } => transfer.complete(Ok(())),
                TransferKind::ControlIn { .. } => match self.fifo.pop_front() {
                    Some(b) => transfer.complete_with(&[b]),
                    None => transfer.complete(Err(TransferFault::Timeout)),
                },
                TransferKind::BulkIn { .. } => {
                    if let Some(fault) = self.bulk_fault.clone() {
                        return Some(transfer.complete(Err(fault)));
                    }
                    let len = transfer.length();
                    let buf = transfer.buffer_mut();
                    buf.extend((0..len).map(|i| i as u8));
                    transfer.complete(Ok(()))
                }
            })
        }
    }

    fn counting_handler() -> (Arc<AtomicUsize>, Arc<AtomicUsize>, CompletionHandler) {
        let calls = Arc::new(AtomicUsize::new(0));
        let bytes = Arc::new(AtomicUsize::new(0));
        let (c, b) = (calls.clone(), bytes.clone());
        let handler: CompletionHandler = Box::new(move |result: Result<Vec<u8>>| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Ok(buf) = result {
                b.store(buf.len(), Ordering::SeqCst);
            }
        });
        (calls, bytes, handler)
    }

    #[test]
    fn test_start_issues_start_capture() {
        let mut acq = Acquisition::new();
        let t = acq.start(4096, |_| {}).unwrap();
        assert_eq!(
            t.kind(),
            TransferKind::ControlOut {
                register: 0x33,
                value: 0
            }
        );
        assert_eq!(acq.state(), AcquisitionState::RequestingStart);
        assert!(acq.is_in_flight());
    }

    #[test]
    fn test_start_rejects_while_busy() {
        let mut acq = Acquisition::new();
        let _t = acq.start(4096, |_| {}).unwrap();
        assert!(matches!(acq.start(4096, |_| {}), Err(Error::Busy)));
    }

    #[test]
    fn test_start_rejects_bad_amount() {
        let mut acq = Acquisition::new();
        assert!(matches!(
            acq.start(0, |_| {}),
            Err(Error::InvalidAmount(0))
        ));
        assert!(matches!(
            acq.start(MAX_PACKET_SIZE + 1, |_| {}),
            Err(Error::InvalidAmount(_))
        ));
        assert_eq!(acq.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_start_write_completion_polls_fifo() {
        let mut acq = Acquisition::new();
        let t = acq.start(1024, |_| {}).unwrap();
        match acq.handle_completion(t.complete(Ok(()))) {
            Step::Submit(poll) => {
                assert_eq!(poll.kind(), TransferKind::ControlIn { register: 0x50 });
                assert_eq!(poll.length(), 1);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(acq.state(), AcquisitionState::AwaitingFifoReady);
    }

    #[test]
    fn test_not_ready_repolls_without_state_change() {
        let mut acq = Acquisition::new();
        let t = acq.start(1024, |_| {}).unwrap();
        let Step::Submit(mut poll) = acq.handle_completion(t.complete(Ok(()))) else {
            panic!("expected poll");
        };

        for (n, status) in [0x00u8, 0x20, 0x22, 0xff].into_iter().enumerate() {
            match acq.handle_completion(poll.complete_with(&[status])) {
                Step::Submit(next) => {
                    assert_eq!(next.kind(), TransferKind::ControlIn { register: 0x50 });
                    poll = next;
                }
                other => panic!("unexpected step {:?}", other),
            }
            assert_eq!(acq.state(), AcquisitionState::AwaitingFifoReady);
            assert_eq!(acq.fifo_polls(), n as u32 + 1);
        }
    }

    #[test]
    fn test_ready_starts_bulk_read() {
        let mut acq = Acquisition::new();
        let t = acq.start(2048, |_| {}).unwrap();
        let Step::Submit(poll) = acq.handle_completion(t.complete(Ok(()))) else {
            panic!("expected poll");
        };
        match acq.handle_completion(poll.complete_with(&[FIFO_READY])) {
            Step::Submit(mut bulk) => {
                assert_eq!(bulk.kind(), TransferKind::BulkIn { endpoint: 0x82 });
                assert_eq!(bulk.length(), 2048);
                assert_eq!(bulk.timeout(), BULK_TIMEOUT);
                assert!(bulk.buffer_mut().capacity() >= 2048);
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(acq.state(), AcquisitionState::TransferringData);
    }

    #[test]
    fn test_drive_delivers_buffer_once() {
        let (calls, bytes, handler) = counting_handler();
        let mut queue = ScriptedQueue::with_fifo(&[0x00, 0x00, FIFO_READY]);
        let mut acq = Acquisition::new();

        let first = acq.start(4096, handler).unwrap();
        acq.drive(&mut queue, first).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bytes.load(Ordering::SeqCst), 4096);
        assert_eq!(acq.state(), AcquisitionState::Idle);
        assert!(!acq.is_in_flight());
        assert_eq!(
            queue.submitted,
            [
                TransferKind::ControlOut {
                    register: 0x33,
                    value: 0
                },
                TransferKind::ControlIn { register: 0x50 },
                TransferKind::ControlIn { register: 0x50 },
                TransferKind::ControlIn { register: 0x50 },
                TransferKind::BulkIn { endpoint: 0x82 },
            ]
        );
    }

    #[test]
    fn test_submission_failure_never_calls_handler() {
        let (calls, _bytes, handler) = counting_handler();
        let mut queue = ScriptedQueue::with_fifo(&[FIFO_READY]);
        queue.refuse_bulk = true;
        let mut acq = Acquisition::new();

        let first = acq.start(4096, handler).unwrap();
        let err = acq.drive(&mut queue, first).unwrap_err();

        assert_eq!(err, Error::endpoint(EP_IN, TransferFault::Disconnected));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // The handler (and its captured counters) has been released
        assert_eq!(Arc::strong_count(&calls), 1);
        assert_eq!(acq.state(), AcquisitionState::Idle);
        assert!(!acq.is_in_flight());

        // The session is usable again
        let (calls, _bytes, handler) = counting_handler();
        let mut queue = ScriptedQueue::with_fifo(&[FIFO_READY]);
        let first = acq.start(512, handler).unwrap();
        acq.drive(&mut queue, first).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bulk_failure_reaches_handler() {
        let result = Arc::new(Mutex::new(None));
        let r = result.clone();
        let mut queue = ScriptedQueue::with_fifo(&[FIFO_READY]);
        queue.bulk_fault = Some(TransferFault::Timeout);
        let mut acq = Acquisition::new();

        let first = acq
            .start(1024, move |res: Result<Vec<u8>>| *r.lock().unwrap() = res.err())
            .unwrap();
        acq.drive(&mut queue, first).unwrap();

        assert_eq!(
            result.lock().unwrap().take(),
            Some(Error::TransferFailure {
                target: TransferTarget::Endpoint(0x82),
                fault: TransferFault::Timeout,
            })
        );
    }

    #[test]
    fn test_poll_timeout_fails_without_retry() {
        let (calls, _bytes, handler) = counting_handler();
        // No scripted status bytes: the first poll times out
        let mut queue = ScriptedQueue::with_fifo(&[]);
        let mut acq = Acquisition::new();

        let first = acq.start(1024, handler).unwrap();
        let err = acq.drive(&mut queue, first).unwrap_err();

        assert_eq!(err, Error::register(0x50, TransferFault::Timeout));
        assert_eq!(queue.submitted.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(acq.state(), AcquisitionState::Idle);
    }

    #[test]
    fn test_start_write_failure() {
        let (calls, _bytes, handler) = counting_handler();
        let mut queue = ScriptedQueue::with_fifo(&[FIFO_READY]);
        queue.fail_writes = true;
        let mut acq = Acquisition::new();

        let first = acq.start(1024, handler).unwrap();
        let err = acq.drive(&mut queue, first).unwrap_err();
        assert_eq!(err, Error::register(0x33, TransferFault::Timeout));
        assert_eq!(queue.submitted.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_poll_limit() {
        let mut queue = ScriptedQueue::with_fifo(&[0; 8]);
        let mut acq = Acquisition::new().with_poll_limit(3);

        let first = acq.start(1024, |_| {}).unwrap();
        let err = acq.drive(&mut queue, first).unwrap_err();
        assert_eq!(err, Error::register(0x50, TransferFault::Timeout));
        // start write + 3 polls
        assert_eq!(queue.submitted.len(), 4);
    }

    #[test]
    fn test_empty_poll_is_failure() {
        let mut acq = Acquisition::new();
        let t = acq.start(1024, |_| {}).unwrap();
        let Step::Submit(poll) = acq.handle_completion(t.complete(Ok(()))) else {
            panic!("expected poll");
        };
        match acq.handle_completion(poll.complete_with(&[])) {
            Step::Failed(err) => assert_eq!(err, Error::register(0x50, TransferFault::Empty)),
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_stray_completion_ignored() {
        let mut acq = Acquisition::new();
        let stray = PendingTransfer::control_in(0x50, 1, CONTROL_ASYNC_TIMEOUT);
        assert!(matches!(
            acq.handle_completion(stray.complete_with(&[FIFO_READY])),
            Step::Ignored
        ));
        assert_eq!(acq.state(), AcquisitionState::Idle);

        // Wrong kind for the current state
        let _t = acq.start(1024, |_| {}).unwrap();
        let bulk = PendingTransfer::bulk_in(EP_IN, vec![], 1024, BULK_TIMEOUT);
        assert!(matches!(
            acq.handle_completion(bulk.complete(Ok(()))),
            Step::Ignored
        ));
        assert_eq!(acq.state(), AcquisitionState::RequestingStart);
    }

    #[test]
    fn test_poll_counter_saturates() {
        let mut acq = Acquisition::new();
        let t = acq.start(1024, |_| {}).unwrap();
        let Step::Submit(poll) = acq.handle_completion(t.complete(Ok(()))) else {
            panic!("expected poll");
        };
        acq.polls = u32::MAX;
        match acq.handle_completion(poll.complete_with(&[0x00])) {
            Step::Submit(next) => {
                assert_eq!(next.kind(), TransferKind::ControlIn { register: 0x50 })
            }
            other => panic!("unexpected step {:?}", other),
        }
        assert_eq!(acq.fifo_polls(), u32::MAX);
        assert_eq!(acq.state(), AcquisitionState::AwaitingFifoReady);
    }

    #[test]
    fn test_abort_after_mismatched_completion() {
        let (calls, _bytes, handler) = counting_handler();
        let mut acq = Acquisition::new();
        let _t = acq.start(1024, handler).unwrap();

        let bulk = PendingTransfer::bulk_in(EP_IN, vec![], 1024, BULK_TIMEOUT);
        assert!(matches!(
            acq.handle_completion(bulk.complete(Ok(()))),
            Step::Ignored
        ));
        assert!(acq.is_in_flight());
        assert!(matches!(acq.start(1024, |_| {}), Err(Error::Busy)));

        acq.abort();
        assert_eq!(acq.state(), AcquisitionState::Idle);
        assert!(!acq.is_in_flight());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&calls), 1);

        let mut queue = ScriptedQueue::with_fifo(&[FIFO_READY]);
        let first = acq.start(512, |_| {}).unwrap();
        acq.drive(&mut queue, first).unwrap();
    }

    #[test]
    fn test_bulk_buffer_covers_whole_packets() {
        let buf = bulk_buffer(1000).unwrap();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 1024);
        assert!(bulk_buffer(MAX_PACKET_SIZE).unwrap().capacity() >= MAX_PACKET_SIZE);
        assert!(bulk_buffer(usize::MAX).is_none());
    }

    #[test]
    fn test_stop_is_unimplemented() {
        let mut acq = Acquisition::new();
        assert_eq!(acq.stop(), Err(Error::Unimplemented("stop")));
    }

    #[test]
    fn test_sessions_are_independent() {
        let (calls_a, bytes_a, handler_a) = counting_handler();
        let (calls_b, bytes_b, handler_b) = counting_handler();
        let mut a = Acquisition::new();
        let mut b = Acquisition::new();

        // Interleave two sessions step by step
        let ta = a.start(1024, handler_a).unwrap();
        let tb = b.start(2048, handler_b).unwrap();
        let Step::Submit(pa) = a.handle_completion(ta.complete(Ok(()))) else {
            panic!()
        };
        let Step::Submit(pb) = b.handle_completion(tb.complete(Ok(()))) else {
            panic!()
        };
        let Step::Submit(mut ba) = a.handle_completion(pa.complete_with(&[FIFO_READY])) else {
            panic!()
        };
        let Step::Submit(mut bb) = b.handle_completion(pb.complete_with(&[FIFO_READY])) else {
            panic!()
        };
        let (la, lb) = (ba.length(), bb.length());
        ba.buffer_mut().resize(la, 0);
        bb.buffer_mut().resize(lb, 0);
        assert!(matches!(b.handle_completion(bb.complete(Ok(()))), Step::Finished));
        assert!(matches!(a.handle_completion(ba.complete(Ok(()))), Step::Finished));

        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 1);
        assert_eq!(bytes_a.load(Ordering::SeqCst), 1024);
        assert_eq!(bytes_b.load(Ordering::SeqCst), 2048);
    }
}
