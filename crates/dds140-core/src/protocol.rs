//! DDS140 protocol constants
//!
//! The device is an FX2-based front end programmed with vendor firmware.
//! Every setting is a single vendor control request whose `bRequest` is the
//! register address and whose `wValue` is the value. Captured samples are
//! pulled from one bulk IN endpoint.

#![allow(missing_docs)]

use core::time::Duration;

// USB layout
pub const EP_IN: u8 = 0x82;
pub const USB_INTERFACE: u8 = 0;
pub const USB_CONFIGURATION: u8 = 1;

/// Registers
pub mod regs {
    /// Channel 1 voltage range
    pub const VDIV_CH1: u8 = 0x22;
    /// Channel 2 voltage range
    pub const VDIV_CH2: u8 = 0x23;
    /// Mode select (0x10 during calibration, 0x18 for two-channel capture)
    pub const MODE: u8 = 0x24;
    /// Begin capture
    pub const START_CAPTURE: u8 = 0x33;
    /// Trigger arm, low
    pub const TRIGGER_ARM_LO: u8 = 0x34;
    /// Trigger arm, high
    pub const TRIGGER_ARM_HI: u8 = 0x35;
    /// FIFO status poll
    pub const FIFO_STATUS: u8 = 0x50;
    /// Sample rate divider
    pub const SAMPLERATE: u8 = 0x94;
    /// Calibration enable
    pub const CALIBRATION: u8 = 0x63;
    /// Post-init latch
    pub const LATCH: u8 = 0xe7;
    // Placeholder: the coupling register has not been identified yet.
    pub const COUPLING: u8 = 0x00;
    // Placeholder: the channel-count register has not been identified yet.
    pub const CHANNELS: u8 = 0x00;
}

/// Value written to [`regs::MODE`] before a sample rate change
pub const MODE_CAPTURE: u16 = 0x18;

/// FIFO status value meaning a full block is ready to read
pub const FIFO_READY: u8 = 0x21;

// Timeouts
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);
pub const WRITE_TIMEOUT: Duration = Duration::from_millis(1000);
pub const CONTROL_ASYNC_TIMEOUT: Duration = Duration::from_millis(1000);
pub const BULK_TIMEOUT: Duration = Duration::from_millis(4000);

// Transfer limits
pub const MIN_PACKET_SIZE: usize = 512;
#[cfg(windows)]
pub const MAX_PACKET_SIZE: usize = 2 * 1024 * 1024;
#[cfg(not(windows))]
pub const MAX_PACKET_SIZE: usize = 12 * 1024 * 1024;
/// The first block after arming carries a glitch and is discarded by callers.
pub const FLUSH_PACKET_SIZE: usize = 1024;

pub const NUM_CHANNELS: usize = 2;

/// Timer and filter calibration constants, in write order.
///
/// Captured from the vendor "Logic 140" software. Register 0x34 is written
/// twice and mode/samplerate are written repeatedly; the device expects the
/// exact sequence.
pub const INIT_SEQUENCE: &[(u8, u16)] = &[
    (0x76, 0xe8),
    (0x77, 0x9b),
    (0x78, 0xe8),
    (0x79, 0x9b),
    (regs::CALIBRATION, 0x04),
    (0x75, 0x00),
    (regs::TRIGGER_ARM_LO, 0x00),
    (regs::TRIGGER_ARM_LO, 0x00),
    (0x7a, 0xfb),
    (0x7b, 0x8c),
    (0x7c, 0xff),
    (0x7d, 0xc4),
    (regs::MODE, 0x10),
    (regs::SAMPLERATE, 0x1c), // 10 MHz
    (regs::VDIV_CH1, 0x00), // ch1 200 mV
    (regs::MODE, 0x18),
    (regs::VDIV_CH2, 0x00), // ch2 200 mV
    (regs::MODE, 0x18),
    (regs::SAMPLERATE, 0x1c),
    (regs::MODE, 0x18), // ch1 + ch2
    (regs::LATCH, 0x00),
];

/// Built-in signal generator setup (timer reload values)
pub const SIGNAL_GENERATOR_SEQUENCE: &[(u8, u16)] = &[
    (0x70, 0x55d6),
    (0x71, 0x4000),
    (0x72, 0x95d6),
    (0x73, 0x8000),
    (0x74, 0x0000),
    (0x76, 0x00fc),
    (0x77, 0x00d7),
    (0x78, 0x00fe),
    (0x79, 0x0079),
    (0x7a, 0x00fb),
    (0x7b, 0x005c),
    (0x7c, 0x00ff),
    (0x7d, 0x00f4),
    (regs::CALIBRATION, 0x0000),
];
