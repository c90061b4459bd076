//! Configuration setters
//!
//! Each setter is a fixed sequence of register writes. Writes within a
//! sequence are independent: a failed write is logged and the remaining
//! writes still go out, because a partially configured device is in a
//! better state than one left with the previous settings half applied. The
//! first failure is returned once the sequence is done.

use crate::codec;
use crate::config::{AcquisitionConfig, DeviceProfile};
use crate::error::Result;
use crate::protocol::{regs, INIT_SEQUENCE, MODE_CAPTURE, SIGNAL_GENERATOR_SEQUENCE};
use crate::transport::RegisterIo;

/// Write every `(register, value)` pair, returning the first failure.
fn write_all<R: RegisterIo + ?Sized>(io: &mut R, writes: &[(u8, u16)]) -> Result<()> {
    let mut first_err = None;

    for &(reg, value) in writes {
        if let Err(e) = io.write_register(reg, value) {
            log::error!("Write 0x{:02x} <- 0x{:02x} failed: {:?}", reg, value, e);
            first_err.get_or_insert(e);
        }
    }

    first_err.map_or(Ok(()), Err)
}

/// Commit the sample rate
pub fn update_samplerate<R: RegisterIo + ?Sized>(
    io: &mut R,
    config: &AcquisitionConfig,
) -> Result<()> {
    let reg = codec::sample_rate_to_register(config.samplerate);
    log::debug!("update samplerate {} Hz -> 0x{:02x}", config.samplerate, reg);

    write_all(
        io,
        &[(regs::MODE, MODE_CAPTURE), (regs::SAMPLERATE, reg as u16)],
    )
}

/// Commit both channels' voltage ranges
pub fn update_vdiv<R: RegisterIo + ?Sized>(io: &mut R, config: &AcquisitionConfig) -> Result<()> {
    let ch1 = codec::voltage_range_to_register(0, config.voltage[0]);
    let ch2 = codec::voltage_range_to_register(1, config.voltage[1]);
    log::debug!("update vdiv 0x{:02x} 0x{:02x}", ch1, ch2);

    write_all(
        io,
        &[(regs::VDIV_CH1, ch1 as u16), (regs::VDIV_CH2, ch2 as u16)],
    )
}

/// Commit input coupling.
///
/// Variants without a coupling relay accept this as a no-op.
pub fn update_coupling<R: RegisterIo + ?Sized>(
    io: &mut R,
    profile: &DeviceProfile,
    config: &AcquisitionConfig,
) -> Result<()> {
    if !profile.has_coupling {
        log::debug!("coupling not supported");
        return Ok(());
    }

    let coupling = config.coupling_byte();
    log::debug!("update coupling 0x{:02x}", coupling);
    io.write_register(regs::COUPLING, coupling as u16)
}

/// Commit the number of enabled channels (1 or 2)
pub fn update_channels<R: RegisterIo + ?Sized>(
    io: &mut R,
    config: &AcquisitionConfig,
) -> Result<()> {
    let count = config.channel_count();
    log::debug!("update channels amount {}", count);
    io.write_register(regs::CHANNELS, count as u16)
}

/// Load calibration constants and commit sample rate and voltage ranges.
///
/// Coupling and channel count are left alone; the device always starts in
/// two-channel mode.
pub fn init<R: RegisterIo + ?Sized>(io: &mut R, config: &AcquisitionConfig) -> Result<()> {
    log::debug!("Initializing");

    let calibration = write_all(io, INIT_SEQUENCE);
    let samplerate = update_samplerate(io, config);
    let vdiv = update_vdiv(io, config);

    calibration.and(samplerate).and(vdiv)
}

/// Arm the trigger for the next capture
pub fn arm_trigger<R: RegisterIo + ?Sized>(io: &mut R) -> Result<()> {
    log::debug!("arm trigger");
    write_all(io, &[(regs::TRIGGER_ARM_LO, 0), (regs::TRIGGER_ARM_HI, 0)])
}

/// Program the built-in signal generator timers
pub fn load_signal_generator<R: RegisterIo + ?Sized>(io: &mut R) -> Result<()> {
    log::debug!("load signal generator");
    write_all(io, SIGNAL_GENERATOR_SEQUENCE)
}
