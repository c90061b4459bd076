//! Device profile and acquisition configuration
//!
//! The profile describes a hardware variant and is owned by whoever
//! catalogues devices; a session only references it. The acquisition
//! configuration is the mutable per-session state that the setters in
//! [`crate::setters`] commit to the device.

use alloc::format;
use alloc::string::{String, ToString};
use core::time::Duration;

use crate::codec;
use crate::error::{Error, Result};
use crate::protocol::{MAX_PACKET_SIZE, MIN_PACKET_SIZE, NUM_CHANNELS};

/// Default voltage range index (200 mV)
pub const DEFAULT_VOLTAGE: usize = 2;
/// Default input coupling
pub const DEFAULT_COUPLING: Coupling = Coupling::Dc;
/// Default sample rate (39 kHz)
pub const DEFAULT_SAMPLERATE: u64 = 39_000;

/// Input coupling mode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coupling {
    /// AC coupled (DC blocked)
    Ac = 0,
    /// DC coupled
    Dc = 1,
}

impl Coupling {
    /// Parse coupling from string ("ac" or "dc")
    pub fn from_name(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("ac") {
            Some(Coupling::Ac)
        } else if s.eq_ignore_ascii_case("dc") {
            Some(Coupling::Dc)
        } else {
            None
        }
    }
}

impl core::fmt::Display for Coupling {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Coupling::Ac => write!(f, "AC"),
            Coupling::Dc => write!(f, "DC"),
        }
    }
}

/// Static description of a device variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// VID after cold boot (before firmware upload)
    pub orig_vid: u16,
    /// PID after cold boot (before firmware upload)
    pub orig_pid: u16,
    /// VID after firmware upload
    pub fw_vid: u16,
    /// PID after firmware upload
    pub fw_pid: u16,
    /// bcdDevice reported by the uploaded firmware
    pub fw_prod_ver: u16,
    /// Vendor name
    pub vendor: &'static str,
    /// Model name
    pub model: &'static str,
    /// Firmware image name
    pub firmware: &'static str,
    /// Coupling names the variant can select, in register order
    pub coupling_vals: &'static [&'static str],
    /// Whether the coupling register exists on this variant
    pub has_coupling: bool,
}

impl DeviceProfile {
    /// Profile for a variant that enumerates with the same ids before and
    /// after firmware upload and has no coupling relay.
    pub const fn new(vid: u16, pid: u16) -> Self {
        Self {
            orig_vid: vid,
            orig_pid: pid,
            fw_vid: vid,
            fw_pid: pid,
            fw_prod_ver: 0,
            vendor: "",
            model: "DDS140",
            firmware: "",
            coupling_vals: &[],
            has_coupling: false,
        }
    }

    /// Set the cold-boot ids
    pub const fn with_orig_ids(mut self, vid: u16, pid: u16) -> Self {
        self.orig_vid = vid;
        self.orig_pid = pid;
        self
    }

    /// Declare coupling support
    pub const fn with_coupling(mut self, coupling_vals: &'static [&'static str]) -> Self {
        self.coupling_vals = coupling_vals;
        self.has_coupling = true;
        self
    }

    /// Whether the ids match this variant with firmware loaded
    pub fn matches_firmware(&self, vid: u16, pid: u16) -> bool {
        self.fw_vid == vid && self.fw_pid == pid
    }

    /// Whether the ids match this variant before firmware upload
    pub fn matches_cold(&self, vid: u16, pid: u16) -> bool {
        self.orig_vid == vid && self.orig_pid == pid
    }
}

/// Per-session acquisition settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionConfig {
    /// Enabled flag per channel
    pub ch_enabled: [bool; NUM_CHANNELS],
    /// Voltage range index per channel (see [`codec::VDIV_MILLIVOLTS`])
    pub voltage: [usize; NUM_CHANNELS],
    /// Coupling per channel
    pub coupling: [Coupling; NUM_CHANNELS],
    /// Sample rate in Hz
    pub samplerate: u64,
    /// Stop after this many samples (0 = no limit)
    pub limit_samples: u64,
    /// Stop after this many milliseconds (0 = no limit)
    pub limit_msec: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            ch_enabled: [true; NUM_CHANNELS],
            voltage: [DEFAULT_VOLTAGE; NUM_CHANNELS],
            coupling: [DEFAULT_COUPLING; NUM_CHANNELS],
            samplerate: DEFAULT_SAMPLERATE,
            limit_samples: 0,
            limit_msec: 0,
        }
    }
}

impl AcquisitionConfig {
    /// Value for the channel-count register: 2 when the second channel is
    /// enabled, 1 otherwise.
    pub fn channel_count(&self) -> u8 {
        if self.ch_enabled[1] {
            2
        } else {
            1
        }
    }

    /// Both channels' coupling packed as `ch2 << 4 | ch1`
    pub fn coupling_byte(&self) -> u8 {
        ((self.coupling[1] as u8) << 4) | self.coupling[0] as u8
    }

    /// Bytes to request per block.
    ///
    /// One byte per sample per enabled channel, rounded up to whole
    /// [`MIN_PACKET_SIZE`] packets and capped at [`MAX_PACKET_SIZE`]. Without
    /// a sample limit the largest block is used.
    pub fn block_size(&self) -> usize {
        if self.limit_samples == 0 {
            return MAX_PACKET_SIZE;
        }

        let bytes = self
            .limit_samples
            .saturating_mul(self.channel_count() as u64)
            .min(MAX_PACKET_SIZE as u64) as usize;
        bytes.div_ceil(MIN_PACKET_SIZE).max(1) * MIN_PACKET_SIZE
    }

    /// Whether a capture running for `elapsed` has used up `limit_msec`.
    /// Always false without a time limit.
    pub fn time_limit_reached(&self, elapsed: Duration) -> bool {
        self.limit_msec != 0 && elapsed >= Duration::from_millis(self.limit_msec)
    }

    /// Apply a single key=value option
    pub fn apply_option(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || Error::InvalidParameter(format!("{}: {}", key, value));

        match key {
            "samplerate" => {
                let hz = parse_samplerate(value).ok_or_else(invalid)?;
                if !codec::is_supported_rate(hz) {
                    return Err(Error::InvalidParameter(format!(
                        "samplerate: {} (supported: 100M, 80M, 10M, 625k, 39k)",
                        value
                    )));
                }
                self.samplerate = hz;
            }
            "vdiv1" | "vdiv2" => {
                let index = parse_vdiv(value).ok_or_else(invalid)?;
                self.voltage[channel_of(key)] = index;
            }
            "coupling1" | "coupling2" => {
                self.coupling[channel_of(key)] = Coupling::from_name(value).ok_or_else(invalid)?;
            }
            "channels" => match value {
                "1" => self.ch_enabled = [true, false],
                "2" => self.ch_enabled = [true, true],
                _ => return Err(invalid()),
            },
            "limit_samples" => {
                self.limit_samples = value.parse().map_err(|_| invalid())?;
            }
            "limit_msec" => {
                self.limit_msec = value.parse().map_err(|_| invalid())?;
            }
            _ => {
                return Err(Error::InvalidParameter(format!("unknown option: {}", key)));
            }
        }

        Ok(())
    }
}

fn channel_of(key: &str) -> usize {
    if key.ends_with('2') {
        1
    } else {
        0
    }
}

/// Parse options from key=value pairs
pub fn parse_options(options: &[(&str, &str)]) -> Result<AcquisitionConfig> {
    let mut config = AcquisitionConfig::default();

    for (key, value) in options {
        config.apply_option(key, value)?;
    }

    Ok(config)
}

/// Parse a sample rate (e.g., "10M", "625kHz", "39000")
pub fn parse_samplerate(s: &str) -> Option<u64> {
    let s = s.trim().to_ascii_lowercase();
    let s = s.strip_suffix("hz").unwrap_or(s.as_str());

    let (num, mult) = if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000.0)
    } else if let Some(n) = s.strip_suffix('k') {
        (n, 1_000.0)
    } else {
        (s, 1.0)
    };

    let parsed: f64 = num.trim().parse().ok()?;
    if parsed < 0.0 {
        return None;
    }
    Some((parsed * mult + 0.5) as u64)
}

/// Parse a voltage range (e.g., "50mV", "0.5V", "1V") into a range index
pub fn parse_vdiv(s: &str) -> Option<usize> {
    let s = s.trim().to_ascii_lowercase();

    let millivolt = if let Some(mv) = s.strip_suffix("mv") {
        mv.trim().parse().ok()?
    } else if let Some(v) = s.strip_suffix('v') {
        let parsed: f32 = v.trim().parse().ok()?;
        (parsed * 1000.0 + 0.5) as u32
    } else {
        // Bare numbers are millivolts
        s.parse().ok()?
    };

    codec::range_index_for_millivolts(millivolt)
}

/// Human readable summary of a configuration
pub fn describe(config: &AcquisitionConfig) -> String {
    let mut out = format!("{} Hz", config.samplerate);
    for ch in 0..NUM_CHANNELS {
        let mv = codec::vdiv_millivolts(config.voltage[ch])
            .map(|mv| format!("{}mV", mv))
            .unwrap_or_else(|| "?".to_string());
        out.push_str(&format!(
            ", CH{} {} {} {}",
            ch + 1,
            if config.ch_enabled[ch] { "on" } else { "off" },
            mv,
            config.coupling[ch]
        ));
    }
    out
}
