//! Register codec
//!
//! Maps sample rates and voltage ranges onto the register values the device
//! firmware understands. Unknown inputs never produce an error: the last
//! table entry is used instead and the miss is logged, so a configuration
//! step always has something to write.

use crate::protocol::NUM_CHANNELS;

/// Multiplier between the base vdiv unit and the table entries
pub const VDIV_MULTIPLIER: u32 = 10;

/// A supported sample rate and its register encoding
#[derive(Debug, Clone, Copy)]
pub struct SampleRate {
    /// Rate in Hz
    pub hz: u64,
    /// Value written to the sample rate register
    pub reg: u8,
}

/// Supported sample rates, fastest first
pub const SAMPLE_RATES: &[SampleRate] = &[
    SampleRate {
        hz: 100_000_000,
        reg: 0x10,
    },
    SampleRate {
        hz: 80_000_000,
        reg: 0x11,
    },
    SampleRate {
        hz: 10_000_000,
        reg: 0x1c,
    },
    SampleRate {
        hz: 625_000,
        reg: 0x18,
    },
    SampleRate {
        hz: 39_000,
        reg: 0x1b,
    },
];

/// Voltage ranges in millivolts, indexed by range index
pub const VDIV_MILLIVOLTS: [u32; 5] = [50, 100, 200, 500, 1000];

/// Per-channel register values, indexed by range index
pub const VDIV_REGS: [[u8; 5]; NUM_CHANNELS] = [
    [0x08, 0x04, 0x00, 0x06, 0x02],
    [0x20, 0x10, 0x00, 0x12, 0x02],
];

/// Encode a sample rate for the sample rate register.
///
/// Rates that are not in [`SAMPLE_RATES`] fall back to the slowest rate.
pub fn sample_rate_to_register(rate_hz: u64) -> u8 {
    if let Some(rate) = SAMPLE_RATES.iter().find(|r| r.hz == rate_hz) {
        return rate.reg;
    }

    log::error!("Failed to convert samplerate: {}", rate_hz);
    SAMPLE_RATES[SAMPLE_RATES.len() - 1].reg
}

/// Encode a voltage range index for a channel's vdiv register.
///
/// An out-of-range index falls back to the last (widest) range of that
/// channel. Channels past the second use the second channel's table.
pub fn voltage_range_to_register(channel: usize, range_index: usize) -> u8 {
    let table = match VDIV_REGS.get(channel) {
        Some(table) => table,
        None => {
            log::error!("No vdiv table for channel {}", channel);
            &VDIV_REGS[NUM_CHANNELS - 1]
        }
    };

    match table.get(range_index) {
        Some(&reg) => reg,
        None => {
            log::error!("Failed to convert vdiv: {}", range_index);
            table[table.len() - 1]
        }
    }
}

/// Millivolts for a range index
pub fn vdiv_millivolts(range_index: usize) -> Option<u32> {
    VDIV_MILLIVOLTS.get(range_index).copied()
}

/// Range index for an exact millivolt value
pub fn range_index_for_millivolts(millivolt: u32) -> Option<usize> {
    VDIV_MILLIVOLTS.iter().position(|&mv| mv == millivolt)
}

/// Whether a rate has an exact register encoding
pub fn is_supported_rate(rate_hz: u64) -> bool {
    SAMPLE_RATES.iter().any(|r| r.hz == rate_hz)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_rate_table() {
        assert_eq!(sample_rate_to_register(100_000_000), 0x10);
        assert_eq!(sample_rate_to_register(80_000_000), 0x11);
        assert_eq!(sample_rate_to_register(10_000_000), 0x1c);
        assert_eq!(sample_rate_to_register(625_000), 0x18);
        assert_eq!(sample_rate_to_register(39_000), 0x1b);
    }

    #[test]
    fn test_unknown_sample_rate_uses_last_entry() {
        for rate in [0, 1, 38_999, 40_000, 1_000_000, 50_000_000, u64::MAX] {
            assert_eq!(sample_rate_to_register(rate), 0x1b, "rate {}", rate);
        }
    }

    #[test]
    fn test_vdiv_tables() {
        let ch1: [u8; 5] = core::array::from_fn(|i| voltage_range_to_register(0, i));
        let ch2: [u8; 5] = core::array::from_fn(|i| voltage_range_to_register(1, i));
        assert_eq!(ch1, [0x08, 0x04, 0x00, 0x06, 0x02]);
        assert_eq!(ch2, [0x20, 0x10, 0x00, 0x12, 0x02]);
    }

    #[test]
    fn test_vdiv_out_of_range_uses_last_entry() {
        for i in [5, 6, 100, usize::MAX] {
            assert_eq!(voltage_range_to_register(0, i), 0x02);
            assert_eq!(voltage_range_to_register(1, i), 0x02);
        }
        // Unknown channel falls back to the second channel's table
        assert_eq!(voltage_range_to_register(7, 0), 0x20);
    }

    #[test]
    fn test_millivolt_lookup() {
        assert_eq!(vdiv_millivolts(0), Some(50));
        assert_eq!(vdiv_millivolts(4), Some(1000));
        assert_eq!(vdiv_millivolts(5), None);
        assert_eq!(range_index_for_millivolts(500), Some(3));
        assert_eq!(range_index_for_millivolts(2000), None);
        assert!(is_supported_rate(625_000));
        assert!(!is_supported_rate(1));
    }
}
