// Vendor-neutral channel record exchanged with drivers

use super::constants::{is_valid_skip, is_valid_tone, DUPLEX_MODES, TONE_MODES};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChannelError {
    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Invalid tone: {0}")]
    InvalidTone(f32),

    #[error("Invalid tone mode: {0}")]
    InvalidToneMode(String),

    #[error("Invalid duplex: {0}")]
    InvalidDuplex(String),

    #[error("Invalid skip value: {0}")]
    InvalidSkip(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;

/// One memory channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// 1-based channel number
    pub number: u32,

    pub name: String,

    /// Receive frequency in Hz
    pub freq: u64,

    /// Offset (or transmit frequency for "split") in Hz
    pub offset: u64,

    /// "", "Tone", "TSQL" or "DTCS"
    pub tmode: String,

    /// "", "+", "-" or "split"
    pub duplex: String,

    /// Transmit tone in Hz
    pub rtone: f32,

    /// Receive tone in Hz
    pub ctone: f32,

    pub dtcs: u16,

    /// Modulation, e.g. "FM", "AM", "WFM"
    pub mode: String,

    /// Tuning step in kHz
    pub tuning_step: f32,

    /// "", "S" (skip) or "P" (priority skip)
    pub skip: String,

    pub empty: bool,
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Channel {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            name: String::new(),
            freq: 0,
            offset: 600_000,
            tmode: String::new(),
            duplex: String::new(),
            rtone: 88.5,
            ctone: 88.5,
            dtcs: 23,
            mode: "FM".to_string(),
            tuning_step: 5.0,
            skip: String::new(),
            empty: false,
        }
    }

    pub fn new_empty(number: u32) -> Self {
        Self {
            empty: true,
            ..Self::new(number)
        }
    }

    /// Parse "146.520", "146.520 MHz" or "146520 kHz" into Hz
    pub fn parse_freq(freqstr: &str) -> Result<u64> {
        let freqstr = freqstr.trim();
        let invalid = || ChannelError::InvalidFrequency(freqstr.to_string());

        if freqstr.is_empty() {
            return Ok(0);
        }

        if let Some(stripped) = freqstr.strip_suffix("MHz") {
            return Self::parse_freq(stripped);
        }

        if let Some(stripped) = freqstr.strip_suffix("kHz") {
            let khz: u64 = stripped.trim().parse().map_err(|_| invalid())?;
            return khz.checked_mul(1000).ok_or_else(invalid);
        }

        match freqstr.split_once('.') {
            Some((mhz, fraction)) => {
                if fraction.len() > 6 || fraction.contains('.') {
                    return Err(invalid());
                }
                let mhz: u64 = if mhz.is_empty() {
                    0
                } else {
                    mhz.parse().map_err(|_| invalid())?
                };
                let hz: u64 = format!("{:0<6}", fraction).parse().map_err(|_| invalid())?;
                mhz.checked_mul(1_000_000)
                    .and_then(|hz_whole| hz_whole.checked_add(hz))
                    .ok_or_else(invalid)
            }
            None => {
                let mhz: u64 = freqstr.parse().map_err(|_| invalid())?;
                mhz.checked_mul(1_000_000).ok_or_else(invalid)
            }
        }
    }

    /// Format Hz as MHz with six decimals ("146.520000")
    pub fn format_freq(freq: u64) -> String {
        format!("{}.{:06}", freq / 1_000_000, freq % 1_000_000)
    }

    pub fn freq_str(&self) -> String {
        Self::format_freq(self.freq)
    }

    /// Field checks that do not depend on a particular radio
    pub fn validate(&self) -> Result<()> {
        if !TONE_MODES.contains(&self.tmode.as_str()) {
            return Err(ChannelError::InvalidToneMode(self.tmode.clone()));
        }
        if !DUPLEX_MODES.contains(&self.duplex.as_str()) {
            return Err(ChannelError::InvalidDuplex(self.duplex.clone()));
        }
        if !is_valid_tone(self.rtone) {
            return Err(ChannelError::InvalidTone(self.rtone));
        }
        if !is_valid_tone(self.ctone) {
            return Err(ChannelError::InvalidTone(self.ctone));
        }
        if !is_valid_skip(&self.skip) {
            return Err(ChannelError::InvalidSkip(self.skip.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.empty {
            return write!(f, "Channel {}: (empty)", self.number);
        }

        let tenc = if self.tmode == "Tone" { "*" } else { " " };
        let tsql = if self.tmode == "TSQL" { "*" } else { " " };
        let dtcs = if self.tmode == "DTCS" { "*" } else { " " };
        let dup = if self.duplex.is_empty() {
            "/"
        } else {
            &self.duplex
        };

        write!(
            f,
            "Channel {}: {}{}{} {} ({}) r{:.1}{} c{:.1}{} d{:03}{} [{:.2}]{}",
            self.number,
            self.freq_str(),
            dup,
            Self::format_freq(self.offset),
            self.mode,
            self.name,
            self.rtone,
            tenc,
            self.ctone,
            tsql,
            self.dtcs,
            dtcs,
            self.tuning_step,
            if self.skip.is_empty() {
                String::new()
            } else {
                format!(" skip={}", self.skip)
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_freq() {
        assert_eq!(Channel::parse_freq("146.520").unwrap(), 146_520_000);
        assert_eq!(Channel::parse_freq("146.520 MHz").unwrap(), 146_520_000);
        assert_eq!(Channel::parse_freq("146520 kHz").unwrap(), 146_520_000);
        assert_eq!(Channel::parse_freq("146").unwrap(), 146_000_000);
        assert_eq!(Channel::parse_freq(".520").unwrap(), 520_000);
        assert_eq!(Channel::parse_freq("").unwrap(), 0);
        assert!(Channel::parse_freq("146.5200001").is_err());
        assert!(Channel::parse_freq("abc").is_err());
    }

    #[test]
    fn test_parse_freq_too_large() {
        for text in [
            "18446744073709551",
            "18446744073709552 kHz",
            "18446744073710.5",
        ] {
            assert_eq!(
                Channel::parse_freq(text),
                Err(ChannelError::InvalidFrequency(text.to_string()))
            );
        }
    }

    #[test]
    fn test_format_freq() {
        assert_eq!(Channel::format_freq(146_520_000), "146.520000");
        assert_eq!(Channel::format_freq(520_000), "0.520000");
    }

    #[test]
    fn test_channel_creation() {
        let ch = Channel::new(5);
        assert_eq!(ch.number, 5);
        assert!(!ch.empty);
        assert_eq!(ch.mode, "FM");
        assert!(ch.validate().is_ok());

        let empty = Channel::new_empty(7);
        assert!(empty.empty);
        assert_eq!(empty.to_string(), "Channel 7: (empty)");
    }

    #[test]
    fn test_validate() {
        let mut ch = Channel::new(1);
        ch.tmode = "Cross".to_string();
        assert_eq!(
            ch.validate(),
            Err(ChannelError::InvalidToneMode("Cross".to_string()))
        );

        let mut ch = Channel::new(1);
        ch.skip = "Q".to_string();
        assert!(ch.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut ch = Channel::new(12);
        ch.freq = 446_000_000;
        ch.name = "SIMPLEX".to_string();
        let json = serde_json::to_string(&ch).unwrap();
        let back: Channel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ch);
    }
}
