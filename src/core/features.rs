// Radio capability declaration and channel validation against it

use super::channel::Channel;
use super::constants::*;
use serde::{Deserialize, Serialize};

/// What a radio can store in a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioFeatures {
    pub has_bank: bool,
    pub has_dtcs: bool,
    pub has_dtcs_polarity: bool,
    pub has_ctone: bool,
    pub has_name: bool,
    pub has_offset: bool,
    pub has_tuning_step: bool,
    pub can_odd_split: bool,

    pub valid_modes: Vec<String>,
    pub valid_tmodes: Vec<String>,
    pub valid_duplexes: Vec<String>,
    pub valid_tuning_steps: Vec<f32>,
    /// (low_hz, high_hz) pairs, high exclusive
    pub valid_bands: Vec<(u64, u64)>,
    pub valid_skips: Vec<String>,
    pub valid_characters: String,
    pub valid_name_length: usize,
    pub valid_tones: Vec<f32>,
    pub valid_dtcs_codes: Vec<u16>,

    /// Inclusive (min, max) channel numbers
    pub memory_bounds: (u32, u32),
}

impl Default for RadioFeatures {
    fn default() -> Self {
        Self {
            has_bank: false,
            has_dtcs: true,
            has_dtcs_polarity: false,
            has_ctone: true,
            has_name: true,
            has_offset: true,
            has_tuning_step: true,
            can_odd_split: false,

            valid_modes: vec!["FM".to_string(), "AM".to_string()],
            valid_tmodes: TONE_MODES.iter().map(|s| s.to_string()).collect(),
            valid_duplexes: vec!["".to_string(), "+".to_string(), "-".to_string()],
            valid_tuning_steps: vec![5.0, 10.0, 12.5, 25.0],
            valid_bands: Vec::new(),
            valid_skips: vec!["".to_string(), "S".to_string()],
            valid_characters: String::new(),
            valid_name_length: 6,
            valid_tones: TONES.to_vec(),
            valid_dtcs_codes: DTCS_CODES.to_vec(),
            memory_bounds: (0, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationMessage {
    Warning(String),
    Error(String),
}

impl ValidationMessage {
    pub fn is_error(&self) -> bool {
        matches!(self, ValidationMessage::Error(_))
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationMessage::Warning(_))
    }

    pub fn message(&self) -> &str {
        match self {
            ValidationMessage::Warning(msg) | ValidationMessage::Error(msg) => msg,
        }
    }
}

impl RadioFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bands as "0.5-999MHz, ..."
    pub fn concise_bands(&self) -> String {
        let mhz = |hz: u64| {
            Channel::format_freq(hz)
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        };
        self.valid_bands
            .iter()
            .map(|(lo, hi)| format!("{}-{}MHz", mhz(*lo), mhz(*hi)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn in_band(&self, freq: u64) -> bool {
        self.valid_bands
            .iter()
            .any(|(lo, hi)| freq >= *lo && freq < *hi)
    }

    /// Check a channel against this radio's capabilities
    pub fn validate_channel(&self, ch: &Channel) -> Vec<ValidationMessage> {
        let mut msgs = Vec::new();

        let (lo, hi) = self.memory_bounds;
        if ch.number < lo || ch.number > hi {
            msgs.push(ValidationMessage::Error(format!(
                "Location {} is out of range {}-{}",
                ch.number, lo, hi
            )));
        }

        if ch.empty {
            return msgs;
        }

        if !self.valid_modes.is_empty() && !self.valid_modes.contains(&ch.mode) {
            msgs.push(ValidationMessage::Error(format!(
                "Mode {} not supported",
                ch.mode
            )));
        }

        if !self.valid_tmodes.is_empty() && !self.valid_tmodes.contains(&ch.tmode) {
            msgs.push(ValidationMessage::Error(format!(
                "Tone mode {} not supported",
                ch.tmode
            )));
        }

        if !self.valid_tones.is_empty() {
            if !self.valid_tones.contains(&ch.rtone) {
                msgs.push(ValidationMessage::Error(format!(
                    "Tone {:.1} not supported",
                    ch.rtone
                )));
            }
            if self.has_ctone && !self.valid_tones.contains(&ch.ctone) {
                msgs.push(ValidationMessage::Error(format!(
                    "Tone {:.1} not supported",
                    ch.ctone
                )));
            }
        }

        if self.has_dtcs
            && !self.valid_dtcs_codes.is_empty()
            && !self.valid_dtcs_codes.contains(&ch.dtcs)
        {
            msgs.push(ValidationMessage::Error(format!(
                "DTCS Code {:03} not supported",
                ch.dtcs
            )));
        }

        if !self.valid_duplexes.is_empty() && !self.valid_duplexes.contains(&ch.duplex) {
            msgs.push(ValidationMessage::Error(format!(
                "Duplex {} not supported",
                ch.duplex
            )));
        }

        if ch.duplex == "split" && !self.can_odd_split {
            msgs.push(ValidationMessage::Error(
                "Split operation not supported".to_string(),
            ));
        }

        if self.has_tuning_step
            && !self.valid_tuning_steps.is_empty()
            && !self.valid_tuning_steps.contains(&ch.tuning_step)
        {
            msgs.push(ValidationMessage::Error(format!(
                "Tuning step {:.2} not supported",
                ch.tuning_step
            )));
        }

        if !self.valid_skips.is_empty() && !self.valid_skips.contains(&ch.skip) {
            msgs.push(ValidationMessage::Error(format!(
                "Skip {} not supported",
                ch.skip
            )));
        }

        if !self.valid_bands.is_empty() {
            if !self.in_band(ch.freq) {
                msgs.push(ValidationMessage::Error(format!(
                    "Frequency {} is out of supported ranges {}",
                    ch.freq_str(),
                    self.concise_bands()
                )));
            }

            let tx_freq = match ch.duplex.as_str() {
                "split" => Some(ch.offset),
                "-" => Some(ch.freq.saturating_sub(ch.offset)),
                "+" => Some(ch.freq + ch.offset),
                _ => None,
            };
            if let Some(tx_freq) = tx_freq {
                if !self.in_band(tx_freq) {
                    msgs.push(ValidationMessage::Error(format!(
                        "TX freq {} is out of supported range",
                        Channel::format_freq(tx_freq)
                    )));
                }
            }
        }

        if self.has_name {
            if ch.name.chars().count() > self.valid_name_length {
                msgs.push(ValidationMessage::Error(format!(
                    "Name {:?} longer than {} characters",
                    ch.name, self.valid_name_length
                )));
            }
            if !self.valid_characters.is_empty() {
                if let Some(bad) = ch.name.chars().find(|c| !self.valid_characters.contains(*c)) {
                    msgs.push(ValidationMessage::Error(format!(
                        "Name character '{}' not supported",
                        bad
                    )));
                }
            }
        }

        msgs
    }

    /// Split validation messages into warnings and errors
    pub fn split_messages(msgs: &[ValidationMessage]) -> (Vec<String>, Vec<String>) {
        let warnings = msgs
            .iter()
            .filter(|m| m.is_warning())
            .map(|m| m.message().to_string())
            .collect();

        let errors = msgs
            .iter()
            .filter(|m| m.is_error())
            .map(|m| m.message().to_string())
            .collect();

        (warnings, errors)
    }
}
