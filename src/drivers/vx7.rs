// Yaesu VX-7 clone-mode driver

use super::traits::{CloneModeRadio, Radio, RadioError, RadioResult};
use crate::bitwise::{Accessor, AccessorMut, FieldPath, Schema, SchemaError};
use crate::clone::{ChecksumDescriptor, CloneProfile, TransferPolicy};
use crate::core::{dtcs_index, tone_index, Channel, RadioFeatures, DTCS_CODES, TONES};
use crate::memmap::{ImageError, MemoryImage};
use lazy_static::lazy_static;
use tracing::debug;

/// Image size in bytes
const MEMSIZE: usize = 16211;

/// First bytes of every image, sent by the radio to open a clone
const IDENT: &[u8] = b"\x0A\x01\x02\x06\x09";

const BLOCK_LENGTHS: &[usize] = &[10, 8, 16193];

/// Upload write size
const WRITE_CHUNK: usize = 8;

const BAUD_RATE: u32 = 19200;

const NUM_CHANNELS: u32 = 450;

/// Nested ranges, refreshed in this order
const CHECKSUMS: [ChecksumDescriptor; 3] = [
    ChecksumDescriptor::yaesu(0x0592, 0x0610),
    ChecksumDescriptor::yaesu(0x0612, 0x0690),
    ChecksumDescriptor::yaesu(0x0000, 0x3F51),
];

const MEM_FORMAT: &str = r#"
#seekto 0x0611;
u8 checksum1;

#seekto 0x0691;
u8 checksum2;

#seekto 0x1202;
struct {
  u8 even_pskip:1,
     even_skip:1,
     even_valid:1,
     even_masked:1,
     odd_pskip:1,
     odd_skip:1,
     odd_valid:1,
     odd_masked:1;
} flags[225];

#seekto 0x1322;
struct {
  u8   unknown1;
  u8   power:2,
       duplex:2,
       tune_step:4;
  bbcd freq[3];
  u8   zeros1:2,
       ones:2,
       zeros2:2,
       mode:2;
  u8   name[8];
  u8   zero;
  bbcd offset[3];
  u8   zeros3:2,
       tone:6;
  u8   zeros4:1,
       dcs:7;
  u8   zeros5:6,
       tmode:2;
  u8   charset;
} memory[450];

#seekto 0x3F52;
u8 checksum3;
"#;

const DUPLEX: [&str; 4] = ["", "-", "+", "split"];

/// Index 3 is "auto", shown as FM
const MODES: [&str; 4] = ["FM", "AM", "WFM", "FM"];

const TMODES: [&str; 4] = ["", "Tone", "TSQL", "DTCS"];

/// 100 kHz appears twice; writes use the first
const STEPS: [f32; 10] = [5.0, 10.0, 12.5, 15.0, 20.0, 25.0, 50.0, 100.0, 100.0, 9.0];

/// Name characters by stored index; the table continues with
/// `CHARSET_FILLER` entries that all read as '?'
const CHARSET: &str = concat!(
    "0123456789",
    " ",
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "abcdefghijklmnopqrstuvwxyz",
    ".,:;!\"#$%&'()*+-.=<>?@[?]^_\\{|}",
);

const CHARSET_FILLER: usize = 100;

const NAME_LEN: usize = 8;

/// Byte that ends a name shorter than eight characters
const NAME_END: u8 = 0xFF;

/// Flag bits for one channel of a shared flags byte
struct FlagPaths {
    pskip: FieldPath,
    skip: FieldPath,
    valid: FieldPath,
    masked: FieldPath,
}

impl FlagPaths {
    fn resolve(schema: &Schema, nibble: &str) -> Result<Self, SchemaError> {
        let path = |flag: &str| schema.path(&format!("flags.{}_{}", nibble, flag));
        Ok(Self {
            pskip: path("pskip")?,
            skip: path("skip")?,
            valid: path("valid")?,
            masked: path("masked")?,
        })
    }
}

/// Compiled layout with every path the driver touches resolved up front
struct Vx7Layout {
    schema: Schema,
    /// Channel 1 uses the odd bits, channel 2 the even bits
    flags: [FlagPaths; 2],
    memory: FieldPath,
    unknown1: FieldPath,
    power: FieldPath,
    duplex: FieldPath,
    tune_step: FieldPath,
    freq: FieldPath,
    ones: FieldPath,
    mode: FieldPath,
    name: FieldPath,
    offset: FieldPath,
    tone: FieldPath,
    dcs: FieldPath,
    tmode: FieldPath,
}

impl Vx7Layout {
    fn compile() -> Result<Self, SchemaError> {
        let schema = Schema::compile(MEM_FORMAT)?;
        let field = |name: &str| schema.path(&format!("memory.{}", name));

        Ok(Self {
            flags: [
                FlagPaths::resolve(&schema, "odd")?,
                FlagPaths::resolve(&schema, "even")?,
            ],
            memory: schema.path("memory")?,
            unknown1: field("unknown1")?,
            power: field("power")?,
            duplex: field("duplex")?,
            tune_step: field("tune_step")?,
            freq: field("freq")?,
            ones: field("ones")?,
            mode: field("mode")?,
            name: field("name")?,
            offset: field("offset")?,
            tone: field("tone")?,
            dcs: field("dcs")?,
            tmode: field("tmode")?,
            schema,
        })
    }

    /// Flag bits and flags-array index for a zero-based slot
    fn flags_for(&self, slot: usize) -> (&FlagPaths, usize) {
        (&self.flags[slot % 2], slot / 2)
    }
}

lazy_static! {
    static ref LAYOUT: Result<Vx7Layout, SchemaError> = Vx7Layout::compile();
}

fn charset_char(index: u8) -> Option<char> {
    let index = usize::from(index);
    CHARSET
        .chars()
        .nth(index)
        .or_else(|| (index < CHARSET.len() + CHARSET_FILLER).then_some('?'))
}

fn charset_index(c: char) -> Option<u8> {
    CHARSET.chars().position(|x| x == c).map(|i| i as u8)
}

/// Characters a name may use, each listed once
fn valid_characters() -> String {
    let mut chars = String::new();
    for c in CHARSET.chars() {
        if !chars.contains(c) {
            chars.push(c);
        }
    }
    chars
}

fn lookup<T: Copy>(table: &[T], index: u64, field: &'static str) -> RadioResult<T> {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i).copied())
        .ok_or(RadioError::UnknownIndex { field, index })
}

fn position<T: PartialEq>(table: &[T], value: &T) -> Option<u64> {
    table.iter().position(|x| x == value).map(|i| i as u64)
}

/// Kilohertz count that fits a 6-digit BCD field, truncating below 1 kHz
fn khz(hz: u64, field: &'static str) -> RadioResult<u64> {
    let khz = hz / 1000;
    if khz > 999_999 {
        return Err(RadioError::unsupported(field, Channel::format_freq(hz)));
    }
    Ok(khz)
}

/// Raw field values for one channel, all looked up before any byte changes
#[derive(Debug, PartialEq)]
struct EncodedChannel {
    freq: u64,
    offset: u64,
    tone: u64,
    dcs: u64,
    tmode: u64,
    duplex: u64,
    mode: u64,
    tune_step: u64,
    name: [u8; NAME_LEN],
    pskip: bool,
    skip: bool,
}

impl EncodedChannel {
    fn encode(ch: &Channel) -> RadioResult<Self> {
        let (pskip, skip) = match ch.skip.as_str() {
            "" => (false, false),
            "S" => (false, true),
            "P" => (true, false),
            other => return Err(RadioError::unsupported("skip", other)),
        };

        if ch.name.chars().count() > NAME_LEN {
            return Err(RadioError::unsupported("name", &ch.name));
        }
        let mut name = [0u8; NAME_LEN];
        let padded = format!("{:<width$}", ch.name, width = NAME_LEN);
        for (slot, c) in name.iter_mut().zip(padded.chars()) {
            *slot = charset_index(c)
                .ok_or_else(|| RadioError::unsupported("name character", c))?;
        }

        Ok(Self {
            freq: khz(ch.freq, "frequency")?,
            offset: khz(ch.offset, "offset")?,
            tone: tone_index(ch.rtone)
                .map(|i| i as u64)
                .ok_or_else(|| RadioError::unsupported("tone", ch.rtone))?,
            dcs: dtcs_index(ch.dtcs)
                .map(|i| i as u64)
                .ok_or_else(|| RadioError::unsupported("DTCS code", ch.dtcs))?,
            tmode: position(&TMODES, &ch.tmode.as_str())
                .ok_or_else(|| RadioError::unsupported("tone mode", &ch.tmode))?,
            duplex: position(&DUPLEX, &ch.duplex.as_str())
                .ok_or_else(|| RadioError::unsupported("duplex", &ch.duplex))?,
            mode: position(&MODES, &ch.mode.as_str())
                .ok_or_else(|| RadioError::unsupported("mode", &ch.mode))?,
            tune_step: position(&STEPS, &ch.tuning_step)
                .ok_or_else(|| RadioError::unsupported("tuning step", ch.tuning_step))?,
            name,
            pskip,
            skip,
        })
    }
}

/// Yaesu VX-7 handheld
pub struct Vx7Radio {
    layout: &'static Vx7Layout,
    image: Option<MemoryImage>,
}

impl Vx7Radio {
    pub const VENDOR: &'static str = "Yaesu";
    pub const MODEL: &'static str = "VX-7";

    pub fn new() -> RadioResult<Self> {
        let layout = LAYOUT.as_ref().map_err(|e| e.clone())?;
        Ok(Self {
            layout,
            image: None,
        })
    }

    /// Driver with `image` already loaded
    pub fn with_image(image: MemoryImage) -> RadioResult<Self> {
        let mut radio = Self::new()?;
        radio.load_image(image)?;
        Ok(radio)
    }

    /// Zero-based slot for a channel number
    fn slot(number: u32) -> RadioResult<usize> {
        if !(1..=NUM_CHANNELS).contains(&number) {
            return Err(RadioError::InvalidMemory(number));
        }
        Ok((number - 1) as usize)
    }

    fn loaded(&self) -> RadioResult<&MemoryImage> {
        self.image.as_ref().ok_or(RadioError::NoImage)
    }

    /// Zero the slot and write the values a fresh channel starts with
    fn wipe_channel(layout: &Vx7Layout, acc: &mut AccessorMut<'_>, slot: usize) -> RadioResult<()> {
        let whole = layout.memory.at(&[slot])?;
        acc.set_raw(&whole, &vec![0u8; whole.len])?;
        acc.set(&layout.unknown1.at(&[slot])?, 0x05)?;
        acc.set(&layout.ones.at(&[slot])?, 0b11)?;
        acc.set(&layout.power.at(&[slot])?, 0b11)?;
        debug!("Wiped VX-7 slot {}", slot);
        Ok(())
    }
}

impl Radio for Vx7Radio {
    fn vendor(&self) -> &str {
        Self::VENDOR
    }

    fn model(&self) -> &str {
        Self::MODEL
    }

    fn get_features(&self) -> RadioFeatures {
        let mut modes: Vec<String> = Vec::new();
        for mode in MODES {
            if !modes.iter().any(|m| m == mode) {
                modes.push(mode.to_string());
            }
        }

        let mut steps: Vec<f32> = Vec::new();
        for step in STEPS {
            if !steps.contains(&step) {
                steps.push(step);
            }
        }

        RadioFeatures {
            has_bank: false,
            has_dtcs: true,
            has_dtcs_polarity: false,
            has_ctone: false,
            has_name: true,
            has_offset: true,
            has_tuning_step: true,
            can_odd_split: true,
            valid_modes: modes,
            valid_tmodes: TMODES.iter().map(|s| s.to_string()).collect(),
            valid_duplexes: DUPLEX.iter().map(|s| s.to_string()).collect(),
            valid_tuning_steps: steps,
            valid_bands: vec![(500_000, 999_000_000)],
            valid_skips: vec!["".to_string(), "S".to_string(), "P".to_string()],
            valid_characters: valid_characters(),
            valid_name_length: NAME_LEN,
            valid_tones: TONES.to_vec(),
            valid_dtcs_codes: DTCS_CODES.to_vec(),
            memory_bounds: (1, NUM_CHANNELS),
        }
    }

    fn get_channel(&self, number: u32) -> RadioResult<Channel> {
        let slot = Self::slot(number)?;
        let l = self.layout;
        let acc = Accessor::bind(&l.schema, self.loaded()?)?;

        let (flags, fi) = l.flags_for(slot);
        let used = acc.get(&flags.masked.at(&[fi])?)? != 0 && acc.get(&flags.valid.at(&[fi])?)? != 0;
        if !used {
            return Ok(Channel::new_empty(number));
        }

        let mut ch = Channel::new(number);
        ch.freq = acc.get(&l.freq.at(&[slot])?)? * 1000;
        ch.offset = acc.get(&l.offset.at(&[slot])?)? * 1000;
        ch.rtone = lookup(&TONES, acc.get(&l.tone.at(&[slot])?)?, "tone")?;
        ch.ctone = ch.rtone;
        ch.tmode = lookup(&TMODES, acc.get(&l.tmode.at(&[slot])?)?, "tone mode")?.to_string();
        ch.duplex = lookup(&DUPLEX, acc.get(&l.duplex.at(&[slot])?)?, "duplex")?.to_string();
        ch.mode = lookup(&MODES, acc.get(&l.mode.at(&[slot])?)?, "mode")?.to_string();
        ch.dtcs = lookup(&DTCS_CODES, acc.get(&l.dcs.at(&[slot])?)?, "DTCS code")?;
        ch.tuning_step = lookup(&STEPS, acc.get(&l.tune_step.at(&[slot])?)?, "tuning step")?;

        ch.skip = if acc.get(&flags.pskip.at(&[fi])?)? != 0 {
            "P".to_string()
        } else if acc.get(&flags.skip.at(&[fi])?)? != 0 {
            "S".to_string()
        } else {
            String::new()
        };

        let mut name = String::new();
        for &b in acc.get_raw(&l.name.at(&[slot])?)? {
            if b == NAME_END {
                break;
            }
            name.push(charset_char(b).ok_or(RadioError::UnknownIndex {
                field: "name character",
                index: u64::from(b),
            })?);
        }
        ch.name = name.trim_end_matches(' ').to_string();

        Ok(ch)
    }

    fn set_channel(&mut self, ch: &Channel) -> RadioResult<()> {
        let slot = Self::slot(ch.number)?;
        let encoded = if ch.empty {
            None
        } else {
            Some(EncodedChannel::encode(ch)?)
        };

        let l = self.layout;
        let image = self.image.as_mut().ok_or(RadioError::NoImage)?;
        let mut acc = AccessorMut::bind(&l.schema, image)?;

        let (flags, fi) = l.flags_for(slot);
        let masked = flags.masked.at(&[fi])?;
        let valid = flags.valid.at(&[fi])?;

        let Some(enc) = encoded else {
            // Leave the slot bytes in place
            acc.set(&masked, 0)?;
            acc.set(&valid, 0)?;
            debug!("Cleared VX-7 channel {}", ch.number);
            return Ok(());
        };

        if acc.get(&valid)? == 0 {
            Self::wipe_channel(l, &mut acc, slot)?;
        }

        acc.set(&l.freq.at(&[slot])?, enc.freq)?;
        acc.set(&l.offset.at(&[slot])?, enc.offset)?;
        acc.set(&l.tone.at(&[slot])?, enc.tone)?;
        acc.set(&l.tmode.at(&[slot])?, enc.tmode)?;
        acc.set(&l.duplex.at(&[slot])?, enc.duplex)?;
        acc.set(&l.mode.at(&[slot])?, enc.mode)?;
        acc.set(&l.dcs.at(&[slot])?, enc.dcs)?;
        acc.set(&l.tune_step.at(&[slot])?, enc.tune_step)?;
        acc.set_raw(&l.name.at(&[slot])?, &enc.name)?;

        acc.set(&masked, 1)?;
        acc.set(&valid, 1)?;
        acc.set(&flags.pskip.at(&[fi])?, u64::from(enc.pskip))?;
        acc.set(&flags.skip.at(&[fi])?, u64::from(enc.skip))?;

        debug!("Stored VX-7 channel {}: {}", ch.number, ch);
        Ok(())
    }
}

impl CloneModeRadio for Vx7Radio {
    fn get_memsize(&self) -> usize {
        MEMSIZE
    }

    fn clone_profile(&self) -> CloneProfile {
        CloneProfile {
            ident: IDENT.to_vec(),
            memsize: MEMSIZE,
            block_lengths: BLOCK_LENGTHS.to_vec(),
            checksums: CHECKSUMS.to_vec(),
            baud_rate: BAUD_RATE,
            policy: TransferPolicy::default().with_chunk_size(WRITE_CHUNK),
        }
    }

    fn load_image(&mut self, image: MemoryImage) -> RadioResult<()> {
        if image.len() != MEMSIZE {
            return Err(ImageError::SizeMismatch {
                expected: MEMSIZE,
                actual: image.len(),
            }
            .into());
        }
        debug!("Loaded {}-byte VX-7 image", image.len());
        self.image = Some(image);
        Ok(())
    }

    fn image(&self) -> Option<&MemoryImage> {
        self.image.as_ref()
    }

    fn image_mut(&mut self) -> Option<&mut MemoryImage> {
        self.image.as_mut()
    }

    fn get_raw_channel(&self, number: u32) -> RadioResult<Vec<u8>> {
        let slot = Self::slot(number)?;
        let acc = Accessor::bind(&self.layout.schema, self.loaded()?)?;
        Ok(acc.get_raw(&self.layout.memory.at(&[slot])?)?.to_vec())
    }

    fn match_model(data: &[u8]) -> bool {
        data.len() == MEMSIZE && data.starts_with(IDENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clone::{update_all, verify_all, CloneError, CloneSession};
    use crate::serial::mock::MockLink;
    use std::time::Duration;

    const ACK: u8 = 0x06;

    fn blank_image() -> MemoryImage {
        let mut image = MemoryImage::new_zeroed(MEMSIZE);
        image.set_bytes(0, IDENT).unwrap();
        image
    }

    fn radio() -> Vx7Radio {
        Vx7Radio::with_image(blank_image()).unwrap()
    }

    fn simplex(number: u32) -> Channel {
        let mut ch = Channel::new(number);
        ch.freq = 146_520_000;
        ch.mode = "FM".to_string();
        ch
    }

    fn fast_session(radio: &Vx7Radio) -> CloneSession {
        let mut profile = radio.clone_profile();
        profile.policy = profile
            .policy
            .with_block_timeout(Duration::from_millis(5))
            .with_retries(1)
            .with_chunk_delay(Duration::ZERO);
        CloneSession::new(profile).unwrap()
    }

    #[test]
    fn test_layout_positions() {
        let layout = LAYOUT.as_ref().unwrap();
        assert_eq!(layout.schema.extent(), MEMSIZE);
        assert_eq!(layout.memory.size(), 22);
        assert_eq!(layout.memory.at(&[0]).unwrap().offset, 0x1322);
        assert_eq!(layout.freq.at(&[1]).unwrap().offset, 0x1322 + 22 + 2);
        assert_eq!(layout.schema.locate("checksum3").unwrap().offset, 0x3F52);
        assert_eq!(layout.schema.locate("flags[224]").unwrap().offset, 0x1202 + 224);
    }

    #[test]
    fn test_charset() {
        assert_eq!(CHARSET.len(), 94);
        assert_eq!(charset_char(0), Some('0'));
        assert_eq!(charset_char(10), Some(' '));
        assert_eq!(charset_char(11), Some('A'));
        assert_eq!(charset_char(150), Some('?'));
        assert_eq!(charset_char(194), None);
        assert_eq!(charset_index('.'), Some(63));
        assert_eq!(charset_index('~'), None);
        assert!(!valid_characters().contains('~'));
    }

    #[test]
    fn test_empty_channel_on_zero_image() {
        let radio = radio();
        let ch = radio.get_channel(1).unwrap();
        assert!(ch.empty);
        assert_eq!(ch.number, 1);
    }

    #[test]
    fn test_set_get_simplex() {
        let mut radio = radio();
        let flags_before = radio.image().unwrap().byte(0x1202).unwrap();

        radio.set_channel(&simplex(1)).unwrap();
        let back = radio.get_channel(1).unwrap();
        assert_eq!(back, simplex(1));

        // Channel 1 lives in the low nibble of flags[0]
        let flags_after = radio.image().unwrap().byte(0x1202).unwrap();
        assert_eq!(flags_after & 0xF0, flags_before & 0xF0);
        assert_eq!(flags_after & 0x03, 0x03);
        assert!(radio.get_channel(2).unwrap().empty);
    }

    #[test]
    fn test_neighbour_nibble_untouched() {
        let mut radio = radio();
        let mut two = simplex(2);
        two.skip = "S".to_string();
        radio.set_channel(&two).unwrap();

        let before = radio.image().unwrap().byte(0x1202).unwrap();
        radio.set_channel(&simplex(1)).unwrap();
        radio.delete_channel(1).unwrap();
        assert_eq!(radio.image().unwrap().byte(0x1202).unwrap() & 0xF0, before & 0xF0);
        assert_eq!(radio.get_channel(2).unwrap(), two);
    }

    #[test]
    fn test_round_trip() {
        let mut radio = radio();

        let mut ch = Channel::new(450);
        ch.freq = 446_000_000;
        ch.offset = 5_000_000;
        ch.duplex = "-".to_string();
        ch.tmode = "DTCS".to_string();
        ch.rtone = 151.4;
        ch.ctone = 151.4;
        ch.dtcs = 754;
        ch.mode = "WFM".to_string();
        ch.tuning_step = 12.5;
        ch.skip = "P".to_string();
        ch.name = "Base 1".to_string();
        radio.set_channel(&ch).unwrap();
        assert_eq!(radio.get_channel(450).unwrap(), ch);

        let mut split = simplex(37);
        split.duplex = "split".to_string();
        split.offset = 445_500_000;
        split.tuning_step = 9.0;
        split.name = "AbcDefGh".to_string();
        radio.set_channel(&split).unwrap();
        assert_eq!(radio.get_channel(37).unwrap(), split);

        assert_eq!(radio.get_channels().unwrap().len(), 2);
    }

    #[test]
    fn test_frequency_truncated_to_khz() {
        let mut radio = radio();
        let mut ch = simplex(3);
        ch.freq = 146_520_999;
        radio.set_channel(&ch).unwrap();
        assert_eq!(radio.get_channel(3).unwrap().freq, 146_520_000);
    }

    #[test]
    fn test_unsupported_values_write_nothing() {
        let mut radio = radio();
        let before = radio.image().unwrap().clone();

        let cases: Vec<(&str, Box<dyn Fn(&mut Channel)>)> = vec![
            ("tone", Box::new(|c: &mut Channel| c.rtone = 88.4)),
            ("DTCS code", Box::new(|c: &mut Channel| c.dtcs = 24)),
            ("tone mode", Box::new(|c: &mut Channel| c.tmode = "Cross".to_string())),
            ("duplex", Box::new(|c: &mut Channel| c.duplex = "off".to_string())),
            ("mode", Box::new(|c: &mut Channel| c.mode = "USB".to_string())),
            ("tuning step", Box::new(|c: &mut Channel| c.tuning_step = 6.25)),
            ("skip", Box::new(|c: &mut Channel| c.skip = "X".to_string())),
            ("name", Box::new(|c: &mut Channel| c.name = "NINECHARS".to_string())),
            ("name character", Box::new(|c: &mut Channel| c.name = "A~B".to_string())),
            ("frequency", Box::new(|c: &mut Channel| c.freq = 1_300_000_000)),
        ];

        for (field, mutate) in cases {
            let mut ch = simplex(5);
            mutate(&mut ch);
            match radio.set_channel(&ch) {
                Err(RadioError::UnsupportedValue { field: f, .. }) => assert_eq!(f, field),
                other => panic!("{}: expected UnsupportedValue, got {:?}", field, other),
            }
        }

        assert_eq!(radio.image().unwrap(), &before);
    }

    #[test]
    fn test_fresh_slot_defaults() {
        let mut radio = radio();
        radio
            .image_mut()
            .unwrap()
            .fill(0x1322 + 22 * 9, 22, 0xAA)
            .unwrap();

        radio.set_channel(&simplex(10)).unwrap();
        let raw = radio.get_raw_channel(10).unwrap();
        assert_eq!(raw.len(), 22);
        assert_eq!(raw[0], 0x05);
        // power 0b11, duplex 0, step 0
        assert_eq!(raw[1], 0xC0);
        assert_eq!(&raw[2..5], &[0x14, 0x65, 0x20]);
        // ones bits set, mode FM
        assert_eq!(raw[5], 0x30);
        // Untouched padding was zeroed
        assert_eq!(raw[14], 0);
        assert_eq!(raw[21], 0);
    }

    #[test]
    fn test_delete_keeps_raw_bytes() {
        let mut radio = radio();
        let mut ch = simplex(4);
        ch.name = "KEEP".to_string();
        radio.set_channel(&ch).unwrap();
        let raw = radio.get_raw_channel(4).unwrap();

        radio.delete_channel(4).unwrap();
        assert!(radio.get_channel(4).unwrap().empty);
        assert_eq!(radio.get_raw_channel(4).unwrap(), raw);

        radio.set_channel(&ch).unwrap();
        assert_eq!(radio.get_channel(4).unwrap(), ch);
    }

    #[test]
    fn test_decode_rejects_unknown_index() {
        let mut radio = radio();
        radio.set_channel(&simplex(1)).unwrap();
        // tone index 63
        radio.image_mut().unwrap().set_byte(0x1322 + 18, 0x3F).unwrap();
        assert!(matches!(
            radio.get_channel(1),
            Err(RadioError::UnknownIndex { field: "tone", index: 63 })
        ));
    }

    #[test]
    fn test_bounds_and_missing_image() {
        let mut radio = radio();
        assert!(matches!(radio.get_channel(0), Err(RadioError::InvalidMemory(0))));
        assert!(matches!(
            radio.set_channel(&simplex(451)),
            Err(RadioError::InvalidMemory(451))
        ));

        let bare = Vx7Radio::new().unwrap();
        assert!(matches!(bare.get_channel(1), Err(RadioError::NoImage)));

        assert!(matches!(
            radio.load_image(MemoryImage::new_zeroed(100)),
            Err(RadioError::Image(ImageError::SizeMismatch { .. }))
        ));
    }

    #[test]
    fn test_features() {
        let radio = radio();
        let rf = radio.get_features();
        assert_eq!(rf.valid_modes, vec!["FM", "AM", "WFM"]);
        assert_eq!(rf.valid_tuning_steps.len(), 9);
        assert_eq!(rf.memory_bounds, (1, 450));
        assert!(rf.can_odd_split);
        assert!(!rf.has_ctone);
        assert_eq!(rf.valid_name_length, 8);

        let ch = simplex(1);
        assert!(radio.validate_channel(&ch).is_empty());
    }

    #[test]
    fn test_filter_name() {
        let radio = radio();
        assert_eq!(radio.filter_name("  Base 1  "), "Base 1");
        assert_eq!(radio.filter_name("NINECHARS"), "NINECHAR");
        assert_eq!(radio.filter_name("A~B"), "AB");
        assert_eq!(radio.filter_name("Rpt 146.52"), "Rpt 146.");

        let mut radio = radio;
        let mut ch = simplex(3);
        ch.name = radio.filter_name("Repeater~Input");
        radio.set_channel(&ch).unwrap();
        assert_eq!(radio.get_channel(3).unwrap().name, "Repeater");
    }

    #[test]
    fn test_match_model() {
        let image = blank_image();
        assert!(Vx7Radio::match_model(image.as_bytes()));
        assert!(!Vx7Radio::match_model(&image.as_bytes()[..100]));

        let mut other = image.to_vec();
        other[0] = 0x0B;
        assert!(!Vx7Radio::match_model(&other));
    }

    #[tokio::test]
    async fn test_sync_out_refreshes_checksums() {
        let mut radio = radio();
        radio.set_channel(&simplex(1)).unwrap();

        let mut link = MockLink::with_response(&[ACK, ACK, ACK]);
        let session = fast_session(&radio);
        radio.sync_out(&mut link, session).await.unwrap();

        let image = radio.image().unwrap();
        verify_all(&CHECKSUMS, image).unwrap();
        assert_eq!(link.written(), image.to_vec());
        // 5-byte ident, then 8-byte chunks
        assert_eq!(link.writes()[0], IDENT.to_vec());
        assert!(link.writes()[1..].iter().all(|w| w.len() <= WRITE_CHUNK));
    }

    #[tokio::test]
    async fn test_sync_in() {
        let mut source = radio();
        let mut ch = simplex(12);
        ch.name = "DL".to_string();
        source.set_channel(&ch).unwrap();
        let mut image = source.image().unwrap().clone();
        update_all(&CHECKSUMS, &mut image).unwrap();

        let bytes = image.as_bytes();
        let mut link = MockLink::new();
        link.push_bytes(&bytes[..10])
            .push_bytes(&bytes[10..18])
            .push_bytes(&bytes[18..]);

        let mut radio = Vx7Radio::new().unwrap();
        let session = fast_session(&radio);
        radio.sync_in(&mut link, session).await.unwrap();

        assert_eq!(radio.get_channel(12).unwrap(), ch);
        assert_eq!(link.written(), vec![ACK; 3]);
    }

    #[tokio::test]
    async fn test_sync_in_failure_keeps_old_image() {
        let mut radio = radio();
        radio.set_channel(&simplex(1)).unwrap();

        // Radio goes quiet after block 1
        let mut link = MockLink::new();
        link.push_bytes(&blank_image().as_bytes()[..10]);

        let session = fast_session(&radio);
        let err = radio.sync_in(&mut link, session).await.unwrap_err();
        assert!(matches!(
            err,
            RadioError::Clone(CloneError::BlockTransfer { block: 1, .. })
        ));
        assert_eq!(radio.get_channel(1).unwrap(), simplex(1));
    }
}
