// Radio driver traits

use crate::bitwise::{AccessError, SchemaError};
use crate::clone::{update_all, CloneError, CloneProfile, CloneSession};
use crate::core::{Channel, RadioFeatures, ValidationMessage};
use crate::memmap::{ImageError, MemoryImage};
use crate::serial::{CloneLink, SerialError};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum RadioError {
    #[error("Unsupported {field}: {value}")]
    UnsupportedValue { field: &'static str, value: String },

    #[error("Stored {field} index {index} has no meaning on this radio")]
    UnknownIndex { field: &'static str, index: u64 },

    #[error("Invalid memory location: {0}")]
    InvalidMemory(u32),

    #[error("No memory image loaded")]
    NoImage,

    #[error(transparent)]
    Clone(#[from] CloneError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Serial communication error: {0}")]
    Serial(#[from] SerialError),
}

impl RadioError {
    pub fn unsupported(field: &'static str, value: impl ToString) -> Self {
        RadioError::UnsupportedValue {
            field,
            value: value.to_string(),
        }
    }
}

pub type RadioResult<T> = std::result::Result<T, RadioError>;

/// Base trait for all radio drivers
pub trait Radio: Send {
    fn vendor(&self) -> &str;

    fn model(&self) -> &str;

    fn get_features(&self) -> RadioFeatures;

    /// Get a printable name for this radio
    fn get_name(&self) -> String {
        format!("{} {}", self.vendor(), self.model())
    }

    /// Decode one channel; unused slots come back with `empty` set
    fn get_channel(&self, number: u32) -> RadioResult<Channel>;

    /// Encode one channel. Nothing is written when any field is rejected.
    fn set_channel(&mut self, channel: &Channel) -> RadioResult<()>;

    /// Mark a channel unused
    fn delete_channel(&mut self, number: u32) -> RadioResult<()> {
        self.set_channel(&Channel::new_empty(number))
    }

    /// Every non-empty channel within the memory bounds
    fn get_channels(&self) -> RadioResult<Vec<Channel>> {
        let (start, end) = self.get_features().memory_bounds;
        let mut channels = Vec::new();

        for number in start..=end {
            let channel = self.get_channel(number)?;
            if !channel.empty {
                channels.push(channel);
            }
        }

        Ok(channels)
    }

    fn validate_channel(&self, channel: &Channel) -> Vec<ValidationMessage> {
        self.get_features().validate_channel(channel)
    }

    /// Fit a user-entered name to what the radio can store: surrounding
    /// blanks trimmed, unknown characters dropped, cut to the name length
    fn filter_name(&self, name: &str) -> String {
        let rf = self.get_features();
        name.trim()
            .chars()
            .filter(|&c| rf.valid_characters.is_empty() || rf.valid_characters.contains(c))
            .take(rf.valid_name_length)
            .collect::<String>()
            .trim_end()
            .to_string()
    }
}

/// Radios programmed by exchanging a full memory image
pub trait CloneModeRadio: Radio {
    /// Size of the radio's memory image in bytes
    fn get_memsize(&self) -> usize;

    /// Handshake, block plan, checksums and timing for this model
    fn clone_profile(&self) -> CloneProfile;

    /// Install an image downloaded or loaded from disk
    fn load_image(&mut self, image: MemoryImage) -> RadioResult<()>;

    fn image(&self) -> Option<&MemoryImage>;

    fn image_mut(&mut self) -> Option<&mut MemoryImage>;

    /// Raw bytes of one channel slot
    fn get_raw_channel(&self, number: u32) -> RadioResult<Vec<u8>>;

    /// Check whether a raw image belongs to this model
    fn match_model(data: &[u8]) -> bool
    where
        Self: Sized;

    /// Fresh session for this model; add progress or abort before syncing
    fn session(&self) -> RadioResult<CloneSession> {
        Ok(CloneSession::new(self.clone_profile())?)
    }

    /// Download the radio's image. The loaded image is left alone on failure.
    async fn sync_in<L: CloneLink>(
        &mut self,
        link: &mut L,
        mut session: CloneSession,
    ) -> RadioResult<()> {
        let image = session.download(link).await?;
        info!("Downloaded {} image", self.get_name());
        self.load_image(image)
    }

    /// Refresh checksums on the loaded image and upload it
    async fn sync_out<L: CloneLink>(
        &mut self,
        link: &mut L,
        mut session: CloneSession,
    ) -> RadioResult<()> {
        let checksums = self.clone_profile().checksums;
        let name = self.get_name();
        let image = self.image_mut().ok_or(RadioError::NoImage)?;
        update_all(&checksums, image)?;
        session.upload(link, image).await?;
        info!("Uploaded {} image", name);
        Ok(())
    }
}
