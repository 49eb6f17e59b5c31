// Clone-mode transfer session: handshake, block exchange, verification

use super::checksum::{verify_all, ChecksumDescriptor};
use super::plan::{Block, BlockPlan};
use crate::memmap::{ImageError, MemoryImage};
use crate::serial::{CloneLink, SerialError};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Idle,
    Handshaking,
    TransferringBlocks,
    Verifying,
    Complete,
    Failed,
}

#[derive(Error, Debug)]
pub enum CloneError {
    #[error("Invalid block plan: {0}")]
    InvalidBlockPlan(String),

    #[error("Handshake mismatch: expected {expected:02X?}, received {received:02X?}")]
    HandshakeMismatch { expected: Vec<u8>, received: Vec<u8> },

    #[error("Radio did not start the handshake after {attempts} attempts")]
    HandshakeTimeout { attempts: u32 },

    #[error("Block {block} at {offset:#06x} failed after {attempts} attempts: {reason}")]
    BlockTransfer {
        block: usize,
        offset: usize,
        attempts: u32,
        reason: String,
    },

    #[error("Checksum mismatch over {start:#06x}..={end:#06x} (stored at {store_at:#06x}): stored {stored:#04x}, computed {computed:#04x}")]
    Checksum {
        start: usize,
        end: usize,
        store_at: usize,
        stored: u16,
        computed: u16,
    },

    #[error("Transfer aborted during {state:?}")]
    Aborted { state: TransferState },

    #[error("Clone session already used")]
    SessionSpent,

    #[error("Serial link error: {0}")]
    Link(#[from] SerialError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

pub type Result<T> = std::result::Result<T, CloneError>;

/// Timing and framing knobs for a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPolicy {
    /// Longest silence tolerated by one read
    pub block_timeout: Duration,
    /// Extra waits allowed per block before giving up
    pub retries: u32,
    /// Upload write size
    pub chunk_size: usize,
    /// Pause between upload chunks
    pub chunk_delay: Duration,
    pub ack: u8,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            block_timeout: Duration::from_secs(2),
            retries: 3,
            chunk_size: 8,
            chunk_delay: Duration::from_millis(10),
            ack: 0x06,
        }
    }
}

impl TransferPolicy {
    pub fn with_block_timeout(mut self, timeout: Duration) -> Self {
        self.block_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

/// Everything a session needs to talk to one radio model
#[derive(Debug, Clone)]
pub struct CloneProfile {
    /// Identification bytes that open the image and the handshake
    pub ident: Vec<u8>,
    pub memsize: usize,
    pub block_lengths: Vec<usize>,
    pub checksums: Vec<ChecksumDescriptor>,
    pub baud_rate: u32,
    pub policy: TransferPolicy,
}

/// Status information for progress reporting
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub current: usize,
    pub max: usize,
    pub message: String,
}

impl Status {
    pub fn new(current: usize, max: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            max,
            message: message.into(),
        }
    }

    pub fn percent(&self) -> f32 {
        if self.max == 0 {
            return 100.0;
        }
        (self.current as f32 / self.max as f32) * 100.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{} - {:.1}%)",
            self.message,
            self.current,
            self.max,
            self.percent()
        )
    }
}

pub type ProgressCallback = Arc<dyn Fn(&Status) + Send + Sync>;

/// Shared cancellation flag, honoured between blocks
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of waiting for a buffer to fill
enum Wait {
    Filled,
    Exhausted { attempts: u32, received: usize },
}

/// One download or upload. A session runs exactly once.
pub struct CloneSession {
    profile: CloneProfile,
    plan: BlockPlan,
    state: TransferState,
    abort: AbortHandle,
    progress: Option<ProgressCallback>,
}

impl CloneSession {
    /// Validates the block plan before any I/O happens
    pub fn new(profile: CloneProfile) -> Result<Self> {
        let plan = BlockPlan::new(&profile.block_lengths, profile.memsize)?;
        if profile.ident.len() > plan.first_len() {
            return Err(CloneError::InvalidBlockPlan(format!(
                "{}-byte ident does not fit the {}-byte first block",
                profile.ident.len(),
                plan.first_len()
            )));
        }

        Ok(Self {
            profile,
            plan,
            state: TransferState::Idle,
            abort: AbortHandle::new(),
            progress: None,
        })
    }

    pub fn with_abort(mut self, abort: AbortHandle) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Receive a full image from the radio
    pub async fn download<L: CloneLink>(&mut self, link: &mut L) -> Result<MemoryImage> {
        self.begin()?;
        info!(
            "Clone download: {} bytes in {} blocks",
            self.profile.memsize,
            self.plan.len()
        );
        let result = self.run_download(link).await;
        self.finish(result)
    }

    /// Send `image` to the radio
    pub async fn upload<L: CloneLink>(&mut self, link: &mut L, image: &MemoryImage) -> Result<()> {
        self.begin()?;
        info!(
            "Clone upload: {} bytes in {} blocks",
            self.profile.memsize,
            self.plan.len()
        );
        let result = self.run_upload(link, image).await;
        self.finish(result)
    }

    fn begin(&mut self) -> Result<()> {
        if self.state != TransferState::Idle {
            return Err(CloneError::SessionSpent);
        }
        Ok(())
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(_) => {
                self.state = TransferState::Complete;
                info!("Clone transfer complete");
            }
            Err(e) => {
                warn!("Clone transfer failed in {:?}: {}", self.state, e);
                self.state = TransferState::Failed;
            }
        }
        result
    }

    fn check_abort(&self) -> Result<()> {
        if self.abort.is_aborted() {
            return Err(CloneError::Aborted { state: self.state });
        }
        Ok(())
    }

    fn report(&self, current: usize, message: String) {
        debug!("{}", message);
        if let Some(callback) = &self.progress {
            callback(&Status::new(current, self.profile.memsize, message));
        }
    }

    async fn run_download<L: CloneLink>(&mut self, link: &mut L) -> Result<MemoryImage> {
        let ident_len = self.profile.ident.len();
        let mut data = vec![0u8; self.profile.memsize];

        self.state = TransferState::Handshaking;
        match self.fill(link, &mut data[..ident_len]).await? {
            Wait::Filled => {}
            Wait::Exhausted { attempts, .. } => {
                return Err(CloneError::HandshakeTimeout { attempts });
            }
        }
        if data[..ident_len] != self.profile.ident[..] {
            return Err(CloneError::HandshakeMismatch {
                expected: self.profile.ident.clone(),
                received: data[..ident_len].to_vec(),
            });
        }
        self.report(ident_len, "Radio identified".to_string());

        self.state = TransferState::TransferringBlocks;
        let total = self.plan.len();
        let mut cursor = ident_len;
        for block in self.plan.blocks() {
            self.check_abort()?;

            let end = block.offset + block.len;
            let start = cursor.max(block.offset);
            if let Wait::Exhausted { attempts, received } =
                self.fill(link, &mut data[start..end]).await?
            {
                return Err(CloneError::BlockTransfer {
                    block: block.index,
                    offset: block.offset,
                    attempts,
                    reason: format!("timed out with {} of {} bytes", received, end - start),
                });
            }

            link.write_all(&[self.profile.policy.ack]).await?;
            cursor = end;
            self.report(
                end,
                format!("Received block {}/{} ({} bytes)", block.index + 1, total, block.len),
            );
        }

        self.check_abort()?;
        self.state = TransferState::Verifying;
        let image = MemoryImage::from_bytes(data, self.profile.memsize)?;
        verify_all(&self.profile.checksums, &image)?;
        Ok(image)
    }

    async fn run_upload<L: CloneLink>(&mut self, link: &mut L, image: &MemoryImage) -> Result<()> {
        if image.len() != self.profile.memsize {
            return Err(ImageError::SizeMismatch {
                expected: self.profile.memsize,
                actual: image.len(),
            }
            .into());
        }

        // Never send an image the radio would reject
        verify_all(&self.profile.checksums, image)?;

        let ident_len = self.profile.ident.len();
        let prefix = image.get(0, ident_len)?;
        if prefix != &self.profile.ident[..] {
            return Err(CloneError::HandshakeMismatch {
                expected: self.profile.ident.clone(),
                received: prefix.to_vec(),
            });
        }

        self.state = TransferState::Handshaking;
        let mut stalls = 0;
        if !self.write_retrying(link, prefix, &mut stalls).await? {
            return Err(CloneError::HandshakeTimeout { attempts: stalls });
        }
        self.report(ident_len, "Sent identification".to_string());

        self.state = TransferState::TransferringBlocks;
        let total = self.plan.len();
        let mut cursor = ident_len;
        for block in self.plan.blocks() {
            self.check_abort()?;

            let end = block.offset + block.len;
            let start = cursor.max(block.offset);
            self.send_chunks(link, block, image.get(start, end - start)?).await?;
            self.wait_ack(link, block).await?;

            cursor = end;
            self.report(
                end,
                format!("Sent block {}/{} ({} bytes)", block.index + 1, total, block.len),
            );
        }

        self.check_abort()?;
        self.state = TransferState::Verifying;
        verify_all(&self.profile.checksums, image)?;
        Ok(())
    }

    /// Write one block in chunks. Stalled writes share the block's retry budget.
    async fn send_chunks<L: CloneLink>(&self, link: &mut L, block: Block, data: &[u8]) -> Result<()> {
        let policy = &self.profile.policy;
        let mut stalls = 0;
        for (i, chunk) in data.chunks(policy.chunk_size.max(1)).enumerate() {
            if !self.write_retrying(link, chunk, &mut stalls).await? {
                return Err(CloneError::BlockTransfer {
                    block: block.index,
                    offset: block.offset,
                    attempts: stalls,
                    reason: format!("write timed out after {} chunks", i),
                });
            }
            if !policy.chunk_delay.is_zero() {
                tokio::time::sleep(policy.chunk_delay).await;
            }
        }
        link.flush().await?;
        Ok(())
    }

    async fn wait_ack<L: CloneLink>(&self, link: &mut L, block: Block) -> Result<()> {
        let mut reply = [0u8; 1];
        match self.fill(link, &mut reply).await? {
            Wait::Exhausted { attempts, .. } => Err(CloneError::BlockTransfer {
                block: block.index,
                offset: block.offset,
                attempts,
                reason: "no acknowledgement".to_string(),
            }),
            Wait::Filled if reply[0] != self.profile.policy.ack => Err(CloneError::BlockTransfer {
                block: block.index,
                offset: block.offset,
                attempts: 1,
                reason: format!("radio answered {:#04x} instead of ACK", reply[0]),
            }),
            Wait::Filled => Ok(()),
        }
    }

    /// Write `data`, retrying timeouts until `stalls` exceeds the policy.
    /// Returns false once the budget is spent.
    async fn write_retrying<L: CloneLink>(
        &self,
        link: &mut L,
        data: &[u8],
        stalls: &mut u32,
    ) -> Result<bool> {
        let retries = self.profile.policy.retries;
        loop {
            match link.write_all(data).await {
                Ok(()) => return Ok(true),
                Err(e) if e.is_timeout() => {
                    *stalls += 1;
                    if *stalls > retries {
                        return Ok(false);
                    }
                    warn!("Radio not accepting data, retry {}/{}", stalls, retries);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Read until `buf` is full. Each silent wait counts as an attempt;
    /// non-timeout link errors end the transfer at once.
    async fn fill<L: CloneLink>(&self, link: &mut L, buf: &mut [u8]) -> Result<Wait> {
        let policy = &self.profile.policy;
        let mut filled = 0;
        let mut stalls = 0u32;

        while filled < buf.len() {
            match link.read(&mut buf[filled..], policy.block_timeout).await {
                Ok(n) => filled += n,
                Err(e) if e.is_timeout() => {
                    stalls += 1;
                    if stalls > policy.retries {
                        return Ok(Wait::Exhausted {
                            attempts: stalls,
                            received: filled,
                        });
                    }
                    warn!(
                        "No data from radio ({} of {} bytes), retry {}/{}",
                        filled,
                        buf.len(),
                        stalls,
                        policy.retries
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Wait::Filled)
    }
}
