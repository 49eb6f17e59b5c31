// Block-based clone-mode transfers
// A session moves one memory image to or from a radio over a CloneLink,
// following the model's block plan and verifying its checksums

pub mod checksum;
pub mod plan;
pub mod session;

pub use checksum::{update_all, verify_all, ChecksumAlgorithm, ChecksumDescriptor};
pub use plan::{Block, BlockPlan};
pub use session::{
    AbortHandle, CloneError, CloneProfile, CloneSession, ProgressCallback, Status, TransferPolicy,
    TransferState,
};
