// CHIRP-RS: Rust port of CHIRP radio programming software
// Copyright 2024 - Licensed under GPLv3

pub mod bitwise;
pub mod clone;
pub mod core;
pub mod drivers;
pub mod formats;
pub mod memmap;
pub mod serial;

// Re-export commonly used types
pub use bitwise::{AccessError, Accessor, AccessorMut, Schema, SchemaError};
pub use clone::{CloneError, CloneProfile, CloneSession, TransferPolicy, TransferState};
pub use core::{Channel, RadioFeatures};
pub use drivers::{list_drivers, CloneModeRadio, Radio, RadioError, Vx7Radio};
pub use formats::{load_img, save_img, Metadata};
pub use memmap::{ImageError, MemoryImage};
pub use serial::{CloneLink, SerialConfig, SerialPort};

/// Crate version, written into saved .img metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
