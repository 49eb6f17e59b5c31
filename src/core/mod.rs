// Vendor-neutral channel data and radio capabilities
pub mod channel;
pub mod constants;
pub mod features;

pub use channel::{Channel, ChannelError};
pub use constants::*;
pub use features::{RadioFeatures, ValidationMessage};
