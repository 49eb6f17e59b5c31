// Byte transport used by clone sessions

use super::comm::SerialError;
use std::time::Duration;

/// A bidirectional byte link to a radio.
///
/// Implemented by [`super::SerialPort`] for hardware and by the scripted
/// mock in tests. Calls are awaited one at a time by a single session.
pub trait CloneLink {
    /// Read whatever arrives within `wait`, at least one byte.
    /// Returns `SerialError::Timeout` when nothing arrives in time.
    async fn read(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, SerialError>;

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), SerialError>;

    async fn flush(&mut self) -> Result<(), SerialError>;
}
