// Scripted link for exercising clone sessions without hardware

use super::comm::SerialError;
use super::link::CloneLink;
use std::collections::VecDeque;
use std::time::Duration;

/// What the simulated radio does on the next read
#[derive(Debug, Clone)]
pub enum ReadEvent {
    /// Deliver these bytes (split across reads if the buffer is short)
    Bytes(Vec<u8>),
    /// Nothing arrives before the deadline
    Stall,
    /// The cable is gone
    Disconnect,
}

#[derive(Debug, Default)]
pub struct MockLink {
    script: VecDeque<ReadEvent>,
    writes: Vec<Vec<u8>>,
    reads: usize,
    write_stalls: usize,
    write_attempts: usize,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Link whose radio sends `response` and then goes quiet
    pub fn with_response(response: &[u8]) -> Self {
        let mut link = Self::new();
        link.push_bytes(response);
        link
    }

    pub fn push_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.script.push_back(ReadEvent::Bytes(data.to_vec()));
        self
    }

    pub fn push_stall(&mut self) -> &mut Self {
        self.script.push_back(ReadEvent::Stall);
        self
    }

    pub fn push_disconnect(&mut self) -> &mut Self {
        self.script.push_back(ReadEvent::Disconnect);
        self
    }

    /// The next `count` writes time out without delivering anything
    pub fn push_write_stalls(&mut self, count: usize) -> &mut Self {
        self.write_stalls += count;
        self
    }

    /// Every successful write call, in order
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All written bytes concatenated
    pub fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }

    /// Write calls made so far, including stalled ones
    pub fn write_attempts(&self) -> usize {
        self.write_attempts
    }

    /// Number of read calls made so far
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Scripted events not yet consumed
    pub fn pending(&self) -> usize {
        self.script.len()
    }
}

impl CloneLink for MockLink {
    async fn read(&mut self, buf: &mut [u8], wait: Duration) -> Result<usize, SerialError> {
        self.reads += 1;

        match self.script.pop_front() {
            Some(ReadEvent::Bytes(data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.script.push_front(ReadEvent::Bytes(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(ReadEvent::Disconnect) => Err(SerialError::Port("device disconnected".to_string())),
            Some(ReadEvent::Stall) | None => Err(SerialError::Timeout(wait)),
        }
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<(), SerialError> {
        self.write_attempts += 1;
        if self.write_stalls > 0 {
            self.write_stalls -= 1;
            return Err(SerialError::Timeout(Duration::ZERO));
        }
        self.writes.push(buf.to_vec());
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SerialError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAIT: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_mock_basic() {
        let mut link = MockLink::with_response(b"Hello");

        let mut buf = [0u8; 5];
        assert_eq!(link.read(&mut buf, WAIT).await.unwrap(), 5);
        assert_eq!(&buf, b"Hello");

        link.write_all(b"World").await.unwrap();
        assert_eq!(link.written(), b"World");
    }

    #[tokio::test]
    async fn test_mock_partial_reads() {
        let mut link = MockLink::with_response(b"Hello");

        let mut buf = [0u8; 2];
        assert_eq!(link.read(&mut buf, WAIT).await.unwrap(), 2);
        assert_eq!(&buf, b"He");
        assert_eq!(link.pending(), 1);

        let mut rest = [0u8; 8];
        assert_eq!(link.read(&mut rest, WAIT).await.unwrap(), 3);
        assert_eq!(&rest[..3], b"llo");
    }

    #[tokio::test]
    async fn test_mock_stall_and_disconnect() {
        let mut link = MockLink::new();
        link.push_stall().push_bytes(b"A").push_disconnect();

        let mut buf = [0u8; 1];
        assert!(link.read(&mut buf, WAIT).await.unwrap_err().is_timeout());
        assert_eq!(link.read(&mut buf, WAIT).await.unwrap(), 1);
        let err = link.read(&mut buf, WAIT).await.unwrap_err();
        assert!(!err.is_timeout());

        link.push_write_stalls(1);
        assert!(link.write_all(b"A").await.unwrap_err().is_timeout());
        link.write_all(b"B").await.unwrap();
        assert_eq!(link.written(), b"B");
        assert_eq!(link.write_attempts(), 2);

        // An exhausted script behaves like a silent radio
        assert!(link.read(&mut buf, WAIT).await.unwrap_err().is_timeout());
        assert_eq!(link.reads(), 4);
    }
}
