//! Stream-based live device.
//!
//! Reads newline-delimited telemetry from an async byte stream. The usual
//! setup is a WiFi OBD-II adapter that exposes its serial port on a TCP
//! socket.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;

use super::{DeviceConnector, TelemetryLink, TelemetryRecord};
use crate::error::AcquisitionError;

/// A telemetry link over any async reader.
///
/// Each non-empty line becomes one record. End of stream is reported as
/// [`AcquisitionError::Disconnected`]: a live device never ends on its own.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use obdwatch::source::{StreamLink, TelemetryLink};
///
/// # tokio_test::block_on(async {
/// let mut link = StreamLink::new(Cursor::new(b"41 0C 1A F8\n".to_vec()), "example");
/// let record = link.next_record().await.unwrap().unwrap();
/// assert_eq!(record.line, "41 0C 1A F8");
/// # });
/// ```
#[derive(Debug)]
pub struct StreamLink<R> {
    reader: BufReader<R>,
    description: String,
    sequence: u64,
    line: String,
}

impl<R> StreamLink<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Wrap the given reader.
    pub fn new(reader: R, description: &str) -> Self {
        Self {
            reader: BufReader::new(reader),
            description: format!("stream: {}", description),
            sequence: 0,
            line: String::new(),
        }
    }
}

#[async_trait]
impl<R> TelemetryLink for StreamLink<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_record(&mut self) -> Result<Option<TelemetryRecord>, AcquisitionError> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line).await {
                Ok(0) => return Err(AcquisitionError::Disconnected),
                Ok(_) => {
                    let trimmed = self.line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    self.sequence += 1;
                    return Ok(Some(TelemetryRecord::new(self.sequence, trimmed)));
                }
                Err(e) => return Err(AcquisitionError::Io(e.to_string())),
            }
        }
    }

    fn description(&self) -> &str {
        &self.description
    }
}

/// A live adapter reachable over TCP (`host:port`).
#[derive(Debug, Clone)]
pub struct TcpDevice {
    address: String,
    connect_timeout: Duration,
    description: String,
}

impl TcpDevice {
    /// Create a device for the given address.
    pub fn new(address: &str, connect_timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            connect_timeout,
            description: format!("tcp: {}", address),
        }
    }

    async fn open(&self) -> Result<TcpStream, AcquisitionError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(AcquisitionError::Connect {
                target: self.address.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AcquisitionError::Timeout(self.connect_timeout)),
        }
    }
}

#[async_trait]
impl DeviceConnector for TcpDevice {
    async fn connect(&self) -> Result<Box<dyn TelemetryLink>, AcquisitionError> {
        let stream = self.open().await?;
        Ok(Box::new(StreamLink::new(stream, &self.address)))
    }

    async fn check_link(&self) -> Result<String, AcquisitionError> {
        let stream = self.open().await?;
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.address.clone());
        Ok(format!("Adapter reachable at {}", peer))
    }

    fn description(&self) -> &str {
        &self.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_stream_link_reads_lines() {
        let cursor = Cursor::new("41 0C 1A F8\n\n41 0D 32\n");
        let mut link = StreamLink::new(cursor, "test");

        let first = link.next_record().await.unwrap().unwrap();
        assert_eq!(first, TelemetryRecord::new(1, "41 0C 1A F8"));

        // Blank lines are skipped
        let second = link.next_record().await.unwrap().unwrap();
        assert_eq!(second, TelemetryRecord::new(2, "41 0D 32"));
    }

    #[tokio::test]
    async fn test_stream_link_eof_is_disconnect() {
        let mut link = StreamLink::new(Cursor::new(""), "test");
        assert_eq!(link.next_record().await, Err(AcquisitionError::Disconnected));
    }

    #[tokio::test]
    async fn test_stream_link_description() {
        let link = StreamLink::new(Cursor::new(""), "192.168.0.10:35000");
        assert_eq!(link.description(), "stream: 192.168.0.10:35000");
    }

    #[tokio::test]
    async fn test_tcp_device_connect_and_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"41 05 7B\n").await.unwrap();
        });

        let device = TcpDevice::new(&addr, Duration::from_secs(2));
        assert_eq!(device.description(), format!("tcp: {}", addr));

        let mut link = device.connect().await.unwrap();
        let record = link.next_record().await.unwrap().unwrap();
        assert_eq!(record.line, "41 05 7B");

        // Server task dropped the socket after writing
        assert_eq!(link.next_record().await, Err(AcquisitionError::Disconnected));
    }

    #[tokio::test]
    async fn test_tcp_device_check_link() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let device = TcpDevice::new(&addr, Duration::from_secs(2));
        let info = device.check_link().await.unwrap();
        assert!(info.contains(&addr));
    }

    #[tokio::test]
    async fn test_tcp_device_connection_refused() {
        // Bind and immediately drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        let device = TcpDevice::new(&addr, Duration::from_secs(2));
        match device.connect().await {
            Err(AcquisitionError::Connect { target, .. }) => assert_eq!(target, addr),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connection should fail"),
        }
    }
}
