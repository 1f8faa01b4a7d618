//! Mock line-oriented TCP server for adapter tests.
//!
//! [`MockLineServer`] listens on a random loopback port; tests connect an
//! adapter to [`addr`](MockLineServer::addr), then drive the accepted
//! [`LinePeer`] directly: read the lines the adapter sent, push status or
//! response lines back. This keeps the protocol exchange explicit in the
//! test body instead of hidden in a scripting layer.
//!
//! # Example
//!
//! ```no_run
//! use rigbridge_test_harness::MockLineServer;
//!
//! # async fn example() -> rigbridge_core::Result<()> {
//! let server = MockLineServer::bind().await?;
//! let addr = server.addr().to_string();
//! // ... connect an adapter to `addr` ...
//! let mut peer = server.accept().await?;
//! peer.send_line("freq=14250000 mode=USB").await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::{TcpListener, TcpStream};

use rigbridge_core::{Error, Result};

/// Default deadline for a peer read in tests.
const READ_DEADLINE: Duration = Duration::from_secs(2);

/// A TCP listener on a random loopback port.
pub struct MockLineServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockLineServer {
    /// Bind to `127.0.0.1:0`.
    pub async fn bind() -> Result<MockLineServer> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock server: {e}")))?;
        let addr = listener.local_addr().map_err(Error::Io)?;
        Ok(MockLineServer { listener, addr })
    }

    /// The address to point the adapter under test at.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept one connection from the adapter under test.
    pub async fn accept(&self) -> Result<LinePeer> {
        let (stream, _) = self
            .listener
            .accept()
            .await
            .map_err(|e| Error::Transport(format!("mock accept failed: {e}")))?;
        let (read_half, write_half) = tokio::io::split(stream);
        Ok(LinePeer {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }
}

/// One accepted connection, line-framed in both directions.
pub struct LinePeer {
    reader: BufReader<ReadHalf<TcpStream>>,
    writer: WriteHalf<TcpStream>,
}

impl LinePeer {
    /// Send one line (the newline is appended here).
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("mock write failed: {e}")))?;
        self.writer
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("mock flush failed: {e}")))?;
        Ok(())
    }

    /// Read the next line sent by the adapter, trimmed of the terminator.
    ///
    /// Fails after two seconds so a missing write shows up as a test
    /// failure instead of a hang.
    pub async fn recv_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = tokio::time::timeout(READ_DEADLINE, self.reader.read_line(&mut line))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Transport(format!("mock read failed: {e}")))?;
        if read == 0 {
            return Err(Error::ConnectionLost);
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Close the write side, simulating the device dropping the link.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(Error::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_through_mock() {
        let server = MockLineServer::bind().await.unwrap();
        let addr = server.addr();

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"hello mock\n").await.unwrap();
            let mut buf = vec![0u8; 32];
            let n = tokio::io::AsyncReadExt::read(&mut stream, &mut buf).await.unwrap();
            String::from_utf8_lossy(&buf[..n]).to_string()
        });

        let mut peer = server.accept().await.unwrap();
        assert_eq!(peer.recv_line().await.unwrap(), "hello mock");
        peer.send_line("hi back").await.unwrap();

        let echoed = client.await.unwrap();
        assert_eq!(echoed, "hi back\n");
    }

    #[tokio::test]
    async fn recv_times_out_without_data() {
        let server = MockLineServer::bind().await.unwrap();
        let addr = server.addr();
        let _stream = TcpStream::connect(addr).await.unwrap();
        let mut peer = server.accept().await.unwrap();

        // Shorten the wait by racing against a smaller timeout.
        let res = tokio::time::timeout(Duration::from_millis(2500), peer.recv_line()).await;
        assert!(matches!(res, Ok(Err(Error::Timeout))));
    }
}
