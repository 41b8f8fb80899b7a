//! Line-protocol client and throwaway server for network tests.

use ringlog_core::{RecordLog, SeekTo};
use ringlog_server::{LogServer, ServerConfig, ServerResult, SupervisorReport};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A minimal client for the line protocol.
///
/// Responses carry no length prefix, so the client reads until it has the
/// number of bytes the caller expects.
pub struct LineClient {
    stream: TcpStream,
}

impl LineClient {
    /// Connects to a server.
    pub async fn connect(addr: SocketAddr) -> io::Result<Self> {
        Ok(Self {
            stream: TcpStream::connect(addr).await?,
        })
    }

    /// Sends raw bytes without waiting for a response.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes).await
    }

    /// Reads exactly `len` response bytes.
    pub async fn read_response(&mut self, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Sends `line` and reads a response of `expected_len` bytes.
    pub async fn exchange(&mut self, line: &[u8], expected_len: usize) -> io::Result<Vec<u8>> {
        self.send_raw(line).await?;
        self.read_response(expected_len).await
    }

    /// Sends a seek command and reads a response of `expected_len` bytes.
    pub async fn seek(&mut self, seek: SeekTo, expected_len: usize) -> io::Result<Vec<u8>> {
        self.exchange(&seek.to_line(), expected_len).await
    }

    /// Reads until the server closes the connection.
    pub async fn read_until_closed(&mut self) -> io::Result<Vec<u8>> {
        let mut rest = Vec::new();
        match self.stream.read_to_end(&mut rest).await {
            Ok(_) => Ok(rest),
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => Ok(rest),
            Err(e) => Err(e),
        }
    }

    /// Closes the write half so the server sees end of stream.
    pub async fn finish(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

/// A server bound to an ephemeral loopback port, running in the background.
pub struct TestServer {
    addr: SocketAddr,
    log: Arc<RecordLog>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<ServerResult<SupervisorReport>>,
}

impl TestServer {
    /// Starts an in-memory server retaining `capacity` records.
    pub async fn start(capacity: usize) -> Self {
        let config = ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0))).with_capacity(capacity);
        Self::with_config(config).await
    }

    /// Starts a server with an explicit configuration.
    pub async fn with_config(config: ServerConfig) -> Self {
        let server = LogServer::bind(config).await.expect("Failed to bind test server");
        let addr = server.local_addr();
        let log = Arc::clone(server.log());
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(server.run_until(async {
            let _ = stopped.await;
        }));

        Self {
            addr,
            log,
            stop: Some(stop),
            task,
        }
    }

    /// Returns the listening address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the server's log.
    pub fn log(&self) -> &Arc<RecordLog> {
        &self.log
    }

    /// Signals shutdown and waits for the drain to finish.
    pub async fn stop(mut self) -> SupervisorReport {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task
            .await
            .expect("Server task panicked")
            .expect("Server failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_round_trip() {
        let server = TestServer::start(2).await;
        let mut client = LineClient::connect(server.addr()).await.unwrap();

        assert_eq!(client.exchange(b"a\n", 2).await.unwrap(), b"a\n");
        assert_eq!(client.exchange(b"bb\n", 5).await.unwrap(), b"a\nbb\n");
        assert_eq!(client.exchange(b"ccc\n", 7).await.unwrap(), b"bb\nccc\n");
        assert_eq!(client.seek(SeekTo::new(0, 1), 6).await.unwrap(), b"b\nccc\n");

        client.finish().await.unwrap();
        assert!(client.read_until_closed().await.unwrap().is_empty());

        let report = server.stop().await;
        assert_eq!(report.records_committed, 3);
    }

    #[tokio::test]
    async fn invalid_seek_closes_connection() {
        let server = TestServer::start(2).await;
        let mut client = LineClient::connect(server.addr()).await.unwrap();

        client.exchange(b"a\n", 2).await.unwrap();
        client.send_raw(&SeekTo::new(5, 0).to_line()).await.unwrap();
        assert!(client.read_until_closed().await.unwrap().is_empty());

        assert_eq!(server.log().len(), 1);
        server.stop().await;
    }
}
