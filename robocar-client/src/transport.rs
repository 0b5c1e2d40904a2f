//! Simulator socket
//!
//! Newline-delimited JSON over TCP. One socket per session; the session
//! loop owns it and drives both directions from a single task.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use robocar_core::error::TransportFault;
use robocar_core::model::SimMessage;

pub struct SimSocket {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    recv_timeout: Duration,
    line: String,
}

impl SimSocket {
    pub async fn connect(
        host: &str,
        port: u16,
        recv_timeout: Duration,
    ) -> Result<Self, TransportFault> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        debug!(host, port, "connected to simulator");
        let (read_half, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer,
            recv_timeout,
            line: String::new(),
        })
    }

    /// Receive the next message, decoded from one JSON line.
    ///
    /// The simulator streams continuously while a scene is loaded, so a
    /// quiet socket past the timeout means the session is dead.
    pub async fn recv(&mut self) -> Result<SimMessage, TransportFault> {
        self.line.clear();
        let read = tokio::time::timeout(self.recv_timeout, self.reader.read_line(&mut self.line))
            .await
            .map_err(|_| TransportFault::RecvTimeout(self.recv_timeout))??;
        if read == 0 {
            return Err(TransportFault::Closed);
        }
        trace!(bytes = read, "sim message received");
        Ok(serde_json::from_str(self.line.trim_end())?)
    }

    /// Send one pre-encoded JSON message, newline-terminated.
    pub async fn send(&mut self, message: &str) -> Result<(), TransportFault> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}
