//! TCP transport with newline-delimited framing via `tokio-util`.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, FramedRead};

use crate::{
    Accepted, ClientTransport, ConnectionId, FrameReader, FrameWriter,
    ServerTransport, TransportError,
};

fn line_codec(max_frame_len: usize) -> AnyDelimiterCodec {
    AnyDelimiterCodec::new_with_max_length(
        b"\n".to_vec(),
        b"\n".to_vec(),
        max_frame_len,
    )
}

fn split(stream: TcpStream, max_frame_len: usize) -> (LineReader, LineWriter) {
    let (read_half, write_half) = stream.into_split();
    let reader = LineReader {
        inner: FramedRead::new(read_half, line_codec(max_frame_len)),
        max_frame_len,
    };
    let writer = LineWriter {
        inner: write_half,
        max_frame_len,
    };
    (reader, writer)
}

// ---------------------------------------------------------------------------
// Server side
// ---------------------------------------------------------------------------

/// A TCP listener producing line-framed connections.
pub struct TcpServerTransport {
    listener: TcpListener,
    max_frame_len: usize,
    next_id: u64,
}

impl TcpServerTransport {
    /// Binds a new listener to the given address.
    pub async fn bind(
        addr: SocketAddr,
        max_frame_len: usize,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%addr, max_frame_len, "TCP transport listening");
        Ok(Self {
            listener,
            max_frame_len,
            next_id: 1,
        })
    }
}

impl ServerTransport for TcpServerTransport {
    type Reader = LineReader;
    type Writer = LineWriter;

    async fn accept(
        &mut self,
    ) -> Result<Accepted<LineReader, LineWriter>, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Chat lines are small; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }

        let id = ConnectionId::new(self.next_id);
        self.next_id += 1;
        tracing::debug!(%id, %peer, "accepted TCP connection");

        let (reader, writer) = split(stream, self.max_frame_len);
        Ok(Accepted {
            id,
            peer,
            reader,
            writer,
        })
    }

    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

// ---------------------------------------------------------------------------
// Client side
// ---------------------------------------------------------------------------

/// An established client connection to a Murmur server.
pub struct TcpClientTransport {
    stream: TcpStream,
    peer: SocketAddr,
    max_frame_len: usize,
}

impl TcpClientTransport {
    /// Connects, retrying up to `attempts` times with `delay` between tries.
    pub async fn connect_with_retry(
        addr: SocketAddr,
        max_frame_len: usize,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, TransportError> {
        let attempts = attempts.max(1);
        let mut attempt = 1;
        loop {
            tracing::info!(%addr, attempt, "connecting");
            match Self::connect(addr, max_frame_len).await {
                Ok(transport) => return Ok(transport),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(%addr, attempt, error = %e, "connect attempt failed");
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl ClientTransport for TcpClientTransport {
    type Reader = LineReader;
    type Writer = LineWriter;

    async fn connect(
        addr: SocketAddr,
        max_frame_len: usize,
    ) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::ConnectFailed)?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }
        tracing::debug!(%addr, "connected");
        Ok(Self {
            stream,
            peer: addr,
            max_frame_len,
        })
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn into_split(self) -> (LineReader, LineWriter) {
        split(self.stream, self.max_frame_len)
    }
}

// ---------------------------------------------------------------------------
// Halves
// ---------------------------------------------------------------------------

/// Reads `\n`-terminated frames. A trailing `\r` is stripped and blank lines
/// are skipped.
pub struct LineReader {
    inner: FramedRead<OwnedReadHalf, AnyDelimiterCodec>,
    max_frame_len: usize,
}

impl FrameReader for LineReader {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        loop {
            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    let mut line = chunk.to_vec();
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if line.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Ok(Some(line));
                }
                Some(Err(AnyDelimiterCodecError::MaxChunkLengthExceeded)) => {
                    return Err(TransportError::FrameTooLarge {
                        limit: self.max_frame_len,
                    });
                }
                Some(Err(AnyDelimiterCodecError::Io(e))) => {
                    return Err(TransportError::ReceiveFailed(e));
                }
                None => return Ok(None),
            }
        }
    }
}

/// Writes frames, appending the `\n` terminator.
pub struct LineWriter {
    inner: OwnedWriteHalf,
    max_frame_len: usize,
}

impl FrameWriter for LineWriter {
    async fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if frame.len() > self.max_frame_len {
            return Err(TransportError::FrameTooLarge {
                limit: self.max_frame_len,
            });
        }
        let mut line = Vec::with_capacity(frame.len() + 1);
        line.extend_from_slice(frame);
        line.push(b'\n');
        self.inner
            .write_all(&line)
            .await
            .map_err(TransportError::SendFailed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.inner
            .shutdown()
            .await
            .map_err(TransportError::SendFailed)
    }
}
