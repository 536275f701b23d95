//! Transport layer for Murmur.
//!
//! Socket roles are split at the type level. A [`ServerTransport`] can only
//! listen and accept; a [`ClientTransport`] can only connect. Mixing the two
//! (a server that dials out, a client that listens) is not expressible.
//!
//! Both sides hand out a [`FrameReader`] / [`FrameWriter`] pair. A frame is
//! one `\n`-terminated line carrying a single protocol document. Lines longer
//! than the configured cap fail with [`TransportError::FrameTooLarge`] before
//! anything above this layer sees them.

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{LineReader, LineWriter, TcpClientTransport, TcpServerTransport};

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

/// Default upper bound on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_LEN: usize = 1_000_000;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A freshly accepted connection, already split into its two halves.
pub struct Accepted<R, W> {
    /// Identifier assigned by the server transport.
    pub id: ConnectionId,
    /// The remote endpoint.
    pub peer: SocketAddr,
    /// Inbound half.
    pub reader: R,
    /// Outbound half.
    pub writer: W,
}

/// The inbound half of a connection.
pub trait FrameReader: Send + 'static {
    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` when the peer closed the connection cleanly.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
}

/// The outbound half of a connection.
pub trait FrameWriter: Send + 'static {
    /// Sends one frame. The transport adds the line terminator.
    fn send(
        &mut self,
        frame: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Flushes and shuts down the outbound direction.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The listening side. Exposes accept operations only.
pub trait ServerTransport: Send + 'static {
    /// Inbound half produced for each accepted connection.
    type Reader: FrameReader;
    /// Outbound half produced for each accepted connection.
    type Writer: FrameWriter;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<
        Output = Result<Accepted<Self::Reader, Self::Writer>, TransportError>,
    > + Send;

    /// Returns the address the transport is listening on.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;
}

/// The dialing side. Exposes connect operations only.
pub trait ClientTransport: Sized + Send + 'static {
    /// Inbound half of the established connection.
    type Reader: FrameReader;
    /// Outbound half of the established connection.
    type Writer: FrameWriter;

    /// Connects to a server.
    fn connect(
        addr: SocketAddr,
        max_frame_len: usize,
    ) -> impl Future<Output = Result<Self, TransportError>> + Send;

    /// Returns the server's address.
    fn peer_addr(&self) -> SocketAddr;

    /// Splits the connection into independently owned halves.
    fn into_split(self) -> (Self::Reader, Self::Writer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    #[test]
    fn test_transport_error_frame_too_large_mentions_limit() {
        let err = TransportError::FrameTooLarge { limit: 16 };
        assert_eq!(err.to_string(), "frame exceeds 16 bytes");
    }
}
