//! The reactor: one task that owns every connection.
//!
//! Each loop iteration waits on whichever comes first:
//!
//! - a new connection from the listener
//! - the next frame from any live connection
//! - the housekeeping tick
//! - the shutdown signal
//!
//! Inbound frames are read by a set of single-frame futures, one per
//! connection, each owning its reader. When one completes the reader comes
//! back with the frame, the frame is processed, and a fresh read is armed.
//! A connection therefore never has more than one frame in flight, which
//! keeps each sender's messages in order.
//!
//! Every way a connection can end (exit, read error, write error, bad
//! payload, shutdown) goes through [`Reactor::disconnect`].

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use futures_util::future::{AbortHandle, Abortable, Aborted, BoxFuture};
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use murmur_directory::DirectoryHandle;
use murmur_protocol::{Codec, ProtocolError, Response};
use murmur_session::SessionRegistry;
use murmur_transport::{
    Accepted, ConnectionId, FrameReader, FrameWriter, ServerTransport,
    TransportError,
};
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::config::ServerConfig;
use crate::dispatcher::{self, Outbound};
use crate::MurmurError;

type ReadResult<R> = (ConnectionId, R, Result<Option<Vec<u8>>, TransportError>);
type PendingRead<R> = Abortable<BoxFuture<'static, ReadResult<R>>>;

/// A live connection as the reactor sees it. The reader is not here: it
/// lives inside the pending read future.
struct Conn<W> {
    peer: SocketAddr,
    writer: W,
    read_abort: AbortHandle,
}

pub(crate) struct Reactor<T: ServerTransport, C: Codec> {
    transport: T,
    codec: C,
    config: ServerConfig,
    registry: SessionRegistry,
    directory: DirectoryHandle,
    conns: HashMap<ConnectionId, Conn<T::Writer>>,
    reads: FuturesUnordered<PendingRead<T::Reader>>,
}

impl<T: ServerTransport, C: Codec> Reactor<T, C> {
    pub(crate) fn new(
        transport: T,
        codec: C,
        config: ServerConfig,
        registry: SessionRegistry,
        directory: DirectoryHandle,
    ) -> Self {
        Self {
            transport,
            codec,
            config,
            registry,
            directory,
            conns: HashMap::new(),
            reads: FuturesUnordered::new(),
        }
    }

    /// Runs until `shutdown` resolves, then closes every connection.
    pub(crate) async fn run(
        mut self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), MurmurError> {
        let mut tick = tokio::time::interval(self.config.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,

                accepted = self.transport.accept() => match accepted {
                    Ok(accepted) => self.admit(accepted),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },

                Some(read) = self.reads.next(), if !self.reads.is_empty() => {
                    match read {
                        Ok((id, reader, result)) => self.on_read(id, reader, result).await,
                        Err(Aborted) => {}
                    }
                }

                _ = tick.tick() => self.housekeeping(),
            }
        }

        tracing::info!(connections = self.conns.len(), "shutting down");
        let ids: Vec<ConnectionId> = self.conns.keys().copied().collect();
        for id in ids {
            self.disconnect(id, "server shutting down").await;
        }
        Ok(())
    }

    // -- Connection lifecycle ---------------------------------------------

    fn admit(&mut self, accepted: Accepted<T::Reader, T::Writer>) {
        let Accepted {
            id,
            peer,
            reader,
            writer,
        } = accepted;
        let read_abort = self.arm(id, reader);
        self.conns.insert(
            id,
            Conn {
                peer,
                writer,
                read_abort,
            },
        );
        tracing::info!(%id, %peer, live = self.conns.len(), "connection opened");
    }

    /// Starts reading the next frame for `id`.
    fn arm(&mut self, id: ConnectionId, mut reader: T::Reader) -> AbortHandle {
        let (handle, registration) = AbortHandle::new_pair();
        let read = async move {
            let result = reader.recv().await;
            (id, reader, result)
        }
        .boxed();
        self.reads.push(Abortable::new(read, registration));
        handle
    }

    /// The single teardown path. Idempotent: an id that is already gone
    /// is ignored.
    async fn disconnect(&mut self, id: ConnectionId, reason: impl Display) {
        let Some(mut conn) = self.conns.remove(&id) else {
            return;
        };
        conn.read_abort.abort();
        if let Some(session) = self.registry.unbind_by_connection(id) {
            self.directory.logout(session.name);
        }
        match tokio::time::timeout(self.config.write_timeout, conn.writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(%id, error = %e, "close failed"),
            Err(_) => tracing::debug!(%id, "close timed out"),
        }
        tracing::info!(%id, peer = %conn.peer, %reason, live = self.conns.len(), "connection closed");
    }

    fn housekeeping(&self) {
        tracing::trace!(
            live = self.conns.len(),
            online = self.registry.len(),
            pending_reads = self.reads.len(),
            "tick"
        );
    }

    // -- Inbound ----------------------------------------------------------

    async fn on_read(
        &mut self,
        id: ConnectionId,
        reader: T::Reader,
        result: Result<Option<Vec<u8>>, TransportError>,
    ) {
        match result {
            Ok(Some(frame)) => {
                self.on_frame(id, &frame).await;
                // The frame may have closed the connection.
                if self.conns.contains_key(&id) {
                    let handle = self.arm(id, reader);
                    if let Some(conn) = self.conns.get_mut(&id) {
                        conn.read_abort = handle;
                    }
                }
            }
            Ok(None) => self.disconnect(id, "peer closed the connection").await,
            Err(e) => self.disconnect(id, e).await,
        }
    }

    async fn on_frame(&mut self, id: ConnectionId, frame: &[u8]) {
        let Some(peer) = self.conns.get(&id).map(|c| c.peer) else {
            return;
        };
        match self.codec.decode_message(frame) {
            Ok(message) => {
                tracing::debug!(%id, action = %message.action(), "message received");
                let out = dispatcher::dispatch(
                    &mut self.registry,
                    &self.directory,
                    id,
                    peer,
                    message,
                )
                .await;
                self.execute(id, frame, out).await;
            }
            Err(ProtocolError::Schema(e)) => {
                tracing::debug!(%id, error = %e, "invalid message");
                let reply = Outbound::Reply(Response::rejected(e.to_string()));
                self.execute(id, frame, vec![reply]).await;
            }
            Err(e) => self.disconnect(id, e).await,
        }
    }

    // -- Outbound ---------------------------------------------------------

    /// Carries out `actions` for a message from `origin`. `inbound` is the
    /// frame the message arrived in.
    async fn execute(&mut self, origin: ConnectionId, inbound: &[u8], actions: Vec<Outbound>) {
        for action in actions {
            match action {
                Outbound::Reply(response) => {
                    if let Err(e) = self.send(origin, &response).await {
                        self.disconnect(origin, e).await;
                        return;
                    }
                }
                Outbound::Relay { to } => match self.write(to, inbound).await {
                    Ok(()) => {}
                    // Nothing was written, so the recipient is still fine.
                    Err(e @ TransportError::FrameTooLarge { .. }) => {
                        tracing::debug!(%origin, %to, error = %e, "relay refused");
                        let reply = Response::rejected(e.to_string());
                        if let Err(e) = self.send(origin, &reply).await {
                            self.disconnect(origin, e).await;
                            return;
                        }
                    }
                    // A broken recipient ends the recipient, not the sender.
                    Err(e) => self.disconnect(to, e).await,
                },
                Outbound::Close => {
                    self.disconnect(origin, "client exited").await;
                    return;
                }
            }
        }
    }

    async fn send<V: Serialize>(&mut self, id: ConnectionId, value: &V) -> Result<(), MurmurError> {
        let bytes = self.codec.encode(value)?;
        Ok(self.write(id, &bytes).await?)
    }

    /// Writes one frame to `id`, bounded by the write timeout.
    async fn write(&mut self, id: ConnectionId, frame: &[u8]) -> Result<(), TransportError> {
        let Some(conn) = self.conns.get_mut(&id) else {
            tracing::debug!(%id, "write to a connection that is gone");
            return Ok(());
        };
        match tokio::time::timeout(self.config.write_timeout, conn.writer.send(frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::SendFailed(io::Error::new(
                io::ErrorKind::TimedOut,
                "write timed out",
            ))),
        }
    }
}
