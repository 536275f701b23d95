//! `MurmurServer` builder and entry points.
//!
//! This ties the layers together: transport → protocol → session →
//! directory, all driven by one reactor task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use murmur_directory::{spawn_directory, Directory, DirectoryHandle, MemoryDirectory};
use murmur_protocol::JsonCodec;
use murmur_session::{Roster, SessionRegistry};
use murmur_transport::{ServerTransport, TcpServerTransport};

use crate::config::ServerConfig;
use crate::reactor::Reactor;
use crate::MurmurError;

/// Builder for configuring and starting a Murmur server.
///
/// # Example
///
/// ```rust,no_run
/// use murmur::prelude::*;
///
/// # async fn example() -> Result<(), MurmurError> {
/// let server = MurmurServer::builder()
///     .bind("0.0.0.0:7777".parse().unwrap())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct MurmurServerBuilder<D: Directory = MemoryDirectory> {
    config: ServerConfig,
    directory: Arc<D>,
}

impl MurmurServerBuilder {
    /// Creates a builder with default settings and an empty in-memory
    /// directory.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            directory: Arc::new(MemoryDirectory::new()),
        }
    }
}

impl Default for MurmurServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Directory> MurmurServerBuilder<D> {
    /// Sets the address to listen on.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.listen = addr;
        self
    }

    /// Replaces the whole configuration, listen address included.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `directory` as the contact directory.
    ///
    /// Keep a clone of the `Arc` to inspect the directory while the server
    /// runs.
    pub fn directory<E: Directory>(self, directory: Arc<E>) -> MurmurServerBuilder<E> {
        MurmurServerBuilder {
            config: self.config,
            directory,
        }
    }

    /// Binds the listener and starts the directory actor.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// [`MurmurError::Transport`] if the address can't be bound.
    pub async fn build(self) -> Result<MurmurServer, MurmurError> {
        let transport =
            TcpServerTransport::bind(self.config.listen, self.config.max_frame_len).await?;
        let local_addr = transport.local_addr()?;
        let directory = spawn_directory(self.directory, self.config.directory());
        let registry = SessionRegistry::new();
        let roster = registry.roster();

        let reactor = Reactor::new(
            transport,
            JsonCodec,
            self.config,
            registry,
            directory.clone(),
        );

        Ok(MurmurServer {
            reactor,
            local_addr,
            roster,
            directory,
        })
    }
}

/// A bound Murmur server, ready to run.
pub struct MurmurServer {
    reactor: Reactor<TcpServerTransport, JsonCodec>,
    local_addr: SocketAddr,
    roster: Roster,
    directory: DirectoryHandle,
}

impl MurmurServer {
    /// Creates a new builder.
    pub fn builder() -> MurmurServerBuilder {
        MurmurServerBuilder::new()
    }

    /// The address the server is listening on. With port 0 this is the
    /// port the OS picked.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A live view of who is online.
    pub fn roster(&self) -> Roster {
        self.roster.clone()
    }

    /// A handle onto the server's directory actor.
    pub fn directory(&self) -> DirectoryHandle {
        self.directory.clone()
    }

    /// Serves until the process ends.
    pub async fn run(self) -> Result<(), MurmurError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `signal` resolves, then closes every connection and
    /// returns.
    pub async fn run_until(
        self,
        signal: impl Future<Output = ()> + Send,
    ) -> Result<(), MurmurError> {
        tracing::info!(addr = %self.local_addr, "Murmur server running");
        self.reactor.run(signal).await
    }
}
