//! # Murmur
//!
//! A small real-time chat relay. Clients register a name ("presence"),
//! send directed text messages through the server, and keep a contact
//! list.
//!
//! One reactor task owns the listener, every connection, and the session
//! registry. Messages arrive as one JSON object per line, are validated
//! against a schema table, and are dispatched against the registry and a
//! contact directory running as its own actor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use murmur::prelude::*;
//!
//! # async fn example() -> Result<(), MurmurError> {
//! let config = murmur::config::load(Some("murmur.toml".as_ref()))?;
//! let server = MurmurServer::builder().config(config).build().await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod config;
pub mod dispatcher;
mod error;
mod reactor;
mod server;

pub use error::MurmurError;
pub use server::{MurmurServer, MurmurServerBuilder};

/// Re-exports of everything needed to run a server or write a client.
pub mod prelude {
    pub use crate::config::{ConfigError, ServerConfig};
    pub use crate::{MurmurError, MurmurServer, MurmurServerBuilder};
    pub use murmur_directory::{Directory, DirectoryError, MemoryDirectory};
    pub use murmur_protocol::{
        AccountName, Action, ChatMessage, Codec, JsonCodec, Message, Response,
        ServerFrame, Timestamp, User,
    };
    pub use murmur_session::{OnlineUser, Roster};
    pub use murmur_transport::{
        ClientTransport, FrameReader, FrameWriter, TcpClientTransport,
        DEFAULT_MAX_FRAME_LEN,
    };
}
