//! Wire protocol for Murmur.
//!
//! This crate defines what clients and the server say to each other:
//!
//! - **Types** ([`Message`], [`Response`], [`AccountName`]): the requests
//!   and replies that travel on the wire.
//! - **Schema** ([`classify`]): the per-action table of required fields
//!   that turns a decoded record into a typed [`Message`].
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become records
//!   and values become frames.
//! - **Errors** ([`DecodeError`], [`SchemaError`], [`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the
//! dispatcher (protocol state). It knows nothing about connections or
//! sessions.
//!
//! ```text
//! Transport (line) → Codec (record) → Schema (Message) → Dispatcher
//! ```

mod codec;
mod error;
mod schema;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::{DecodeError, ProtocolError, SchemaError};
pub use schema::classify;
pub use types::{
    AccountName, Action, ChatMessage, Message, Response, ServerFrame, Timestamp,
    User,
};
