//! Peer authentication engine for Aspia remote-desktop connections.
//!
//! This crate implements the server side of the authorization handshake:
//! - Wire message parsing and serialization
//! - Session-type negotiation against server and per-user policy
//! - The SRP verifier exchange, with synthetic records masking unknown
//!   and disabled usernames
//! - The anonymous fast path, gated on the server's long-term key
//!
//! The engine is transport-agnostic: the embedder owns the channel and a
//! single task queue, feeds received records into
//! [`server::ServerAuthenticator::on_bytes`], and acts on the returned
//! [`server::Step`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod server;
pub mod session;
pub mod user;

pub use error::{ConfigError, Error, Result};
pub use message::{Message, Status};
pub use server::{HandshakeResult, ServerAuthenticator, State, Step};
pub use session::{SessionType, SessionTypes};
pub use user::{UserList, UserRecord, UserStore};
