//! Error types for the handshake engine.

use thiserror::Error;

use crate::message::Status;

/// Result type alias for handshake operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Handshake errors.
///
/// Every variant collapses to one of the five wire statuses via
/// [`Error::wire_status`]; the finer distinction exists for server-side
/// logs only and never reaches the peer.
#[derive(Debug, Error)]
pub enum Error {
    /// Frame could not be decoded.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Frame was shorter than its fields require.
    #[error("message truncated: need at least {0} bytes")]
    Truncated(usize),

    /// Frame type is not the one the current state expects.
    #[error("unexpected message for the current handshake state")]
    UnexpectedMessage,

    /// Client hello carried a version outside the supported range.
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u32),

    /// No authentication method shared between client and server policy.
    #[error("no authentication method in common")]
    NoMethodInCommon,

    /// No cipher shared between client and server.
    #[error("no cipher in common")]
    NoCipherInCommon,

    /// Requested session type is not in the allowed set.
    #[error("requested session type denied")]
    SessionDenied,

    /// Credentials did not verify (unknown user, wrong proof, bad ack).
    #[error("access denied")]
    AccessDenied,

    /// Client public ephemeral reduced to zero mod N.
    #[error("bad client public key")]
    BadClientKey,

    /// A state-machine field that must be present at this point is not.
    #[error("internal state invariant violated: {0}")]
    Internal(&'static str),

    /// Failure inside a cryptographic primitive.
    #[error("crypto error: {0}")]
    Crypto(#[from] aspia_crypto::Error),
}

impl Error {
    /// Collapse to the status reported on the wire.
    pub fn wire_status(&self) -> Status {
        match self {
            Error::UnsupportedVersion(_) => Status::UnsupportedVersion,
            Error::SessionDenied => Status::SessionDenied,
            Error::AccessDenied | Error::BadClientKey => Status::AccessDenied,
            // Tag mismatches surface as access denial, everything else as
            // a protocol violation.
            Error::Crypto(aspia_crypto::Error::Decryption(_)) => Status::AccessDenied,
            _ => Status::InvalidProtocol,
        }
    }
}

/// Configuration errors, raised synchronously to the embedder before or
/// during `start()`. These never produce a wire message.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Neither a user store nor anonymous access is configured.
    #[error("authenticator is not configured")]
    NotConfigured,

    /// The operation requires an installed private key.
    #[error("a private key must be installed first")]
    PrivateKeyRequired,

    /// The private key failed validation.
    #[error("invalid private key")]
    InvalidKey,

    /// Configuration is frozen once the handshake has started.
    #[error("authenticator already started")]
    AlreadyStarted,
}
