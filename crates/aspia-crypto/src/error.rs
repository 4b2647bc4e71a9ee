//! Error types for cryptographic operations.

use thiserror::Error;

/// Result type alias for cryptographic operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Byte string is not a valid big-endian magnitude.
    #[error("bad big-number encoding: {0}")]
    BadEncoding(&'static str),

    /// Value falls outside the range required by the operation.
    #[error("big-number value out of range")]
    OutOfRange,

    /// SRP group id is not present in the registry.
    #[error("unknown SRP group: 0x{0:04x}")]
    UnknownGroup(u16),

    /// Key material failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    /// AEAD encryption failed.
    #[error("AEAD encryption failed: {0}")]
    Encryption(String),

    /// AEAD decryption failed.
    #[error("AEAD decryption failed: {0}")]
    Decryption(String),
}
