//! Cryptographic primitives for the Aspia peer authentication handshake.
//!
//! This crate implements the cryptographic foundations the handshake is
//! built from:
//! - Big-number arithmetic with zero-on-drop scalar storage
//! - The SRP-6a group registry (RFC 5054 groups) and server-side exchange
//! - Session-key derivation (SHA-256, fixed domain tags)
//! - AEAD bootstrap (ChaCha20-Poly1305, AES-256-GCM)
//! - Long-term X25519 identity keys
//!
//! Security requirements observed throughout:
//! - No unsafe code
//! - All secrets use `Zeroizing` wrappers
//! - Constant-time comparisons via the `subtle` crate
//! - No logging of key material

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aead;
pub mod bignum;
pub mod error;
pub mod group;
pub mod kdf;
pub mod keys;
pub mod srp;

pub use aead::Cipher;
pub use bignum::BigNum;
pub use error::{Error, Result};
