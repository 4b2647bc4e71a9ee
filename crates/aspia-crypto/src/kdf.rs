//! Session-key derivation.
//!
//! Both handshake variants funnel into the same derivation: a premaster
//! byte string is hashed twice under fixed domain-separation tags to
//! produce a 32-byte AEAD key and a 12-byte nonce seed.
//!
//! - Authenticated path: the premaster is the SRP shared secret S,
//!   left-padded to the width of N.
//! - Anonymous path: the premaster is
//!   `SHA-256(nonce_c || nonce_s || server_pub || "AspiaSession-Anon")`,
//!   so downstream traffic is encrypted even without a verifier exchange.
//!
//! The tags are wire-protocol constants; changing a single byte breaks
//! interoperability with every deployed peer.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Domain tag for session key derivation.
pub const SESSION_KEY_TAG: &[u8] = b"AspiaSession-K";

/// Domain tag for nonce seed derivation.
pub const SESSION_NONCE_TAG: &[u8] = b"AspiaSession-N";

/// Domain tag for the anonymous premaster.
pub const ANONYMOUS_TAG: &[u8] = b"AspiaSession-Anon";

/// Derived session material: AEAD key plus nonce seed.
pub struct SessionKeys {
    /// 32-byte AEAD key, wiped on drop.
    pub key: Zeroizing<[u8; 32]>,
    /// 12-byte nonce seed; combined with a counter per sealed record.
    pub iv: [u8; 12],
}

/// Derive session material from a premaster byte string.
///
/// ```text
/// key = SHA-256(premaster || "AspiaSession-K")
/// iv  = SHA-256(premaster || "AspiaSession-N")[0..12]
/// ```
///
/// The caller is expected to drop (and thereby wipe) the premaster right
/// after this returns.
pub fn derive_session_keys(premaster: &[u8]) -> SessionKeys {
    let mut key = Zeroizing::new([0u8; 32]);
    let mut hasher = Sha256::new();
    hasher.update(premaster);
    hasher.update(SESSION_KEY_TAG);
    key.copy_from_slice(&hasher.finalize());

    let mut hasher = Sha256::new();
    hasher.update(premaster);
    hasher.update(SESSION_NONCE_TAG);
    let digest = hasher.finalize();
    let mut iv = [0u8; 12];
    iv.copy_from_slice(&digest[..12]);

    SessionKeys { key, iv }
}

/// Derive session material for the anonymous path from the two hello
/// nonces and the server's advertised public key.
pub fn derive_anonymous_keys(
    nonce_c: &[u8; 32],
    nonce_s: &[u8; 32],
    server_public: &[u8],
) -> SessionKeys {
    let mut hasher = Sha256::new();
    hasher.update(nonce_c);
    hasher.update(nonce_s);
    hasher.update(server_public);
    hasher.update(ANONYMOUS_TAG);
    let mut premaster = Zeroizing::new([0u8; 32]);
    premaster.copy_from_slice(&hasher.finalize());
    derive_session_keys(premaster.as_slice())
}
