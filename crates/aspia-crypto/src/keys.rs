//! Long-term X25519 identity keys (RFC 7748).
//!
//! The server advertises the public half in its hello; the private half
//! stays inside the embedder and seeds the anonymous key derivation and
//! the synthetic user records. The handshake never performs a
//! Diffie-Hellman exchange with this key.

use rand_core::CryptoRngCore;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Byte length of both halves of the key pair.
pub const KEY_LEN: usize = 32;

/// X25519 key pair. The private scalar is wiped on drop.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate<R: CryptoRngCore + ?Sized>(rng: &mut R) -> Self {
        let mut raw = Zeroizing::new([0u8; KEY_LEN]);
        rng.fill_bytes(&mut *raw);
        let secret = StaticSecret::from(*raw);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Install a key pair from stored private-key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] when the slice is not exactly 32
    /// bytes or is all zeros.
    pub fn from_private_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| Error::InvalidKey("private key must be 32 bytes"))?;
        if raw == [0u8; KEY_LEN] {
            return Err(Error::InvalidKey("private key is all zeros"));
        }
        let secret = StaticSecret::from(raw);
        let public = PublicKey::from(&secret);
        Ok(Self { secret, public })
    }

    /// The public half, as advertised in the server hello.
    pub fn public_bytes(&self) -> &[u8; KEY_LEN] {
        self.public.as_bytes()
    }

    /// The private half, for keyed derivations. The returned buffer is
    /// wiped on drop; callers must not persist it.
    pub fn private_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(self.secret.to_bytes())
    }
}
