//! Server side of the SRP-6a verifier exchange (RFC 5054 flavor).
//!
//! Parameter choices are fixed for the whole protocol: SHA-256 everywhere,
//! big-endian serialization, and every group element left-padded to the
//! byte width of N before it is hashed. Hash inputs never carry length
//! prefixes, so the padding width is load-bearing; [`ServerExchange`] and
//! any client implementation must agree on it exactly.
//!
//! The exchange computes:
//!
//! ```text
//! k  = H(N || pad(g))
//! B  = (k*v + g^b) mod N          b random in [1, N-1)
//! u  = H(pad(A) || pad(B))
//! S  = (A * v^u)^b mod N
//! M1 = H(pad(A) || pad(B) || pad(S))
//! M2 = H(pad(A) || M1 || pad(S))
//! ```

use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::bignum::BigNum;
use crate::group::SrpGroup;
use crate::{Error, Result};

/// The SRP multiplier `k = H(N || pad(g))`.
pub fn compute_k(n: &BigNum, g: &BigNum) -> Result<BigNum> {
    let width = n.byte_len();
    let mut hasher = Sha256::new();
    hasher.update(n.to_bytes_be(width));
    hasher.update(g.to_bytes_be(width));
    BigNum::from_bytes_be(&hasher.finalize())
}

/// The scrambling parameter `u = H(pad(A) || pad(B))`.
///
/// # Errors
///
/// Returns [`Error::OutOfRange`] if the digest is zero; RFC 5054 requires
/// aborting in that case.
pub fn compute_u(a_pub: &BigNum, b_pub: &BigNum, width: usize) -> Result<BigNum> {
    let mut hasher = Sha256::new();
    hasher.update(a_pub.to_bytes_be(width));
    hasher.update(b_pub.to_bytes_be(width));
    let u = BigNum::from_bytes_be(&hasher.finalize())?;
    if u.is_zero() {
        return Err(Error::OutOfRange);
    }
    Ok(u)
}

/// Client proof `M1 = H(pad(A) || pad(B) || pad(S))`.
pub fn compute_m1(a_pub: &BigNum, b_pub: &BigNum, secret: &BigNum, width: usize) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a_pub.to_bytes_be(width));
    hasher.update(b_pub.to_bytes_be(width));
    hasher.update(secret.to_bytes_be(width));
    hasher.finalize().into()
}

/// Server proof `M2 = H(pad(A) || M1 || pad(S))`.
pub fn compute_m2(a_pub: &BigNum, m1: &[u8; 32], secret: &BigNum, width: usize) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(a_pub.to_bytes_be(width));
    hasher.update(m1);
    hasher.update(secret.to_bytes_be(width));
    hasher.finalize().into()
}

/// The private exponent `x = H(s || H(username || ":" || password))`
/// (RFC 2945 construction). Callers pass the normalized username.
pub fn compute_x(salt: &[u8], username: &str, password: &str) -> Result<BigNum> {
    let mut inner = Sha256::new();
    inner.update(username.as_bytes());
    inner.update(b":");
    inner.update(password.as_bytes());
    let identity = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(salt);
    outer.update(identity);
    BigNum::from_bytes_be(&outer.finalize())
}

/// Password verifier `v = g^x mod N` for storage in a user record.
///
/// # Errors
///
/// Propagates group decoding and arithmetic errors.
pub fn compute_verifier(
    group: &SrpGroup,
    salt: &[u8],
    username: &str,
    password: &str,
) -> Result<BigNum> {
    let n = group.modulus()?;
    let x = compute_x(salt, username, password)?;
    group.gen().mod_exp(&x, &n)
}

/// Per-handshake server state: the ephemeral pair (b, B) bound to one
/// user's verifier. Dropping the exchange wipes all scalars.
pub struct ServerExchange {
    n: BigNum,
    v: BigNum,
    b: BigNum,
    b_pub: BigNum,
}

/// Outcome of [`ServerExchange::finish`]: the proof pair plus the shared
/// secret, which is wiped on drop.
pub struct SessionProof {
    m1: [u8; 32],
    m2: [u8; 32],
    secret: Zeroizing<Vec<u8>>,
}

impl ServerExchange {
    /// Generate the ephemeral pair for one handshake.
    ///
    /// `verifier` is the stored `v = g^x mod N` for the user being
    /// authenticated (real or synthetic).
    ///
    /// # Errors
    ///
    /// Propagates group decoding, encoding, and range errors.
    pub fn new<R: CryptoRngCore + ?Sized>(
        group: &SrpGroup,
        verifier: &[u8],
        rng: &mut R,
    ) -> Result<Self> {
        let n = group.modulus()?;
        let g = group.gen();
        let v = BigNum::from_bytes_be(verifier)?.rem(&n)?;

        let b = BigNum::random_in_range(&n, rng)?;
        let k = compute_k(&n, &g)?;

        // B = (k*v + g^b) mod N; both terms are already below N.
        let kv = k.mod_mul(&v, &n)?;
        let gb = g.mod_exp(&b, &n)?;
        let sum = kv.add(&gb);
        let b_pub = if sum >= n { sum.sub(&n)? } else { sum };

        Ok(Self { n, v, b, b_pub })
    }

    /// The public ephemeral B, left-padded to the width of N.
    pub fn public_bytes(&self) -> Vec<u8> {
        self.b_pub.to_bytes_be(self.modulus_len())
    }

    /// Byte width of the group modulus.
    pub fn modulus_len(&self) -> usize {
        self.n.byte_len()
    }

    /// Absorb the client's public ephemeral A and produce the proof pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `A mod N == 0` (a malicious A
    /// that would pin S to zero) or when the scrambling parameter hashes
    /// to zero; [`Error::BadEncoding`] for an empty A.
    pub fn finish(&self, a_pub: &[u8]) -> Result<SessionProof> {
        let a = BigNum::from_bytes_be(a_pub)?;
        if a.is_zero_mod(&self.n)? {
            return Err(Error::OutOfRange);
        }

        let width = self.modulus_len();
        let u = compute_u(&a, &self.b_pub, width)?;

        // S = (A * v^u)^b mod N
        let vu = self.v.mod_exp(&u, &self.n)?;
        let base = a.mod_mul(&vu, &self.n)?;
        let secret = base.mod_exp(&self.b, &self.n)?;

        let m1 = compute_m1(&a, &self.b_pub, &secret, width);
        let m2 = compute_m2(&a, &m1, &secret, width);

        Ok(SessionProof {
            m1,
            m2,
            secret: Zeroizing::new(secret.to_bytes_be(width)),
        })
    }
}

impl SessionProof {
    /// Constant-time check of the client's M1 proof.
    pub fn verify_client(&self, proof: &[u8]) -> bool {
        proof.len() == self.m1.len() && bool::from(self.m1.as_slice().ct_eq(proof))
    }

    /// Server proof M2, sent in the session challenge.
    pub fn m2(&self) -> &[u8; 32] {
        &self.m2
    }

    /// The shared secret S, left-padded to the width of N. Feed this to the
    /// session KDF and drop the proof; the buffer is wiped on drop.
    pub fn shared_secret(&self) -> &[u8] {
        &self.secret
    }
}
