//! Arbitrary-precision unsigned integers for the SRP exchange.
//!
//! All values are opaque big-endian magnitudes; there is no sign and no
//! two's-complement interpretation anywhere in the handshake. The canonical
//! byte form of every value is kept in a [`Zeroizing`] buffer so scalar
//! material is wiped when a value is dropped.
//!
//! Arithmetic is delegated to `num-bigint`; the wrapper exists to pin down
//! the byte encoding (fixed-width, left-padded) that the handshake hashes
//! depend on.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::CryptoRngCore;
use zeroize::Zeroizing;

use crate::{Error, Result};

/// An unsigned big integer with zero-on-drop storage.
///
/// Equality and ordering compare magnitudes and are not constant-time;
/// protocol proofs (M1/M2) are compared elsewhere with `subtle`.
#[derive(Clone, PartialEq, Eq)]
pub struct BigNum {
    /// Canonical big-endian bytes, no leading zeros (zero is `[0]`).
    bytes: Zeroizing<Vec<u8>>,
}

impl BigNum {
    /// Parse a big-endian magnitude.
    ///
    /// Leading zeros are stripped, so a value round-trips through
    /// [`BigNum::to_bytes_be`] regardless of the padding it arrived with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BadEncoding`] for an empty slice.
    pub fn from_bytes_be(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::BadEncoding("empty byte string"));
        }
        Ok(Self::from_uint(&BigUint::from_bytes_be(bytes)))
    }

    /// Construct from a small integer constant.
    pub fn from_u32(value: u32) -> Self {
        Self::from_uint(&BigUint::from(value))
    }

    /// Serialize as big-endian, left-padded with zeros to at least `min_len`
    /// bytes. Values wider than `min_len` are emitted at their natural width.
    pub fn to_bytes_be(&self, min_len: usize) -> Vec<u8> {
        if self.bytes.len() >= min_len {
            return self.bytes.to_vec();
        }
        let mut out = vec![0u8; min_len];
        let start = min_len - self.bytes.len();
        out[start..].copy_from_slice(&self.bytes);
        out
    }

    /// Natural byte width of the value (1 for zero).
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the value is zero.
    pub fn is_zero(&self) -> bool {
        self.bytes.as_slice() == [0]
    }

    /// Sample a uniformly random value in `[1, upper)`.
    ///
    /// Uses rejection sampling so the distribution is exactly uniform over
    /// the interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `upper <= 1` (empty interval).
    pub fn random_in_range<R: CryptoRngCore + ?Sized>(upper: &BigNum, rng: &mut R) -> Result<Self> {
        let bound = upper.uint();
        if bound <= BigUint::one() {
            return Err(Error::OutOfRange);
        }
        let bits = bound.bits();
        let byte_len = usize::try_from(bits.div_ceil(8)).map_err(|_| Error::OutOfRange)?;
        let partial = (bits % 8) as u8;
        let top_mask = if partial == 0 {
            0xff
        } else {
            (1u8 << partial) - 1
        };

        let mut buf = Zeroizing::new(vec![0u8; byte_len]);
        loop {
            rng.fill_bytes(&mut buf);
            buf[0] &= top_mask;
            let candidate = BigUint::from_bytes_be(&buf);
            if !candidate.is_zero() && candidate < bound {
                return Ok(Self::from_uint(&candidate));
            }
        }
    }

    /// Compute `self ^ exp mod modulus`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `modulus` is zero.
    pub fn mod_exp(&self, exp: &BigNum, modulus: &BigNum) -> Result<Self> {
        if modulus.is_zero() {
            return Err(Error::OutOfRange);
        }
        Ok(Self::from_uint(&self.uint().modpow(&exp.uint(), &modulus.uint())))
    }

    /// Compute `self * other mod modulus`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `modulus` is zero.
    pub fn mod_mul(&self, other: &BigNum, modulus: &BigNum) -> Result<Self> {
        if modulus.is_zero() {
            return Err(Error::OutOfRange);
        }
        Ok(Self::from_uint(
            &((self.uint() * other.uint()) % modulus.uint()),
        ))
    }

    /// Compute `self mod modulus`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `modulus` is zero.
    pub fn rem(&self, modulus: &BigNum) -> Result<Self> {
        if modulus.is_zero() {
            return Err(Error::OutOfRange);
        }
        Ok(Self::from_uint(&(self.uint() % modulus.uint())))
    }

    /// Compute `self + other`.
    pub fn add(&self, other: &BigNum) -> Self {
        Self::from_uint(&(self.uint() + other.uint()))
    }

    /// Compute `self - other`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `other > self`; magnitudes cannot
    /// go negative.
    pub fn sub(&self, other: &BigNum) -> Result<Self> {
        let (a, b) = (self.uint(), other.uint());
        if b > a {
            return Err(Error::OutOfRange);
        }
        Ok(Self::from_uint(&(a - b)))
    }

    /// Whether `self mod modulus == 0`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] when `modulus` is zero.
    pub fn is_zero_mod(&self, modulus: &BigNum) -> Result<bool> {
        if modulus.is_zero() {
            return Err(Error::OutOfRange);
        }
        Ok((self.uint() % modulus.uint()).is_zero())
    }

    fn uint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.bytes)
    }

    fn from_uint(value: &BigUint) -> Self {
        Self {
            bytes: Zeroizing::new(value.to_bytes_be()),
        }
    }
}

impl PartialOrd for BigNum {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigNum {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        // Canonical form has no leading zeros, so the wider value is larger.
        self.bytes
            .len()
            .cmp(&other.bytes.len())
            .then_with(|| self.bytes.cmp(&other.bytes))
    }
}

impl core::fmt::Debug for BigNum {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Scalar values never appear in logs; only the width is shown.
        write!(f, "BigNum({} bytes)", self.bytes.len())
    }
}
