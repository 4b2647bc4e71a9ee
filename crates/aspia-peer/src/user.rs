//! User verifier store.
//!
//! The server never sees passwords; it stores one SRP verifier record per
//! user. Lookups are case-insensitive: every username is normalized with
//! the standard Unicode lowercase mapping (`str::to_lowercase`) before it
//! is stored or looked up.
//!
//! When a lookup misses (or hits a disabled user) the authenticator
//! continues with a synthetic record derived deterministically from the
//! server's private key, so the wire traffic and timing up to the session
//! challenge match the legitimate path exactly.

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use rand_core::CryptoRngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use aspia_crypto::group::SrpGroup;
use aspia_crypto::srp;
use aspia_crypto::BigNum;

use crate::session::SessionTypes;
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Maximum username length in bytes after normalization.
pub const MAX_USERNAME_LEN: usize = 128;

/// Salt length generated for new verifier records.
pub const SALT_LEN: usize = 32;

/// One stored verifier record.
#[derive(Clone)]
pub struct UserRecord {
    /// Verifier salt.
    pub salt: Vec<u8>,
    /// SRP verifier `v = g^x mod N`, padded to the group modulus width.
    pub verifier: Vec<u8>,
    /// Id of the group the verifier was computed against.
    pub group_id: u16,
    /// Session kinds this user may open.
    pub sessions: SessionTypes,
    /// Disabled users fail authentication without revealing that they
    /// exist.
    pub enabled: bool,
}

/// Read-only verifier lookup, shared across handshakes.
///
/// Implementations must be safe for concurrent reads and should be
/// constant-time with respect to username existence where feasible.
pub trait UserStore: Send + Sync {
    /// Look up a record by normalized username.
    fn find(&self, username: &str) -> Option<UserRecord>;
}

/// Normalize a username for storage and lookup.
///
/// # Errors
///
/// Returns [`Error::Malformed`] for an empty name or one longer than
/// [`MAX_USERNAME_LEN`] bytes after lowercasing.
pub fn normalize_username(raw: &str) -> Result<String> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(Error::Malformed("empty username".into()));
    }
    if normalized.len() > MAX_USERNAME_LEN {
        return Err(Error::Malformed("username too long".into()));
    }
    Ok(normalized)
}

/// In-memory user list.
///
/// Registration computes the verifier from the password, so the password
/// itself is dropped before this call returns.
#[derive(Default)]
pub struct UserList {
    users: HashMap<String, UserRecord>,
}

impl UserList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with a fresh salt and a verifier against the
    /// default group.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for an invalid username; propagates
    /// verifier computation errors.
    pub fn add<R: CryptoRngCore + ?Sized>(
        &mut self,
        username: &str,
        password: &str,
        sessions: SessionTypes,
        rng: &mut R,
    ) -> Result<()> {
        let normalized = normalize_username(username)?;
        let group = SrpGroup::default_group();

        let mut salt = vec![0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);

        let verifier = srp::compute_verifier(group, &salt, &normalized, password)?;
        self.users.insert(
            normalized,
            UserRecord {
                salt,
                verifier: verifier.to_bytes_be(group.modulus_len()),
                group_id: group.id,
                sessions,
                enabled: true,
            },
        );
        Ok(())
    }

    /// Insert a pre-built record (salt and verifier imported from
    /// storage).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for an invalid username.
    pub fn add_record(&mut self, username: &str, record: UserRecord) -> Result<()> {
        let normalized = normalize_username(username)?;
        self.users.insert(normalized, record);
        Ok(())
    }

    /// Enable or disable a user. Returns false when the user is unknown.
    pub fn set_enabled(&mut self, username: &str, enabled: bool) -> bool {
        let Ok(normalized) = normalize_username(username) else {
            return false;
        };
        match self.users.get_mut(&normalized) {
            Some(record) => {
                record.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Remove a user. Returns false when the user is unknown.
    pub fn remove(&mut self, username: &str) -> bool {
        let Ok(normalized) = normalize_username(username) else {
            return false;
        };
        self.users.remove(&normalized).is_some()
    }

    /// Number of registered users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserStore for UserList {
    fn find(&self, username: &str) -> Option<UserRecord> {
        self.users.get(username).cloned()
    }
}

/// Build the decoy record for an unknown or disabled username.
///
/// Salt and verifier are derived from
/// `HMAC-SHA256(private_key, normalized_username)`, so the same username
/// always produces the same parameters and a probing client cannot tell a
/// decoy from a real record. `sessions` mirrors what a real record would
/// offer so the key-exchange message is indistinguishable too.
pub(crate) fn synthetic_record(
    private_key: &Zeroizing<[u8; 32]>,
    username: &str,
    group: &'static SrpGroup,
    sessions: SessionTypes,
) -> Result<UserRecord> {
    let seed = keyed_digest(private_key.as_slice(), &[username.as_bytes()])?;

    let salt = keyed_digest(&seed, &[b"decoy-salt"])?.to_vec();

    // Expand to the modulus width with a counter, then reduce mod N so the
    // decoy verifier is a valid group element.
    let width = group.modulus_len();
    let mut stream = Vec::with_capacity(width + 32);
    let mut counter = 0u8;
    while stream.len() < width {
        let block = keyed_digest(&seed, &[b"decoy-verifier", &[counter]])?;
        stream.extend_from_slice(&block);
        counter = counter.wrapping_add(1);
    }
    stream.truncate(width);

    let n = group.modulus()?;
    let verifier = BigNum::from_bytes_be(&stream)?.rem(&n)?;

    Ok(UserRecord {
        salt,
        verifier: verifier.to_bytes_be(width),
        group_id: group.id,
        sessions,
        enabled: true,
    })
}

fn keyed_digest(key: &[u8], parts: &[&[u8]]) -> Result<[u8; 32]> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| Error::Internal("hmac key setup"))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}
