//! Server-side authenticator state machine.
//!
//! One authenticator is owned 1:1 by a connected channel and driven by
//! the embedder from a single task queue: [`ServerAuthenticator::on_bytes`]
//! for every received record, [`ServerAuthenticator::on_write_done`] after
//! every completed write. Neither call blocks, and each consumes exactly
//! one event.
//!
//! The handshake has two branches after the hello exchange. The anonymous
//! branch completes immediately with keys derived from both nonces and the
//! server's long-term key. The SRP branch runs the verifier exchange and
//! proves both sides' knowledge of the shared secret before any session
//! material is released.
//!
//! Transcript binding: a running SHA-256 absorbs every handshake record in
//! channel order. The challenge blob is sealed with the transcript hash up
//! to (excluding) the challenge as associated data; the client's final ack
//! is an AEAD seal of the first 16 bytes of the transcript hash including
//! the challenge, under the same key with nonce counter 1.
//!
//! Failed credentials are not observable early: unknown and disabled
//! usernames continue with a synthetic record, and a wrong client proof
//! still receives a well-formed session challenge. The denial is only
//! reported after that challenge write completes, so both failure paths
//! cost the same wire traffic and the same arithmetic as a success.

use std::sync::Arc;

use rand_core::CryptoRngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use aspia_crypto::group::SrpGroup;
use aspia_crypto::kdf::{self, SessionKeys};
use aspia_crypto::keys::KeyPair;
use aspia_crypto::srp::ServerExchange;
use aspia_crypto::{aead, Cipher};

use crate::error::{ConfigError, Error};
use crate::message::{
    Message, Status, MAX_RAW_USERNAME, METHOD_ANONYMOUS, METHOD_SRP, MIN_PROTOCOL_VERSION,
    PROTOCOL_VERSION,
};
use crate::session::{SessionType, SessionTypes};
use crate::user::{self, UserStore};

/// Handshake states, exposed so a watchdog can fail stalled handshakes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the client hello.
    AwaitClientHello,
    /// Server hello queued, waiting for the write to complete.
    SendServerHello,
    /// Waiting for the username announcement (SRP branch).
    AwaitIdentify,
    /// Key-exchange message queued.
    SendServerKeyExchange,
    /// Waiting for the client ephemeral and proof.
    AwaitClientKeyExchange,
    /// Session challenge queued.
    SendSessionChallenge,
    /// Waiting for the client's final acknowledgement.
    AwaitSessionResponse,
    /// Handshake complete; the result is ready to take.
    Done,
    /// Handshake failed; no session material is available.
    Failed,
}

/// What the embedder must do after feeding an event in.
pub enum Step {
    /// Nothing to send; wait for the next event.
    Continue,
    /// Write this record, then call [`ServerAuthenticator::on_write_done`].
    Emit(Vec<u8>),
    /// Handshake complete. Write the final record if present, then take
    /// the result and hand the channel to the session layer.
    Done(Option<Vec<u8>>),
    /// Handshake failed. Best-effort write of the result record (write
    /// errors may be discarded), then close the channel.
    Fail(Status, Vec<u8>),
}

/// Negotiated session parameters, released exactly once on success.
pub struct HandshakeResult {
    /// The single session kind both sides settled on.
    pub session_type: SessionType,
    /// Authenticated username; empty on the anonymous path.
    pub username: String,
    /// 32-byte session key, wiped on drop.
    pub session_key: Zeroizing<[u8; 32]>,
    /// 12-byte nonce seed for session records.
    pub session_iv: [u8; 12],
    /// Negotiated AEAD suite.
    pub cipher: Cipher,
}

struct SrpFlow {
    exchange: ServerExchange,
    username: String,
    /// False when the record is synthetic or the user is disabled; the
    /// handshake is then doomed but must not show it yet.
    legit: bool,
    /// Session kinds offered to this user (user mask ∩ server mask).
    offered: SessionTypes,
}

/// Server-side authenticator for one connection.
pub struct ServerAuthenticator {
    state: State,
    started: bool,
    rng: Box<dyn CryptoRngCore + Send>,

    users: Option<Arc<dyn UserStore>>,
    key_pair: Option<KeyPair>,
    session_types: SessionTypes,
    anonymous: Option<SessionTypes>,

    method: u32,
    cipher: Option<Cipher>,
    nonce_c: [u8; 32],
    nonce_s: [u8; 32],
    client_sessions: SessionTypes,

    srp: Option<SrpFlow>,
    keys: Option<SessionKeys>,
    pending_denial: Option<Error>,
    transcript: Sha256,
    result: Option<HandshakeResult>,
}

impl ServerAuthenticator {
    /// Create an authenticator that will admit only `session_types`.
    pub fn new(session_types: SessionTypes) -> Self {
        Self::with_rng(session_types, Box::new(rand::rngs::OsRng))
    }

    /// Like [`ServerAuthenticator::new`] with caller-provided entropy.
    /// Production embedders want the default; this exists for deterministic
    /// tests and platforms with their own entropy source.
    pub fn with_rng(session_types: SessionTypes, rng: Box<dyn CryptoRngCore + Send>) -> Self {
        Self {
            state: State::AwaitClientHello,
            started: false,
            rng,
            users: None,
            key_pair: None,
            session_types,
            anonymous: None,
            method: 0,
            cipher: None,
            nonce_c: [0; 32],
            nonce_s: [0; 32],
            client_sessions: SessionTypes::NONE,
            srp: None,
            keys: None,
            pending_denial: None,
            transcript: Sha256::new(),
            result: None,
        }
    }

    /// Install the user store. May be called repeatedly before `start()`;
    /// the last store wins.
    ///
    /// # Errors
    ///
    /// [`ConfigError::AlreadyStarted`] once the handshake is running.
    pub fn set_user_list(&mut self, users: Arc<dyn UserStore>) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }
        self.users = Some(users);
        Ok(())
    }

    /// Install the long-term private key (32 bytes, non-zero).
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidKey`] for a malformed key,
    /// [`ConfigError::AlreadyStarted`] once the handshake is running.
    pub fn set_private_key(&mut self, private_key: &[u8]) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }
        let pair = KeyPair::from_private_bytes(private_key).map_err(|_| ConfigError::InvalidKey)?;
        self.key_pair = Some(pair);
        Ok(())
    }

    /// Enable or disable anonymous access, restricted to `session_types`.
    /// Disabled by default.
    ///
    /// # Errors
    ///
    /// [`ConfigError::PrivateKeyRequired`] when no private key is
    /// installed, [`ConfigError::AlreadyStarted`] once running.
    pub fn set_anonymous_access(
        &mut self,
        enable: bool,
        session_types: SessionTypes,
    ) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }
        if self.key_pair.is_none() {
            return Err(ConfigError::PrivateKeyRequired);
        }
        self.anonymous = enable.then_some(session_types);
        Ok(())
    }

    /// Freeze configuration and begin waiting for the client hello.
    ///
    /// # Errors
    ///
    /// [`ConfigError::PrivateKeyRequired`] when no key is installed,
    /// [`ConfigError::NotConfigured`] when neither a user store nor
    /// anonymous access is set up, [`ConfigError::AlreadyStarted`] on a
    /// second call.
    pub fn start(&mut self) -> Result<(), ConfigError> {
        if self.started {
            return Err(ConfigError::AlreadyStarted);
        }
        if self.key_pair.is_none() {
            return Err(ConfigError::PrivateKeyRequired);
        }
        if self.users.is_none() && self.anonymous.is_none() {
            return Err(ConfigError::NotConfigured);
        }
        self.started = true;
        tracing::debug!("authenticator started, waiting for client hello");
        Ok(())
    }

    /// Current state, for watchdogs. Timeouts are the embedder's job.
    pub fn state(&self) -> State {
        self.state
    }

    /// Consume exactly one received record.
    pub fn on_bytes(&mut self, record: &[u8]) -> Step {
        match self.process_record(record) {
            Ok(step) => step,
            Err(err) => self.fail(err),
        }
    }

    /// Advance a pending send state after the write completed.
    pub fn on_write_done(&mut self) -> Step {
        match self.advance_after_write() {
            Ok(step) => step,
            Err(err) => self.fail(err),
        }
    }

    /// Take the negotiated session parameters. Returns `Some` exactly once,
    /// and only in [`State::Done`].
    pub fn take_result(&mut self) -> Option<HandshakeResult> {
        if self.state != State::Done {
            return None;
        }
        self.result.take()
    }

    fn process_record(&mut self, record: &[u8]) -> Result<Step, Error> {
        if !self.started {
            return Err(Error::UnexpectedMessage);
        }
        match self.state {
            State::AwaitClientHello => self.on_client_hello(record),
            State::AwaitIdentify => self.on_identify(record),
            State::AwaitClientKeyExchange => self.on_client_key_exchange(record),
            State::AwaitSessionResponse => self.on_session_response(record),
            // A record while a write is pending, or after the handshake
            // ended, is a protocol violation.
            _ => Err(Error::UnexpectedMessage),
        }
    }

    fn advance_after_write(&mut self) -> Result<Step, Error> {
        match self.state {
            State::SendServerHello => {
                if self.method == METHOD_ANONYMOUS {
                    self.finish_anonymous()
                } else {
                    self.state = State::AwaitIdentify;
                    Ok(Step::Continue)
                }
            }
            State::SendServerKeyExchange => {
                self.state = State::AwaitClientKeyExchange;
                Ok(Step::Continue)
            }
            State::SendSessionChallenge => {
                // Equal-time denial: the challenge went out looking real;
                // only now does the armed failure fire.
                if let Some(denial) = self.pending_denial.take() {
                    return Err(denial);
                }
                self.state = State::AwaitSessionResponse;
                Ok(Step::Continue)
            }
            // Writes of the final result record need no state change.
            _ => Ok(Step::Continue),
        }
    }

    fn on_client_hello(&mut self, record: &[u8]) -> Result<Step, Error> {
        let Message::ClientHello {
            version,
            methods,
            ciphers,
            session_mask,
            nonce,
        } = Message::parse(record)?
        else {
            return Err(Error::UnexpectedMessage);
        };
        self.transcript.update(record);

        if !(MIN_PROTOCOL_VERSION..=PROTOCOL_VERSION).contains(&version) {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut available = 0;
        if self.users.is_some() {
            available |= METHOD_SRP;
        }
        if self.anonymous.is_some() {
            available |= METHOD_ANONYMOUS;
        }
        let common = methods & available;
        if common == 0 {
            return Err(Error::NoMethodInCommon);
        }
        // Authenticated access wins when the client offers both.
        self.method = if common & METHOD_SRP != 0 {
            METHOD_SRP
        } else {
            METHOD_ANONYMOUS
        };

        let cipher = Cipher::select(ciphers).ok_or(Error::NoCipherInCommon)?;
        self.cipher = Some(cipher);
        self.client_sessions = SessionTypes::from_bits_truncate(session_mask);
        self.nonce_c = nonce;
        self.rng.fill_bytes(&mut self.nonce_s);

        let key_pair = self
            .key_pair
            .as_ref()
            .ok_or(Error::Internal("no key pair after start"))?;
        let hello = Message::ServerHello {
            version: PROTOCOL_VERSION,
            method: self.method,
            cipher: cipher.to_u32(),
            nonce: self.nonce_s,
            public_key: key_pair.public_bytes().to_vec(),
        }
        .serialize();
        self.transcript.update(&hello);

        tracing::debug!(
            method = self.method,
            cipher = ?cipher,
            "client hello accepted"
        );
        self.state = State::SendServerHello;
        Ok(Step::Emit(hello))
    }

    fn finish_anonymous(&mut self) -> Result<Step, Error> {
        let anonymous = self
            .anonymous
            .ok_or(Error::Internal("anonymous method without policy"))?;
        let key_pair = self
            .key_pair
            .as_ref()
            .ok_or(Error::Internal("no key pair after start"))?;

        let permitted = self
            .client_sessions
            .intersection(self.session_types)
            .intersection(anonymous);
        let chosen = permitted.first().ok_or(Error::SessionDenied)?;

        let keys = kdf::derive_anonymous_keys(&self.nonce_c, &self.nonce_s, key_pair.public_bytes());
        let cipher = self.cipher.ok_or(Error::Internal("no cipher selected"))?;

        self.result = Some(HandshakeResult {
            session_type: chosen,
            username: String::new(),
            session_key: keys.key.clone(),
            session_iv: keys.iv,
            cipher,
        });
        self.keys = Some(keys);
        self.state = State::Done;
        tracing::debug!(session_type = %chosen, "anonymous handshake complete");

        let result = Message::Result {
            status: Status::Success,
            session_type: chosen.bits(),
        }
        .serialize();
        Ok(Step::Done(Some(result)))
    }

    fn on_identify(&mut self, record: &[u8]) -> Result<Step, Error> {
        let Message::Identify { username, group_id } = Message::parse(record)? else {
            return Err(Error::UnexpectedMessage);
        };
        self.transcript.update(record);

        let normalized = user::normalize_username(&username)?;
        debug_assert!(normalized.len() <= MAX_RAW_USERNAME);

        let key_pair = self
            .key_pair
            .as_ref()
            .ok_or(Error::Internal("no key pair after start"))?;
        let users = self
            .users
            .as_ref()
            .ok_or(Error::Internal("SRP method without user store"))?;

        // Unknown and disabled users get a deterministic decoy record so
        // the reply is indistinguishable from a real one.
        let (record_data, legit) = match users.find(&normalized) {
            Some(found) if found.enabled => (found, true),
            _ => {
                let decoy = user::synthetic_record(
                    &key_pair.private_bytes(),
                    &normalized,
                    SrpGroup::default_group(),
                    self.session_types,
                )?;
                (decoy, false)
            }
        };
        // The client's group hint is advisory only; the record decides,
        // falling back to the default group when the record names one this
        // build no longer ships.
        let group = SrpGroup::find(record_data.group_id)
            .unwrap_or_else(|_| SrpGroup::default_group());
        if group_id != u32::from(group.id) {
            tracing::debug!(
                hint = group_id,
                chosen = u32::from(group.id),
                "ignoring client group hint"
            );
        }

        let offered = record_data.sessions.intersection(self.session_types);
        let exchange = ServerExchange::new(group, &record_data.verifier, &mut *self.rng)?;

        let reply = Message::ServerKeyExchange {
            salt: record_data.salt,
            b_pub: exchange.public_bytes(),
            group_id: u32::from(group.id),
            session_mask: offered.bits(),
        }
        .serialize();
        self.transcript.update(&reply);

        self.srp = Some(SrpFlow {
            exchange,
            username: normalized,
            legit,
            offered,
        });
        self.state = State::SendServerKeyExchange;
        tracing::debug!(group = u32::from(group.id), "identify processed");
        Ok(Step::Emit(reply))
    }

    fn on_client_key_exchange(&mut self, record: &[u8]) -> Result<Step, Error> {
        let Message::ClientKeyExchange { a_pub, m1 } = Message::parse(record)? else {
            return Err(Error::UnexpectedMessage);
        };
        self.transcript.update(record);

        let flow = self
            .srp
            .as_ref()
            .ok_or(Error::Internal("key exchange without SRP flow"))?;
        let offered = flow.offered;

        let proof = flow.exchange.finish(&a_pub).map_err(|err| match err {
            aspia_crypto::Error::OutOfRange | aspia_crypto::Error::BadEncoding(_) => {
                Error::BadClientKey
            }
            other => Error::Crypto(other),
        })?;

        // Arm the denial instead of failing: the challenge below must go
        // out first so a failed proof costs the same as a good one.
        if !proof.verify_client(&m1) || !flow.legit {
            self.pending_denial = Some(Error::AccessDenied);
        }

        let keys = kdf::derive_session_keys(proof.shared_secret());
        let cipher = self.cipher.ok_or(Error::Internal("no cipher selected"))?;

        let mut params = Vec::with_capacity(8);
        params.extend_from_slice(&offered.bits().to_le_bytes());
        params.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());

        let aad = self.transcript_hash();
        let nonce = aead::nonce_with_counter(&keys.iv, 0);
        let blob = aead::seal(cipher, &keys.key, &nonce, &params, &aad)?;

        let challenge = Message::SessionChallenge {
            m2: *proof.m2(),
            blob,
        }
        .serialize();
        self.transcript.update(&challenge);

        self.keys = Some(keys);
        self.state = State::SendSessionChallenge;
        Ok(Step::Emit(challenge))
    }

    fn on_session_response(&mut self, record: &[u8]) -> Result<Step, Error> {
        let Message::SessionResponse { ack, session_type } = Message::parse(record)? else {
            return Err(Error::UnexpectedMessage);
        };

        let keys = self
            .keys
            .as_ref()
            .ok_or(Error::Internal("session response without keys"))?;
        let cipher = self.cipher.ok_or(Error::Internal("no cipher selected"))?;

        // The ack seals the first half of the transcript hash under the
        // session key; opening it proves the client derived the same key
        // and saw the same transcript.
        let aad = self.transcript_hash();
        let nonce = aead::nonce_with_counter(&keys.iv, 1);
        let opened =
            aead::open(cipher, &keys.key, &nonce, &ack, &aad).map_err(|_| Error::AccessDenied)?;
        if opened.len() != 16 || !bool::from(opened.ct_eq(&aad[..16])) {
            return Err(Error::AccessDenied);
        }

        let chosen = SessionType::from_bits(session_type).ok_or(Error::SessionDenied)?;
        let flow = self
            .srp
            .as_ref()
            .ok_or(Error::Internal("session response without SRP flow"))?;
        if !flow.offered.contains(chosen) {
            return Err(Error::SessionDenied);
        }

        self.result = Some(HandshakeResult {
            session_type: chosen,
            username: flow.username.clone(),
            session_key: keys.key.clone(),
            session_iv: keys.iv,
            cipher,
        });
        self.state = State::Done;
        tracing::debug!(session_type = %chosen, "handshake complete");
        Ok(Step::Done(None))
    }

    fn fail(&mut self, err: Error) -> Step {
        let status = err.wire_status();
        tracing::warn!(%err, ?status, "handshake failed");

        // No session material survives a failure.
        self.srp = None;
        self.keys = None;
        self.result = None;
        self.pending_denial = None;
        self.state = State::Failed;

        let record = Message::Result {
            status,
            session_type: 0,
        }
        .serialize();
        Step::Fail(status, record)
    }

    fn transcript_hash(&self) -> [u8; 32] {
        self.transcript.clone().finalize().into()
    }
}
