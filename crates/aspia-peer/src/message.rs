//! Handshake message parsing and serialization.
//!
//! Every message is one length-delimited record on the channel; the codec
//! here only sees the payload of one record. Wire layout follows the
//! house convention: 4-byte ASCII magic, 1-byte message type, then fields
//! with little-endian integers, fixed 32-byte arrays inline, and variable
//! byte strings prefixed by a u16 length.

use crate::{Error, Result};

/// Protocol version emitted and accepted by this implementation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Oldest client version the server still accepts.
pub const MIN_PROTOCOL_VERSION: u32 = 1;

/// Method bit for the anonymous handshake path.
pub const METHOD_ANONYMOUS: u32 = 0x01;

/// Method bit for the SRP verifier exchange.
pub const METHOD_SRP: u32 = 0x02;

/// Hard cap on the raw username field; normalization applies a tighter
/// limit afterwards.
pub const MAX_RAW_USERNAME: usize = 256;

/// Minimum salt length a server key exchange may carry.
pub const MIN_SALT_LEN: usize = 16;

// Message magic numbers (4 bytes, ASCII mnemonic).
/// Magic number for ClientHello (0x41504348 = "APCH").
pub const MAGIC_CLIENT_HELLO: u32 = 0x4150_4348;
/// Magic number for ServerHello (0x41505348 = "APSH").
pub const MAGIC_SERVER_HELLO: u32 = 0x4150_5348;
/// Magic number for Identify (0x41504944 = "APID").
pub const MAGIC_IDENTIFY: u32 = 0x4150_4944;
/// Magic number for ServerKeyExchange (0x4150534B = "APSK").
pub const MAGIC_SERVER_KEY_EXCHANGE: u32 = 0x4150_534B;
/// Magic number for ClientKeyExchange (0x4150434B = "APCK").
pub const MAGIC_CLIENT_KEY_EXCHANGE: u32 = 0x4150_434B;
/// Magic number for SessionChallenge (0x41505343 = "APSC").
pub const MAGIC_SESSION_CHALLENGE: u32 = 0x4150_5343;
/// Magic number for SessionResponse (0x41505352 = "APSR").
pub const MAGIC_SESSION_RESPONSE: u32 = 0x4150_5352;
/// Magic number for Result (0x41505253 = "APRS").
pub const MAGIC_RESULT: u32 = 0x4150_5253;

// Message type identifiers (1 byte).
/// Type identifier for ClientHello.
pub const TYPE_CLIENT_HELLO: u8 = 0x01;
/// Type identifier for ServerHello.
pub const TYPE_SERVER_HELLO: u8 = 0x02;
/// Type identifier for Identify.
pub const TYPE_IDENTIFY: u8 = 0x03;
/// Type identifier for ServerKeyExchange.
pub const TYPE_SERVER_KEY_EXCHANGE: u8 = 0x04;
/// Type identifier for ClientKeyExchange.
pub const TYPE_CLIENT_KEY_EXCHANGE: u8 = 0x05;
/// Type identifier for SessionChallenge.
pub const TYPE_SESSION_CHALLENGE: u8 = 0x06;
/// Type identifier for SessionResponse.
pub const TYPE_SESSION_RESPONSE: u8 = 0x07;
/// Type identifier for Result.
pub const TYPE_RESULT: u8 = 0x08;

/// Final handshake status reported to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    /// Handshake completed; a session follows.
    Success = 0x01,
    /// Credentials did not verify.
    AccessDenied = 0x02,
    /// Requested session type is not permitted.
    SessionDenied = 0x03,
    /// Malformed or out-of-order message, or no common parameters.
    InvalidProtocol = 0x04,
    /// Client version outside the supported range.
    UnsupportedVersion = 0x05,
}

impl Status {
    /// Convert to wire format.
    pub fn to_u32(self) -> u32 {
        self as u32
    }

    /// Convert from wire format.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x01 => Some(Self::Success),
            0x02 => Some(Self::AccessDenied),
            0x03 => Some(Self::SessionDenied),
            0x04 => Some(Self::InvalidProtocol),
            0x05 => Some(Self::UnsupportedVersion),
            _ => None,
        }
    }
}

/// Handshake messages, in protocol order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Opening message from the client.
    ClientHello {
        /// Client protocol version.
        version: u32,
        /// Offered method bits (METHOD_ANONYMOUS, METHOD_SRP).
        methods: u32,
        /// Offered cipher bits.
        ciphers: u32,
        /// Session kinds the client wants to open.
        session_mask: u32,
        /// Client random nonce.
        nonce: [u8; 32],
    },

    /// Server's parameter selection.
    ServerHello {
        /// Server protocol version.
        version: u32,
        /// Chosen method bit.
        method: u32,
        /// Chosen cipher bit.
        cipher: u32,
        /// Server random nonce.
        nonce: [u8; 32],
        /// Server's long-term public key.
        public_key: Vec<u8>,
    },

    /// Username announcement (SRP path only).
    Identify {
        /// UTF-8 username, not yet normalized.
        username: String,
        /// Advisory group id hint; the server's choice wins.
        group_id: u32,
    },

    /// Server's SRP parameters for this user.
    ServerKeyExchange {
        /// Verifier salt (at least [`MIN_SALT_LEN`] bytes).
        salt: Vec<u8>,
        /// Server public ephemeral B, padded to the modulus width.
        b_pub: Vec<u8>,
        /// Authoritative group id.
        group_id: u32,
        /// Session kinds the server is willing to offer this user.
        session_mask: u32,
    },

    /// Client's SRP ephemeral and proof.
    ClientKeyExchange {
        /// Client public ephemeral A.
        a_pub: Vec<u8>,
        /// Client proof M1.
        m1: [u8; 32],
    },

    /// Server proof plus encrypted session parameters.
    SessionChallenge {
        /// Server proof M2.
        m2: [u8; 32],
        /// AEAD-sealed session parameters; associated data is the
        /// transcript hash up to (excluding) this message.
        blob: Vec<u8>,
    },

    /// Client's final acknowledgement.
    SessionResponse {
        /// AEAD seal over the transcript (see the server documentation
        /// for the exact construction).
        ack: [u8; 32],
        /// The single session-type bit the client settled on.
        session_type: u32,
    },

    /// Terminal status, sent by the server.
    Result {
        /// Wire status code.
        status: Status,
        /// Chosen session type on the anonymous path, 0 otherwise.
        session_type: u32,
    },
}

impl Message {
    /// Parse one message from a channel record.
    ///
    /// # Errors
    ///
    /// [`Error::Truncated`] when the buffer ends inside a field,
    /// [`Error::Malformed`] for unknown magic/type pairs and invalid
    /// field values.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(Error::Truncated(5));
        }
        let magic = read_u32_le(&data[0..4]);
        let msg_type = data[4];
        let body = &data[5..];

        match (magic, msg_type) {
            (MAGIC_CLIENT_HELLO, TYPE_CLIENT_HELLO) => Self::parse_client_hello(body),
            (MAGIC_SERVER_HELLO, TYPE_SERVER_HELLO) => Self::parse_server_hello(body),
            (MAGIC_IDENTIFY, TYPE_IDENTIFY) => Self::parse_identify(body),
            (MAGIC_SERVER_KEY_EXCHANGE, TYPE_SERVER_KEY_EXCHANGE) => {
                Self::parse_server_key_exchange(body)
            }
            (MAGIC_CLIENT_KEY_EXCHANGE, TYPE_CLIENT_KEY_EXCHANGE) => {
                Self::parse_client_key_exchange(body)
            }
            (MAGIC_SESSION_CHALLENGE, TYPE_SESSION_CHALLENGE) => {
                Self::parse_session_challenge(body)
            }
            (MAGIC_SESSION_RESPONSE, TYPE_SESSION_RESPONSE) => Self::parse_session_response(body),
            (MAGIC_RESULT, TYPE_RESULT) => Self::parse_result(body),
            _ => Err(Error::Malformed(format!(
                "unknown message: magic=0x{magic:08X}, type=0x{msg_type:02X}"
            ))),
        }
    }

    /// Serialize to one channel record.
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Message::ClientHello {
                version,
                methods,
                ciphers,
                session_mask,
                nonce,
            } => {
                let mut buf = header(MAGIC_CLIENT_HELLO, TYPE_CLIENT_HELLO);
                buf.extend_from_slice(&version.to_le_bytes());
                buf.extend_from_slice(&methods.to_le_bytes());
                buf.extend_from_slice(&ciphers.to_le_bytes());
                buf.extend_from_slice(&session_mask.to_le_bytes());
                buf.extend_from_slice(nonce);
                buf
            }
            Message::ServerHello {
                version,
                method,
                cipher,
                nonce,
                public_key,
            } => {
                let mut buf = header(MAGIC_SERVER_HELLO, TYPE_SERVER_HELLO);
                buf.extend_from_slice(&version.to_le_bytes());
                buf.extend_from_slice(&method.to_le_bytes());
                buf.extend_from_slice(&cipher.to_le_bytes());
                buf.extend_from_slice(nonce);
                write_bytes16(&mut buf, public_key);
                buf
            }
            Message::Identify { username, group_id } => {
                let mut buf = header(MAGIC_IDENTIFY, TYPE_IDENTIFY);
                write_bytes16(&mut buf, username.as_bytes());
                buf.extend_from_slice(&group_id.to_le_bytes());
                buf
            }
            Message::ServerKeyExchange {
                salt,
                b_pub,
                group_id,
                session_mask,
            } => {
                let mut buf = header(MAGIC_SERVER_KEY_EXCHANGE, TYPE_SERVER_KEY_EXCHANGE);
                write_bytes16(&mut buf, salt);
                write_bytes16(&mut buf, b_pub);
                buf.extend_from_slice(&group_id.to_le_bytes());
                buf.extend_from_slice(&session_mask.to_le_bytes());
                buf
            }
            Message::ClientKeyExchange { a_pub, m1 } => {
                let mut buf = header(MAGIC_CLIENT_KEY_EXCHANGE, TYPE_CLIENT_KEY_EXCHANGE);
                write_bytes16(&mut buf, a_pub);
                buf.extend_from_slice(m1);
                buf
            }
            Message::SessionChallenge { m2, blob } => {
                let mut buf = header(MAGIC_SESSION_CHALLENGE, TYPE_SESSION_CHALLENGE);
                buf.extend_from_slice(m2);
                write_bytes16(&mut buf, blob);
                buf
            }
            Message::SessionResponse { ack, session_type } => {
                let mut buf = header(MAGIC_SESSION_RESPONSE, TYPE_SESSION_RESPONSE);
                buf.extend_from_slice(ack);
                buf.extend_from_slice(&session_type.to_le_bytes());
                buf
            }
            Message::Result {
                status,
                session_type,
            } => {
                let mut buf = header(MAGIC_RESULT, TYPE_RESULT);
                buf.extend_from_slice(&status.to_u32().to_le_bytes());
                buf.extend_from_slice(&session_type.to_le_bytes());
                buf
            }
        }
    }

    fn parse_client_hello(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let version = take_u32(data, &mut offset)?;
        let methods = take_u32(data, &mut offset)?;
        let ciphers = take_u32(data, &mut offset)?;
        let session_mask = take_u32(data, &mut offset)?;
        let nonce = take_array32(data, &mut offset)?;
        expect_end(data, offset)?;
        Ok(Message::ClientHello {
            version,
            methods,
            ciphers,
            session_mask,
            nonce,
        })
    }

    fn parse_server_hello(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let version = take_u32(data, &mut offset)?;
        let method = take_u32(data, &mut offset)?;
        let cipher = take_u32(data, &mut offset)?;
        let nonce = take_array32(data, &mut offset)?;
        let public_key = take_bytes16(data, &mut offset)?;
        expect_end(data, offset)?;
        Ok(Message::ServerHello {
            version,
            method,
            cipher,
            nonce,
            public_key,
        })
    }

    fn parse_identify(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let raw = take_bytes16(data, &mut offset)?;
        let group_id = take_u32(data, &mut offset)?;
        expect_end(data, offset)?;
        if raw.len() > MAX_RAW_USERNAME {
            return Err(Error::Malformed("username too long".into()));
        }
        let username =
            String::from_utf8(raw).map_err(|_| Error::Malformed("username is not UTF-8".into()))?;
        Ok(Message::Identify { username, group_id })
    }

    fn parse_server_key_exchange(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let salt = take_bytes16(data, &mut offset)?;
        let b_pub = take_bytes16(data, &mut offset)?;
        let group_id = take_u32(data, &mut offset)?;
        let session_mask = take_u32(data, &mut offset)?;
        expect_end(data, offset)?;
        if salt.len() < MIN_SALT_LEN {
            return Err(Error::Malformed("salt below minimum length".into()));
        }
        Ok(Message::ServerKeyExchange {
            salt,
            b_pub,
            group_id,
            session_mask,
        })
    }

    fn parse_client_key_exchange(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let a_pub = take_bytes16(data, &mut offset)?;
        let m1 = take_array32(data, &mut offset)?;
        expect_end(data, offset)?;
        if a_pub.is_empty() {
            return Err(Error::Malformed("empty client ephemeral".into()));
        }
        Ok(Message::ClientKeyExchange { a_pub, m1 })
    }

    fn parse_session_challenge(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let m2 = take_array32(data, &mut offset)?;
        let blob = take_bytes16(data, &mut offset)?;
        expect_end(data, offset)?;
        Ok(Message::SessionChallenge { m2, blob })
    }

    fn parse_session_response(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let ack = take_array32(data, &mut offset)?;
        let session_type = take_u32(data, &mut offset)?;
        expect_end(data, offset)?;
        Ok(Message::SessionResponse { ack, session_type })
    }

    fn parse_result(data: &[u8]) -> Result<Self> {
        let mut offset = 0;
        let raw_status = take_u32(data, &mut offset)?;
        let session_type = take_u32(data, &mut offset)?;
        expect_end(data, offset)?;
        let status = Status::from_u32(raw_status)
            .ok_or_else(|| Error::Malformed(format!("unknown status 0x{raw_status:08X}")))?;
        Ok(Message::Result {
            status,
            session_type,
        })
    }
}

fn header(magic: u32, msg_type: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(&magic.to_le_bytes());
    buf.push(msg_type);
    buf
}

fn read_u32_le(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

fn check_len(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(Error::Truncated(needed));
    }
    Ok(())
}

fn take_u32(data: &[u8], offset: &mut usize) -> Result<u32> {
    check_len(data, *offset + 4)?;
    let value = read_u32_le(&data[*offset..*offset + 4]);
    *offset += 4;
    Ok(value)
}

fn take_array32(data: &[u8], offset: &mut usize) -> Result<[u8; 32]> {
    check_len(data, *offset + 32)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&data[*offset..*offset + 32]);
    *offset += 32;
    Ok(out)
}

fn take_bytes16(data: &[u8], offset: &mut usize) -> Result<Vec<u8>> {
    check_len(data, *offset + 2)?;
    let len = u16::from_le_bytes([data[*offset], data[*offset + 1]]) as usize;
    *offset += 2;
    check_len(data, *offset + len)?;
    let out = data[*offset..*offset + len].to_vec();
    *offset += len;
    Ok(out)
}

fn write_bytes16(buf: &mut Vec<u8>, bytes: &[u8]) {
    // Field lengths are bounded well below u16::MAX by construction.
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn expect_end(data: &[u8], offset: usize) -> Result<()> {
    if data.len() != offset {
        return Err(Error::Malformed("trailing bytes after message".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: Message) {
        let encoded = msg.serialize();
        let decoded = Message::parse(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn client_hello_roundtrip() {
        roundtrip(Message::ClientHello {
            version: 1,
            methods: METHOD_SRP | METHOD_ANONYMOUS,
            ciphers: 0x03,
            session_mask: 0x01,
            nonce: [0xab; 32],
        });
    }

    #[test]
    fn server_hello_roundtrip() {
        roundtrip(Message::ServerHello {
            version: 1,
            method: METHOD_SRP,
            cipher: 0x01,
            nonce: [0xcd; 32],
            public_key: vec![7; 32],
        });
    }

    #[test]
    fn identify_roundtrip() {
        roundtrip(Message::Identify {
            username: "alice".into(),
            group_id: 1,
        });
    }

    #[test]
    fn server_key_exchange_roundtrip() {
        roundtrip(Message::ServerKeyExchange {
            salt: vec![9; 32],
            b_pub: vec![1; 256],
            group_id: 1,
            session_mask: 0x03,
        });
    }

    #[test]
    fn client_key_exchange_roundtrip() {
        roundtrip(Message::ClientKeyExchange {
            a_pub: vec![5; 256],
            m1: [0x11; 32],
        });
    }

    #[test]
    fn session_challenge_roundtrip() {
        roundtrip(Message::SessionChallenge {
            m2: [0x22; 32],
            blob: vec![0xee; 24],
        });
    }

    #[test]
    fn session_response_roundtrip() {
        roundtrip(Message::SessionResponse {
            ack: [0x33; 32],
            session_type: 0x02,
        });
    }

    #[test]
    fn result_roundtrip() {
        for status in [
            Status::Success,
            Status::AccessDenied,
            Status::SessionDenied,
            Status::InvalidProtocol,
            Status::UnsupportedVersion,
        ] {
            roundtrip(Message::Result {
                status,
                session_type: 0,
            });
        }
    }

    #[test]
    fn status_wire_roundtrip() {
        for raw in 1..=5u32 {
            let status = Status::from_u32(raw).unwrap();
            assert_eq!(status.to_u32(), raw);
        }
        assert_eq!(Status::from_u32(0), None);
        assert_eq!(Status::from_u32(6), None);
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let mut buf = Message::Identify {
            username: "x".into(),
            group_id: 1,
        }
        .serialize();
        buf[0] ^= 0xff;
        assert!(matches!(Message::parse(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn truncation_at_every_length_is_rejected() {
        let full = Message::ServerKeyExchange {
            salt: vec![9; 32],
            b_pub: vec![1; 128],
            group_id: 1,
            session_mask: 0x03,
        }
        .serialize();
        for len in 0..full.len() {
            assert!(Message::parse(&full[..len]).is_err(), "len={len}");
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut buf = Message::SessionResponse {
            ack: [0; 32],
            session_type: 1,
        }
        .serialize();
        buf.push(0);
        assert!(matches!(Message::parse(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn short_salt_is_rejected() {
        let buf = Message::ServerKeyExchange {
            salt: vec![9; MIN_SALT_LEN - 1],
            b_pub: vec![1; 16],
            group_id: 1,
            session_mask: 0,
        }
        .serialize();
        assert!(matches!(Message::parse(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn non_utf8_username_is_rejected() {
        let mut buf = header(MAGIC_IDENTIFY, TYPE_IDENTIFY);
        write_bytes16(&mut buf, &[0xff, 0xfe]);
        buf.extend_from_slice(&1u32.to_le_bytes());
        assert!(matches!(Message::parse(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn oversized_username_is_rejected() {
        let long = "a".repeat(MAX_RAW_USERNAME + 1);
        let buf = Message::Identify {
            username: long,
            group_id: 1,
        }
        .serialize();
        assert!(matches!(Message::parse(&buf), Err(Error::Malformed(_))));
    }

    #[test]
    fn empty_client_ephemeral_is_rejected() {
        let buf = Message::ClientKeyExchange {
            a_pub: vec![],
            m1: [0; 32],
        }
        .serialize();
        assert!(matches!(Message::parse(&buf), Err(Error::Malformed(_))));
    }
}
