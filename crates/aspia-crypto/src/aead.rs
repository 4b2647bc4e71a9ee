//! AEAD bootstrap for the negotiated session cipher.
//!
//! The handshake negotiates one of two suites and uses it both for the
//! encrypted session-parameter blob inside the handshake and for the
//! session traffic afterwards:
//!
//! - ChaCha20-Poly1305 (RFC 8439), preferred
//! - AES-256-GCM (NIST SP 800-38D)
//!
//! Both take a 32-byte key and a 12-byte nonce and append a 16-byte tag.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroizing;

use crate::{Error, Result};

/// Wire bit for ChaCha20-Poly1305 in the hello cipher mask.
pub const CIPHER_CHACHA20_POLY1305: u32 = 0x01;

/// Wire bit for AES-256-GCM in the hello cipher mask.
pub const CIPHER_AES256_GCM: u32 = 0x02;

/// Negotiated AEAD suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cipher {
    /// ChaCha20-Poly1305 (RFC 8439).
    ChaCha20Poly1305,
    /// AES-256-GCM (NIST SP 800-38D).
    Aes256Gcm,
}

impl Cipher {
    /// Pick the server's preferred suite out of a client cipher mask.
    /// Preference order: ChaCha20-Poly1305, then AES-256-GCM.
    pub fn select(client_mask: u32) -> Option<Cipher> {
        if client_mask & CIPHER_CHACHA20_POLY1305 != 0 {
            Some(Cipher::ChaCha20Poly1305)
        } else if client_mask & CIPHER_AES256_GCM != 0 {
            Some(Cipher::Aes256Gcm)
        } else {
            None
        }
    }

    /// Convert from the single-bit wire value.
    pub fn from_u32(value: u32) -> Option<Cipher> {
        match value {
            CIPHER_CHACHA20_POLY1305 => Some(Cipher::ChaCha20Poly1305),
            CIPHER_AES256_GCM => Some(Cipher::Aes256Gcm),
            _ => None,
        }
    }

    /// Convert to the single-bit wire value.
    pub fn to_u32(self) -> u32 {
        match self {
            Cipher::ChaCha20Poly1305 => CIPHER_CHACHA20_POLY1305,
            Cipher::Aes256Gcm => CIPHER_AES256_GCM,
        }
    }
}

/// Build the record nonce for a given counter: the counter is XORed
/// big-endian into the last four bytes of the nonce seed. Counter 0 is the
/// handshake challenge blob, counter 1 the session-response ack.
pub fn nonce_with_counter(iv: &[u8; 12], counter: u32) -> [u8; 12] {
    let mut nonce = *iv;
    for (b, c) in nonce[8..].iter_mut().zip(counter.to_be_bytes()) {
        *b ^= c;
    }
    nonce
}

/// Encrypt and authenticate under the negotiated suite.
///
/// Returns ciphertext with the 16-byte tag appended.
///
/// # Errors
///
/// Returns [`Error::Encryption`] if the underlying cipher rejects the
/// input (oversized plaintext).
pub fn seal(
    cipher: Cipher,
    key: &[u8; 32],
    nonce: &[u8; 12],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>> {
    let payload = Payload {
        msg: plaintext,
        aad,
    };
    match cipher {
        Cipher::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new(key.into());
            cipher
                .encrypt(nonce.into(), payload)
                .map_err(|_| Error::Encryption("ChaCha20-Poly1305 seal failed".into()))
        }
        Cipher::Aes256Gcm => {
            use aes_gcm::Aes256Gcm;
            let cipher = Aes256Gcm::new(key.into());
            cipher
                .encrypt(nonce.into(), payload)
                .map_err(|_| Error::Encryption("AES-256-GCM seal failed".into()))
        }
    }
}

/// Decrypt and verify under the negotiated suite.
///
/// # Errors
///
/// Returns [`Error::Decryption`] when the tag does not verify.
pub fn open(
    cipher: Cipher,
    key: &[u8; 32],
    nonce: &[u8; 12],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let payload = Payload {
        msg: ciphertext,
        aad,
    };
    let plaintext = match cipher {
        Cipher::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new(key.into());
            cipher
                .decrypt(nonce.into(), payload)
                .map_err(|_| Error::Decryption("ChaCha20-Poly1305 tag mismatch".into()))?
        }
        Cipher::Aes256Gcm => {
            use aes_gcm::Aes256Gcm;
            let cipher = Aes256Gcm::new(key.into());
            cipher
                .decrypt(nonce.into(), payload)
                .map_err(|_| Error::Decryption("AES-256-GCM tag mismatch".into()))?
        }
    };
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUITES: [Cipher; 2] = [Cipher::ChaCha20Poly1305, Cipher::Aes256Gcm];

    #[test]
    fn selection_prefers_chacha() {
        assert_eq!(
            Cipher::select(CIPHER_CHACHA20_POLY1305 | CIPHER_AES256_GCM),
            Some(Cipher::ChaCha20Poly1305)
        );
        assert_eq!(
            Cipher::select(CIPHER_AES256_GCM),
            Some(Cipher::Aes256Gcm)
        );
        assert_eq!(Cipher::select(0), None);
        // Unknown bits alone select nothing.
        assert_eq!(Cipher::select(0xf0), None);
    }

    #[test]
    fn wire_value_roundtrip() {
        for suite in SUITES {
            assert_eq!(Cipher::from_u32(suite.to_u32()), Some(suite));
        }
        assert_eq!(Cipher::from_u32(0x03), None);
    }

    #[test]
    fn nonce_counter_is_invertible() {
        let iv = [7u8; 12];
        let n0 = nonce_with_counter(&iv, 0);
        let n1 = nonce_with_counter(&iv, 1);
        assert_eq!(n0, iv);
        assert_ne!(n0, n1);
        assert_eq!(n0[..8], n1[..8]);
    }

    /// RFC 8439 §2.8.2 test vector.
    #[test]
    fn chacha20poly1305_rfc8439() {
        let key: [u8; 32] =
            hex::decode("808182838485868788898a8b8c8d8e8f909192939495969798999a9b9c9d9e9f")
                .unwrap()
                .try_into()
                .unwrap();
        let nonce: [u8; 12] = hex::decode("070000004041424344454647")
            .unwrap()
            .try_into()
            .unwrap();
        let aad = hex::decode("50515253c0c1c2c3c4c5c6c7").unwrap();
        let plaintext = hex::decode(
            "4c616469657320616e642047656e746c656d656e206f662074686520636c6173\
             73206f66202739393a204966204920636f756c64206f6666657220796f75206f\
             6e6c79206f6e652074697020666f7220746865206675747572652c2073756e73\
             637265656e20776f756c642062652069742e",
        )
        .unwrap();
        let expected_ciphertext = hex::decode(
            "d31a8d34648e60db7b86afbc53ef7ec2a4aded51296e08fea9e2b5a736ee62d6\
             3dbea45e8ca9671282fafb69da92728b1a71de0a9e060b2905d6a5b67ecd3b36\
             92ddbd7f2d778b8c9803aee328091b58fab324e4fad675945585808b4831d7bc\
             3ff4def08e4b7a9de576d26586cec64b6116",
        )
        .unwrap();
        let expected_tag = hex::decode("1ae10b594f09e26a7e902ecbd0600691").unwrap();

        let sealed = seal(Cipher::ChaCha20Poly1305, &key, &nonce, &plaintext, &aad).unwrap();
        assert_eq!(&sealed[..expected_ciphertext.len()], &expected_ciphertext[..]);
        assert_eq!(&sealed[expected_ciphertext.len()..], &expected_tag[..]);

        let opened = open(Cipher::ChaCha20Poly1305, &key, &nonce, &sealed, &aad).unwrap();
        assert_eq!(&*opened, &plaintext);
    }

    #[test]
    fn roundtrip_both_suites() {
        for suite in SUITES {
            let key = [0x42u8; 32];
            let nonce = [0x01u8; 12];
            let sealed = seal(suite, &key, &nonce, b"session params", b"transcript").unwrap();
            assert_eq!(sealed.len(), b"session params".len() + 16);
            let opened = open(suite, &key, &nonce, &sealed, b"transcript").unwrap();
            assert_eq!(&*opened, b"session params");
        }
    }

    #[test]
    fn wrong_key_fails() {
        for suite in SUITES {
            let sealed = seal(suite, &[0x42; 32], &[1; 12], b"msg", b"").unwrap();
            assert!(open(suite, &[0x43; 32], &[1; 12], &sealed, b"").is_err());
        }
    }

    #[test]
    fn wrong_aad_fails() {
        for suite in SUITES {
            let sealed = seal(suite, &[0x42; 32], &[1; 12], b"msg", b"good").unwrap();
            assert!(open(suite, &[0x42; 32], &[1; 12], &sealed, b"evil").is_err());
        }
    }

    #[test]
    fn corrupted_ciphertext_fails() {
        for suite in SUITES {
            let mut sealed = seal(suite, &[0x42; 32], &[1; 12], b"msg", b"").unwrap();
            sealed[0] ^= 0xff;
            assert!(open(suite, &[0x42; 32], &[1; 12], &sealed, b"").is_err());
        }
    }

    #[test]
    fn empty_plaintext_is_tag_only() {
        for suite in SUITES {
            let sealed = seal(suite, &[0x42; 32], &[1; 12], b"", b"aad").unwrap();
            assert_eq!(sealed.len(), 16);
            let opened = open(suite, &[0x42; 32], &[1; 12], &sealed, b"aad").unwrap();
            assert!(opened.is_empty());
        }
    }
}
