//! SRP group registry.
//!
//! Maps a 16-bit group id to the (N, g) parameters used for the verifier
//! exchange. N is a safe prime; both shipped groups are taken verbatim from
//! RFC 5054 Appendix A. The registry is immutable: a peer can only ever
//! select one of the groups compiled in here.

use crate::bignum::BigNum;
use crate::{Error, Result};

/// 2048-bit group from RFC 5054 Appendix A. Default for new verifiers.
pub const GROUP_SRP_2048: u16 = 0x0001;

/// 1024-bit group from RFC 5054 Appendix A. Kept for short handshakes on
/// constrained peers; new verifiers should use the 2048-bit group.
pub const GROUP_SRP_1024: u16 = 0x0002;

// Hex from RFC 5054 Appendix A, whitespace removed.
const N_2048_HEX: &str = "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B855F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773BCA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB694B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73";

const N_1024_HEX: &str = "EEAF0AB9ADB38DD69C33F80AFA8FC5E86072618775FF3C0B9EA2314C9C256576D674DF7496EA81D3383B4813D692C6E0E0D5D8E250B98BE48E495C1D6089DAD15DC7D7B46154D6B6CE8EF4AD69B15D4982559B297BCF1885C529F566660E57EC68EDBC3C05726CC02FD4CBF4976EAA9AFD5138FE8376435B9FC61D2FC0EB06E3";

/// A registered SRP group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrpGroup {
    /// Registry id carried on the wire.
    pub id: u16,
    /// Generator (2 for both RFC 5054 groups shipped here).
    pub generator: u32,
    n_hex: &'static str,
    n_len: usize,
}

const REGISTRY: &[SrpGroup] = &[
    SrpGroup {
        id: GROUP_SRP_2048,
        generator: 2,
        n_hex: N_2048_HEX,
        n_len: 256,
    },
    SrpGroup {
        id: GROUP_SRP_1024,
        generator: 2,
        n_hex: N_1024_HEX,
        n_len: 128,
    },
];

impl SrpGroup {
    /// Look up a group by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownGroup`] for ids not in the registry.
    pub fn find(id: u16) -> Result<&'static SrpGroup> {
        REGISTRY
            .iter()
            .find(|g| g.id == id)
            .ok_or(Error::UnknownGroup(id))
    }

    /// The group new verifiers and synthetic records are built against.
    pub fn default_group() -> &'static SrpGroup {
        &REGISTRY[0]
    }

    /// Byte width of N. Every big number in the handshake is left-padded to
    /// this width before hashing or hitting the wire.
    pub fn modulus_len(&self) -> usize {
        self.n_len
    }

    /// Decode the modulus N.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::BadEncoding`] if the registry constant is
    /// corrupt; this cannot happen for the compiled-in groups.
    pub fn modulus(&self) -> Result<BigNum> {
        let raw = hex::decode(self.n_hex).map_err(|_| Error::BadEncoding("group modulus"))?;
        BigNum::from_bytes_be(&raw)
    }

    /// The generator g as a big number.
    pub fn gen(&self) -> BigNum {
        BigNum::from_u32(self.generator)
    }
}
