use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, ops::Deref, str::FromStr};

/// Data that is a cryptographic hash of `BYTES` long.
///
/// Wraps a fixed-size byte array and provides:
/// - Hexadecimal serialization/deserialization
/// - CBOR encoding/decoding via minicbor
/// - Conversions from byte slices and vectors
/// - Display and debug formatting
///
/// # Examples
///
/// ```
/// use arbor_common::Hash;
///
/// let hash: Hash<4> = "deadbeef".parse().unwrap();
/// assert_eq!(hash.to_string(), "deadbeef");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash<const BYTES: usize>([u8; BYTES]);

impl<const BYTES: usize> Default for Hash<BYTES> {
    fn default() -> Self {
        Self::new([0u8; BYTES])
    }
}

// Generic const arrays don't auto-derive serde
impl<const BYTES: usize> Serialize for Hash<BYTES> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de, const BYTES: usize> Deserialize<'de> for Hash<BYTES> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl<const BYTES: usize> Hash<BYTES> {
    /// Creates a new hash from a byte array.
    #[inline]
    pub const fn new(bytes: [u8; BYTES]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn into_inner(self) -> [u8; BYTES] {
        self.0
    }

    /// True when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl<const BYTES: usize> From<[u8; BYTES]> for Hash<BYTES> {
    #[inline]
    fn from(bytes: [u8; BYTES]) -> Self {
        Self::new(bytes)
    }
}

impl<const BYTES: usize> TryFrom<&[u8]> for Hash<BYTES> {
    type Error = std::array::TryFromSliceError;

    /// Fails if the slice length does not match `BYTES`.
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let hash: [u8; BYTES] = value.try_into()?;
        Ok(Self::new(hash))
    }
}

impl<const BYTES: usize> AsRef<[u8]> for Hash<BYTES> {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const BYTES: usize> Deref for Hash<BYTES> {
    type Target = [u8; BYTES];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<const BYTES: usize> fmt::Debug for Hash<BYTES> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple(&format!("Hash<{BYTES}>")).field(&hex::encode(self)).finish()
    }
}

impl<const BYTES: usize> fmt::Display for Hash<BYTES> {
    /// Formats the hash as a lowercase hexadecimal string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self))
    }
}

impl<const BYTES: usize> FromStr for Hash<BYTES> {
    type Err = hex::FromHexError;

    /// Parses a hash from a hexadecimal string, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0; BYTES];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self::new(bytes))
    }
}

impl<C, const BYTES: usize> minicbor::Encode<C> for Hash<BYTES> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.bytes(&self.0)?.ok()
    }
}

impl<'a, C, const BYTES: usize> minicbor::Decode<'a, C> for Hash<BYTES> {
    fn decode(
        d: &mut minicbor::Decoder<'a>,
        _ctx: &mut C,
    ) -> Result<Self, minicbor::decode::Error> {
        Self::try_from(d.bytes()?)
            .map_err(|_| minicbor::decode::Error::message("Invalid hash size"))
    }
}

/// Identity of a block: the number-prefixed hash of its header.
pub type BlockHash = Hash<32>;

/// Identity of a transaction.
pub type TxHash = Hash<32>;

/// Account address, as referenced by headers and receipt logs.
pub type Address = Hash<20>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_prefix() {
        let plain: Hash<4> = "0102a0ff".parse().unwrap();
        let prefixed: Hash<4> = "0x0102a0ff".parse().unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain.into_inner(), [0x01, 0x02, 0xa0, 0xff]);
    }

    #[test]
    fn rejects_wrong_length() {
        assert!("0102".parse::<Hash<4>>().is_err());
        assert!(Hash::<4>::try_from(&[1u8, 2, 3][..]).is_err());
        assert!(Hash::<4>::try_from(&[1u8, 2, 3, 4][..]).is_ok());
    }

    #[test]
    fn serde_uses_hex_strings() {
        let hash = Hash::<4>::new([0xde, 0xad, 0xbe, 0xef]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"deadbeef\"");
        let back: Hash<4> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn cbor_rejects_wrong_size() {
        let short = minicbor::to_vec(Hash::<4>::new([1, 2, 3, 4])).unwrap();
        assert!(minicbor::decode::<Hash<32>>(&short).is_err());
        assert_eq!(minicbor::decode::<Hash<4>>(&short).unwrap(), Hash::new([1, 2, 3, 4]));
    }

    #[test]
    fn zero_detection() {
        assert!(BlockHash::default().is_zero());
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        assert!(!BlockHash::new(bytes).is_zero());
    }
}
