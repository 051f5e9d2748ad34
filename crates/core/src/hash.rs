//! Keccak-256 hashing, domain tags and canonical JSON digests.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

/// A named alias for a 32-byte(u8) array, used to represent a 256-bit hash.
pub type H256 = [u8; 32];

/// Domain tag prefixed to every Merkle leaf before hashing.
pub const LEAF_TAG: &[u8] = b"LEAF";

/// Domain tag prefixed to every internal Merkle node before hashing.
pub const NODE_TAG: &[u8] = b"MERKLE";

/// A 256-bit digest.
///
/// Renders as `0x` followed by 64 lower-case hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash(pub H256);

impl Hash {
    /// The zero hash (all zeros).
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a new Hash from raw bytes.
    pub fn from_bytes(bytes: H256) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &H256 {
        &self.0
    }

    /// Convert to a hex string (no prefix).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(strip_hex_prefix(s))?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<H256> for Hash {
    fn from(bytes: H256) -> Self {
        Self(bytes)
    }
}

impl From<Hash> for H256 {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Hash arbitrary data using Keccak-256.
pub fn keccak256(data: &[u8]) -> Hash {
    Hash(Keccak256::digest(data).into())
}

/// Hash multiple pieces of data by concatenating them.
pub fn keccak256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    Hash(hasher.finalize().into())
}

/// Hash `data` behind a domain tag: `keccak256(tag || data)`.
pub fn hash_tagged(tag: &[u8], data: &[u8]) -> Hash {
    keccak256_concat(&[tag, data])
}

/// Serialize a value to JSON with a stable key order.
///
/// Structs keep their declaration order, maps are emitted sorted. serde_json
/// never escapes `/`, so the output matches an unescaped-slashes encoder.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Keccak-256 of the canonical JSON encoding of `value`.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<Hash, serde_json::Error> {
    let json = canonical_json(value)?;
    Ok(keccak256(json.as_bytes()))
}

/// Remove a leading `0x` if present.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

/// Add a leading `0x` unless already present.
pub fn prefix_hex(s: &str) -> String {
    if s.starts_with("0x") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

/// True if `s` is non-empty hex, optionally `0x`-prefixed.
pub fn is_hex(s: &str) -> bool {
    let body = strip_hex_prefix(s);
    !body.is_empty() && body.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hash_deterministic() {
        let data = b"hello world";
        let h1 = keccak256(data);
        let h2 = keccak256(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_keccak_known_vectors() {
        // Keccak-256, not NIST SHA3-256.
        assert_eq!(
            keccak256(b"").to_hex(),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            keccak256(b"abc").to_hex(),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn test_hash_different_inputs() {
        let h1 = keccak256(b"hello");
        let h2 = keccak256(b"world");
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_hash_hex_roundtrip() {
        let h = keccak256(b"test data");
        let parsed = Hash::from_hex(&h.to_hex()).unwrap();
        assert_eq!(h, parsed);
        let parsed_prefixed = Hash::from_hex(&h.to_string()).unwrap();
        assert_eq!(h, parsed_prefixed);
    }

    #[test]
    fn test_hash_display() {
        let h = keccak256(b"test");
        let display = format!("{}", h);
        assert!(display.starts_with("0x"));
        assert_eq!(display.len(), 66);
        assert_eq!(display, display.to_lowercase());
    }

    #[test]
    fn test_hash_concat() {
        let h1 = keccak256_concat(&[b"hello", b"world"]);
        let h2 = keccak256(b"helloworld");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_domain_tags_separate_digests() {
        let data = b"0xabc";
        let leaf = hash_tagged(LEAF_TAG, data);
        let node = hash_tagged(NODE_TAG, data);
        assert_ne!(leaf, node);
        assert_ne!(leaf, keccak256(data));
        assert_eq!(leaf, keccak256(b"LEAF0xabc"));
    }

    #[test]
    fn test_canonical_json_is_stable() {
        let a = json!({"b": 1, "a": "x/y"});
        let b = json!({"a": "x/y", "b": 1});
        assert_eq!(canonical_json(&a).unwrap(), r#"{"a":"x/y","b":1}"#);
        assert_eq!(
            hash_canonical_json(&a).unwrap(),
            hash_canonical_json(&b).unwrap()
        );
    }

    #[test]
    fn test_hash_serde_as_prefixed_hex() {
        let h = keccak256(b"serde");
        let encoded = serde_json::to_string(&h).unwrap();
        assert_eq!(encoded, format!("\"{}\"", h));
        let decoded: Hash = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(strip_hex_prefix("0xdead"), "dead");
        assert_eq!(strip_hex_prefix("dead"), "dead");
        assert_eq!(prefix_hex("dead"), "0xdead");
        assert_eq!(prefix_hex("0xdead"), "0xdead");
        assert!(is_hex("0xDeAd"));
        assert!(!is_hex("0x"));
        assert!(!is_hex("xyz"));
    }

    #[test]
    fn test_zero_hash() {
        assert_eq!(Hash::ZERO.0, [0u8; 32]);
        assert!(Hash::ZERO.is_zero());
    }
}
