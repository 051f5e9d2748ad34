//! secp256k1 ECDSA signing, verification and signer-address recovery.
//!
//! Messages are hashed with plain Keccak-256 (no domain tag) before signing.
//! Signatures travel as `0x || r(32) || s(32) || v(1)` hex with `v` in
//! `{27, 28}`.

use crate::curve::{self, write_be32};
use crate::hash::{keccak256, strip_hex_prefix};
use num_bigint::BigUint;
use secp256k1::ecdsa::{RecoverableSignature, Signature as SecpSignature};
use secp256k1::{Message, PublicKey as SecpPublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 20-byte address derived from the public key hash.
pub type AddressBytes = [u8; 20];

/// Offset added to the recovery id to form `v`.
pub const RECOVERY_OFFSET: u8 = 27;

/// Length of a hex signature without the `0x` prefix.
pub const SIGNATURE_HEX_LEN: usize = 130;

/// An address on the ledger: the last 20 bytes of keccak256(x || y).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Address(pub AddressBytes);

impl Address {
    /// The zero address (all zeros).
    pub const ZERO: Self = Self([0u8; 20]);

    /// Create an address from raw bytes.
    pub fn from_bytes(bytes: AddressBytes) -> Self {
        Self(bytes)
    }

    /// Get the underlying bytes.
    pub fn as_bytes(&self) -> &AddressBytes {
        &self.0
    }

    /// Convert to a lower-case hex string (with 0x prefix).
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse from a hex string (with or without 0x prefix, any case).
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(strip_hex_prefix(s)).map_err(|_| CryptoError::InvalidAddress)?;
        if bytes.len() != 20 {
            return Err(CryptoError::InvalidAddress);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derive the address of an uncompressed public key given as `x || y`.
    pub fn from_public_xy(xy: &[u8; 64]) -> Self {
        let hash = keccak256(xy);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash.0[12..]);
        Self(addr)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid address format")]
    InvalidAddress,
}

/// A recoverable ECDSA signature `{r, s, v}`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id plus 27.
    pub v: u8,
}

impl EcdsaSignature {
    /// `r` as 64 zero-padded hex characters.
    pub fn r_hex(&self) -> String {
        hex::encode(self.r)
    }

    /// `s` as 64 zero-padded hex characters.
    pub fn s_hex(&self) -> String {
        hex::encode(self.s)
    }

    /// `0x || r || s || v`.
    pub fn to_hex(&self) -> String {
        format!("0x{}{}{:02x}", self.r_hex(), self.s_hex(), self.v)
    }

    /// Parse `0x || r || s || v`. Only the length and hex alphabet are checked.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let body = strip_hex_prefix(s);
        if body.len() != SIGNATURE_HEX_LEN {
            return Err(CryptoError::InvalidSignature);
        }
        let bytes = hex::decode(body).map_err(|_| CryptoError::InvalidSignature)?;
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    /// The recovery id (`v - 27`), if it is 0 or 1.
    pub fn recovery_id(&self) -> Option<u8> {
        match self.v.checked_sub(RECOVERY_OFFSET) {
            Some(id @ (0 | 1)) => Some(id),
            _ => None,
        }
    }

    fn from_recoverable(sig: &RecoverableSignature) -> Self {
        let (recovery_id, compact) = sig.serialize_compact();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);
        Self {
            r,
            s,
            v: recovery_id.to_i32() as u8 + RECOVERY_OFFSET,
        }
    }
}

impl fmt::Debug for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EcdsaSignature({}...)", &self.to_hex()[..18])
    }
}

impl fmt::Display for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// The digest that is actually signed for `message`.
pub fn message_digest(message: &[u8]) -> [u8; 32] {
    keccak256(message).0
}

fn parse_secret_key(private_key_hex: &str) -> Result<SecretKey, CryptoError> {
    let bytes =
        hex::decode(strip_hex_prefix(private_key_hex)).map_err(|_| CryptoError::InvalidPrivateKey)?;
    SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Parse a public key given as hex: compressed (33 bytes), uncompressed
/// (65 bytes, `04` prefix) or bare `x || y` (64 bytes).
pub fn parse_public_key(public_key_hex: &str) -> Result<SecpPublicKey, CryptoError> {
    let mut bytes =
        hex::decode(strip_hex_prefix(public_key_hex)).map_err(|_| CryptoError::InvalidPublicKey)?;
    if bytes.len() == 64 {
        bytes.insert(0, 0x04);
    }
    SecpPublicKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPublicKey)
}

fn sign_with_key(message: &[u8], secret: &SecretKey) -> EcdsaSignature {
    let digest = Message::from_digest(message_digest(message));
    let sig = SECP256K1.sign_ecdsa_recoverable(&digest, secret);
    EcdsaSignature::from_recoverable(&sig)
}

/// Sign `message` with a hex-encoded private key.
pub fn sign(message: &[u8], private_key_hex: &str) -> Result<EcdsaSignature, CryptoError> {
    let secret = parse_secret_key(private_key_hex)?;
    Ok(sign_with_key(message, &secret))
}

/// Verify a hex signature against a hex public key. `v` is ignored.
///
/// Structural problems (length, hex, key encoding) yield `false`.
pub fn verify(message: &[u8], signature_hex: &str, public_key_hex: &str) -> bool {
    let Ok(signature) = EcdsaSignature::from_hex(signature_hex) else {
        return false;
    };
    let Ok(public_key) = parse_public_key(public_key_hex) else {
        return false;
    };
    verify_with_key(message, &signature, &public_key)
}

fn verify_with_key(message: &[u8], signature: &EcdsaSignature, key: &SecpPublicKey) -> bool {
    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&signature.r);
    compact[32..].copy_from_slice(&signature.s);
    let Ok(mut sig) = SecpSignature::from_compact(&compact) else {
        return false;
    };
    // libsecp256k1 only accepts low-s; high-s signatures are equally valid ECDSA.
    sig.normalize_s();
    let digest = Message::from_digest(message_digest(message));
    SECP256K1.verify_ecdsa(&digest, &sig, key).is_ok()
}

/// Recover the public key point that produced `signature` over `message`.
pub fn recover_public_key(message: &[u8], signature: &EcdsaSignature) -> Option<curve::AffinePoint> {
    let recovery_id = signature.recovery_id()?;
    let r = BigUint::from_bytes_be(&signature.r);
    let s = BigUint::from_bytes_be(&signature.s);
    curve::recover_public_key(&message_digest(message), &r, &s, recovery_id)
}

/// Recover the signer's address from a hex signature alone.
///
/// Returns `None` for malformed signatures and for any algebraic failure.
pub fn recover_address(message: &[u8], signature_hex: &str) -> Option<Address> {
    let signature = EcdsaSignature::from_hex(signature_hex).ok()?;
    let point = recover_public_key(message, &signature)?;
    Some(Address::from_public_xy(&point.to_uncompressed_xy()))
}

/// A public key for signature verification.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(pub SecpPublicKey);

impl PublicKey {
    /// Derive the address from this public key.
    pub fn to_address(&self) -> Address {
        Address::from_public_xy(&self.xy())
    }

    /// Uncompressed coordinates `x || y` without the `04` prefix.
    pub fn xy(&self) -> [u8; 64] {
        let uncompressed = self.0.serialize_uncompressed();
        let mut xy = [0u8; 64];
        xy.copy_from_slice(&uncompressed[1..]);
        xy
    }

    /// Uncompressed SEC1 encoding (`04 || x || y`) as hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.serialize_uncompressed())
    }

    /// Parse any accepted public key encoding.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        parse_public_key(s).map(Self)
    }

    /// Verify a signature against this public key.
    pub fn verify(&self, message: &[u8], signature: &EcdsaSignature) -> bool {
        verify_with_key(message, signature, &self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

/// A keypair as handed over by the key provider: address, public key and
/// private key.
pub struct Keypair {
    secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let (secret_key, public_key) = SECP256K1.generate_keypair(&mut rand::thread_rng());
        Self {
            secret_key,
            public_key: PublicKey(public_key),
        }
    }

    /// Create a keypair from a private key (32 bytes).
    pub fn from_private_key(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self::from_secret(secret_key))
    }

    /// Create a keypair from a hex private key (with or without 0x).
    pub fn from_private_key_hex(s: &str) -> Result<Self, CryptoError> {
        parse_secret_key(s).map(Self::from_secret)
    }

    fn from_secret(secret_key: SecretKey) -> Self {
        let public_key = PublicKey(SecpPublicKey::from_secret_key_global(&secret_key));
        Self {
            secret_key,
            public_key,
        }
    }

    /// Get the private key bytes.
    pub fn private_key(&self) -> [u8; 32] {
        self.secret_key.secret_bytes()
    }

    /// Get the private key as hex (no prefix).
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key())
    }

    /// Get the uncompressed public key as hex.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_hex()
    }

    /// Get the address derived from the public key.
    pub fn address(&self) -> Address {
        self.public_key.to_address()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> EcdsaSignature {
        sign_with_key(message, &self.secret_key)
    }

    /// Verify a signature against our public key.
    pub fn verify(&self, message: &[u8], signature: &EcdsaSignature) -> bool {
        self.public_key.verify(message, signature)
    }
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self::from_secret(self.secret_key)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish()
    }
}

/// Left-pad a scalar into 32 big-endian bytes.
pub fn scalar_bytes(value: &BigUint) -> [u8; 32] {
    let mut out = [0u8; 32];
    write_be32(value, &mut out);
    out
}
