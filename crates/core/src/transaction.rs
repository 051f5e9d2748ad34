//! Transaction types and signing.
//!
//! A [`Transaction`] is an immutable record: gas limit, fee and hash are
//! derived once at construction (the hash is refreshed when a signature is
//! attached) and stored next to the inputs they were computed from.

use crate::crypto::{self, Address, CryptoError, Keypair};
use crate::hash::{hash_canonical_json, strip_hex_prefix, Hash};
use crate::units::{self, UnitError};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Gas charged for every transaction before payload costs.
pub const BASE_GAS: u64 = 21_000;
/// Gas per zero byte of payload.
pub const ZERO_BYTE_GAS: u64 = 4;
/// Gas per non-zero byte of payload.
pub const NONZERO_BYTE_GAS: u64 = 16;

/// Errors that can occur while building or signing a transaction.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid hex data payload")]
    InvalidPayload,
    #[error("invalid base-unit value for {field}: {value}")]
    InvalidAmount { field: &'static str, value: String },
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Why a transaction failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionValidationError {
    #[error("gas limit {gas_limit} below intrinsic gas {intrinsic}")]
    GasLimitTooLow { gas_limit: u64, intrinsic: u64 },
    #[error("fee {fee} below required {required}")]
    InsufficientFee { fee: String, required: String },
    #[error("invalid hex data payload")]
    InvalidPayload,
    #[error("transaction is not signed")]
    MissingSignature,
    #[error("signature does not recover to sender {expected}")]
    SignerMismatch {
        expected: Address,
        recovered: Option<Address>,
    },
}

/// A value transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    from: Address,
    to: Address,
    /// Amount in base units.
    amount: BigUint,
    /// Fee in base units.
    fee: BigUint,
    nonce: u64,
    /// Hex-encoded payload as supplied (with or without `0x`).
    data: Option<String>,
    gas_limit: u64,
    /// Price per unit of gas, in base units.
    gas_price: BigUint,
    /// Unix seconds.
    timestamp: u64,
    /// `0x` + r + s + v, as attached by the signer.
    signature: Option<String>,
    hash: Hash,
}

/// Externally supplied transaction fields, e.g. from an RPC façade or a store.
///
/// Monetary values are base-unit integer strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub from: String,
    pub to: String,
    pub amount: String,
    pub fee: String,
    pub nonce: u64,
    #[serde(default)]
    pub data: Option<String>,
    pub gas_limit: u64,
    pub gas_price: String,
    pub timestamp: u64,
    #[serde(default)]
    pub signature: Option<String>,
}

/// Flat, serializable view of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Hash>,
    pub from: Address,
    pub to: Address,
    pub amount: String,
    pub amount_decimal: String,
    pub fee: String,
    pub fee_decimal: String,
    pub nonce: u64,
    pub data: Option<String>,
    pub gas_limit: String,
    pub gas_price: String,
    pub gas_used: String,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Intrinsic gas for an optional hex payload.
pub fn intrinsic_gas(data: Option<&str>) -> Result<u64, TransactionError> {
    let Some(data) = data else {
        return Ok(BASE_GAS);
    };
    let bytes = hex::decode(strip_hex_prefix(data)).map_err(|_| TransactionError::InvalidPayload)?;
    Ok(bytes.iter().fold(BASE_GAS, |gas, b| {
        gas + if *b == 0 { ZERO_BYTE_GAS } else { NONZERO_BYTE_GAS }
    }))
}

fn parse_base_units(field: &'static str, value: &str) -> Result<BigUint, TransactionError> {
    let invalid = || TransactionError::InvalidAmount {
        field,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    BigUint::parse_bytes(value.as_bytes(), 10).ok_or_else(invalid)
}

fn now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default()
}

impl Transaction {
    /// Create a new unsigned transaction stamped with the current time.
    ///
    /// `amount` and `gas_price` are decimal amounts (e.g. `"1.5"`); the gas
    /// limit is the intrinsic gas of `data` and the fee is
    /// `gas_limit * gas_price`.
    pub fn new(
        from: &str,
        to: &str,
        amount: &str,
        nonce: u64,
        data: Option<&str>,
        gas_price: &str,
    ) -> Result<Self, TransactionError> {
        Self::with_timestamp(from, to, amount, nonce, data, gas_price, now())
    }

    /// Like [`Transaction::new`] with an explicit timestamp.
    pub fn with_timestamp(
        from: &str,
        to: &str,
        amount: &str,
        nonce: u64,
        data: Option<&str>,
        gas_price: &str,
        timestamp: u64,
    ) -> Result<Self, TransactionError> {
        let from = Address::from_hex(from)?;
        let to = Address::from_hex(to)?;
        let amount = units::decimal_to_base_units(amount)?;
        let gas_price = units::decimal_to_base_units(gas_price)?;
        let gas_limit = intrinsic_gas(data)?;
        let fee = BigUint::from(gas_limit) * &gas_price;

        Ok(Self::assemble(
            from,
            to,
            amount,
            fee,
            nonce,
            data.map(str::to_string),
            gas_limit,
            gas_price,
            timestamp,
            None,
        ))
    }

    /// Rehydrate a transaction from raw fields without re-deriving gas or fee.
    ///
    /// Stored values are kept exactly as supplied so that [`Transaction::validate`]
    /// judges them by the same rules as locally built transactions.
    pub fn from_raw(raw: RawTransaction) -> Result<Self, TransactionError> {
        let from = Address::from_hex(&raw.from)?;
        let to = Address::from_hex(&raw.to)?;
        let amount = parse_base_units("amount", &raw.amount)?;
        let fee = parse_base_units("fee", &raw.fee)?;
        let gas_price = parse_base_units("gasPrice", &raw.gas_price)?;

        Ok(Self::assemble(
            from,
            to,
            amount,
            fee,
            raw.nonce,
            raw.data,
            raw.gas_limit,
            gas_price,
            raw.timestamp,
            raw.signature,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        from: Address,
        to: Address,
        amount: BigUint,
        fee: BigUint,
        nonce: u64,
        data: Option<String>,
        gas_limit: u64,
        gas_price: BigUint,
        timestamp: u64,
        signature: Option<String>,
    ) -> Self {
        let mut tx = Self {
            from,
            to,
            amount,
            fee,
            nonce,
            data,
            gas_limit,
            gas_price,
            timestamp,
            signature,
            hash: Hash::ZERO,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Get the sender address.
    pub fn from(&self) -> Address {
        self.from
    }

    /// Get the recipient address.
    pub fn to(&self) -> Address {
        self.to
    }

    /// Amount in base units.
    pub fn amount(&self) -> &BigUint {
        &self.amount
    }

    /// Fee in base units.
    pub fn fee(&self) -> &BigUint {
        &self.fee
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn data(&self) -> Option<&str> {
        self.data.as_deref()
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    /// Gas price in base units.
    pub fn gas_price(&self) -> &BigUint {
        &self.gas_price
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The attached signature, if any.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Get the transaction hash (including the signature once attached).
    pub fn hash(&self) -> Hash {
        self.hash
    }

    /// A transaction with zero gas price is a system transaction and is
    /// exempt from gas and fee checks.
    pub fn is_system(&self) -> bool {
        self.gas_price.is_zero()
    }

    /// Re-estimate intrinsic gas from the stored payload.
    pub fn estimate_intrinsic_gas(&self) -> Result<u64, TransactionError> {
        intrinsic_gas(self.data.as_deref())
    }

    /// The exact bytes that are signed and recovered against.
    ///
    /// A JSON array `[from, to, amount, fee, nonce, data, gasLimit, gasPrice,
    /// timestamp]` with monetary values and gas limit as base-unit strings.
    pub fn signing_payload(&self) -> String {
        json!([
            self.from.to_hex(),
            self.to.to_hex(),
            self.amount.to_string(),
            self.fee.to_string(),
            self.nonce,
            self.data,
            self.gas_limit.to_string(),
            self.gas_price.to_string(),
            self.timestamp,
        ])
        .to_string()
    }

    fn compute_hash(&self) -> Hash {
        hash_canonical_json(&self.view_fields()).expect("serialization should not fail")
    }

    fn attach_signature(&mut self, signature: String) {
        self.signature = Some(signature);
        self.hash = self.compute_hash();
    }

    /// Sign the transaction with a hex private key, returning the signature hex.
    pub fn sign(&mut self, private_key_hex: &str) -> Result<String, TransactionError> {
        let signature = crypto::sign(self.signing_payload().as_bytes(), private_key_hex)?.to_hex();
        self.attach_signature(signature.clone());
        Ok(signature)
    }

    /// Create a signed transaction.
    pub fn signed(mut self, keypair: &Keypair) -> Self {
        let signature = keypair.sign(self.signing_payload().as_bytes());
        self.attach_signature(signature.to_hex());
        self
    }

    /// Replace the signature with externally produced bytes.
    pub fn with_signature(mut self, signature_hex: impl Into<String>) -> Self {
        self.attach_signature(signature_hex.into());
        self
    }

    /// Verify the stored signature against a hex public key.
    pub fn verify(&self, public_key_hex: &str) -> bool {
        match &self.signature {
            Some(sig) => crypto::verify(self.signing_payload().as_bytes(), sig, public_key_hex),
            None => false,
        }
    }

    /// Recover the signer's address from the stored signature.
    pub fn sender(&self) -> Option<Address> {
        let signature = self.signature.as_deref()?;
        crypto::recover_address(self.signing_payload().as_bytes(), signature)
    }

    /// Check gas, fee and signer, returning the first failing rule.
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if !self.is_system() {
            let intrinsic = self
                .estimate_intrinsic_gas()
                .map_err(|_| TransactionValidationError::InvalidPayload)?;
            if self.gas_limit < intrinsic {
                return Err(TransactionValidationError::GasLimitTooLow {
                    gas_limit: self.gas_limit,
                    intrinsic,
                });
            }

            let required = BigUint::from(self.gas_limit) * &self.gas_price;
            if self.fee < required {
                return Err(TransactionValidationError::InsufficientFee {
                    fee: self.fee.to_string(),
                    required: required.to_string(),
                });
            }
        }

        if self.signature.is_none() {
            return Err(TransactionValidationError::MissingSignature);
        }
        match self.sender() {
            Some(recovered) if recovered == self.from => Ok(()),
            recovered => Err(TransactionValidationError::SignerMismatch {
                expected: self.from,
                recovered,
            }),
        }
    }

    /// Check overall transaction validity.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    fn view_fields(&self) -> TransactionView {
        TransactionView {
            hash: None,
            from: self.from,
            to: self.to,
            amount: self.amount.to_string(),
            amount_decimal: units::format_base_units(&self.amount),
            fee: self.fee.to_string(),
            fee_decimal: units::format_base_units(&self.fee),
            nonce: self.nonce,
            data: self.data.clone(),
            gas_limit: self.gas_limit.to_string(),
            gas_price: self.gas_price.to_string(),
            gas_used: self.gas_limit.to_string(),
            timestamp: self.timestamp,
            signature: self.signature.clone(),
        }
    }

    /// Full-field view, hash included.
    pub fn to_view(&self) -> TransactionView {
        TransactionView {
            hash: Some(self.hash),
            ..self.view_fields()
        }
    }

    /// Byte length of the JSON view.
    pub fn size(&self) -> usize {
        serde_json::to_vec(&self.to_view())
            .expect("serialization should not fail")
            .len()
    }
}
