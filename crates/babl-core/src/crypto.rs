//! Ed25519 signatures over typed claim messages.
//!
//! Contributors authorize relayed claims off-line. A contributor's
//! [`Address`] is the BLAKE3 hash of their Ed25519 public key, so a signature
//! carries its own proof of identity.
//!
//! # Signing scheme
//!
//! The signed digest is BLAKE3 over a canonical little-endian encoding of:
//! - A domain tag naming the message type and its fields
//! - Every field of the message, in declaration order
//!
//! Changing any field, or replaying the payload under the other message type,
//! yields a different digest.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{CLAIM_AND_STAKE_TYPEHASH, CLAIM_REWARDS_TYPEHASH};
use crate::error::CryptoError;
use crate::types::Address;

/// Ed25519 keypair for signing claims.
///
/// Wraps [`ed25519_dalek::SigningKey`]. The secret key is zeroized on drop
/// by the underlying library.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// The contributor address controlled by this key.
    pub fn address(&self) -> Address {
        self.public_key().address()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// BLAKE3 of the raw key bytes.
    pub fn address(&self) -> Address {
        Address(blake3::hash(&self.to_bytes()).into())
    }

    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

/// A detached signature plus the key that produced it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ClaimSignature {
    pub public_key: [u8; 32],
    #[serde(with = "hex_signature")]
    pub signature: [u8; 64],
}

impl ClaimSignature {
    /// Verify against `digest` and check the signer controls `contributor`.
    pub fn verify(&self, digest: &[u8; 32], contributor: &Address) -> Result<(), CryptoError> {
        let pk = PublicKey::from_bytes(&self.public_key)?;
        if pk.address() != *contributor {
            return Err(CryptoError::SignerMismatch);
        }
        pk.verify(digest, &self.signature)
    }
}

/// Payload a contributor signs to let a relayer claim on their behalf.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimRewardsMessage {
    pub garden: Address,
    pub contributor: Address,
    pub babl: u128,
    pub profit: u128,
    pub nonce: u64,
    pub max_fee: u128,
}

impl ClaimRewardsMessage {
    pub fn digest(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(CLAIM_REWARDS_TYPEHASH.len() + 128);
        data.extend_from_slice(CLAIM_REWARDS_TYPEHASH);
        data.extend_from_slice(self.garden.as_bytes());
        data.extend_from_slice(self.contributor.as_bytes());
        data.extend_from_slice(&self.babl.to_le_bytes());
        data.extend_from_slice(&self.profit.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data.extend_from_slice(&self.max_fee.to_le_bytes());
        blake3::hash(&data).into()
    }

    pub fn sign(&self, keypair: &KeyPair) -> ClaimSignature {
        ClaimSignature {
            public_key: keypair.public_key().to_bytes(),
            signature: keypair.sign(&self.digest()),
        }
    }
}

/// Payload for claiming and immediately staking the BABL part into another garden.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClaimAndStakeMessage {
    pub garden: Address,
    pub stake_garden: Address,
    pub contributor: Address,
    pub babl: u128,
    pub profit: u128,
    pub min_amount_out: u128,
    /// Claim nonce in `garden`.
    pub nonce: u64,
    /// Deposit nonce in `stake_garden`.
    pub nonce_heart: u64,
    pub max_fee: u128,
    pub price_per_share: u128,
}

impl ClaimAndStakeMessage {
    pub fn digest(&self) -> [u8; 32] {
        let mut data = Vec::with_capacity(CLAIM_AND_STAKE_TYPEHASH.len() + 192);
        data.extend_from_slice(CLAIM_AND_STAKE_TYPEHASH);
        data.extend_from_slice(self.garden.as_bytes());
        data.extend_from_slice(self.stake_garden.as_bytes());
        data.extend_from_slice(self.contributor.as_bytes());
        data.extend_from_slice(&self.babl.to_le_bytes());
        data.extend_from_slice(&self.profit.to_le_bytes());
        data.extend_from_slice(&self.min_amount_out.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        data.extend_from_slice(&self.nonce_heart.to_le_bytes());
        data.extend_from_slice(&self.max_fee.to_le_bytes());
        data.extend_from_slice(&self.price_per_share.to_le_bytes());
        blake3::hash(&data).into()
    }

    pub fn sign(&self, keypair: &KeyPair) -> ClaimSignature {
        ClaimSignature {
            public_key: keypair.public_key().to_bytes(),
            signature: keypair.sign(&self.digest()),
        }
    }
}

mod hex_signature {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sig: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(sig))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let text = String::deserialize(d)?;
        let bytes = hex::decode(text).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))
    }
}
