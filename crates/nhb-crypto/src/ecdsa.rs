//! # Recoverable ECDSA (secp256k1)
//!
//! Ethereum-style recoverable signatures: 65 bytes `r || s || v` with
//! `v ∈ {27, 28}`. The signer is never transmitted; verifiers recover the
//! public key from the digest and signature and derive the 20-byte address
//! from it.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Low-S normalization applied by libsecp256k1 on signing
//! - Recovery rejects zero `r`/`s` and out-of-range `v` before touching the
//!   curve

use crate::{keccak256, CryptoError};
use nhb_types::{Address, Hash};
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

/// A 65-byte recoverable signature in `r || s || v` layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSig([u8; 65]);

impl RecoverableSig {
    /// Construct from raw components. `v` must be 27 or 28.
    pub fn from_rsv(r: [u8; 32], s: [u8; 32], v: u8) -> Result<Self, CryptoError> {
        if v != 27 && v != 28 {
            return Err(CryptoError::InvalidSignatureFormat);
        }
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&r);
        bytes[32..64].copy_from_slice(&s);
        bytes[64] = v;
        Ok(Self(bytes))
    }

    /// Construct from a 65-byte slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignatureFormat);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self::from_rsv(r, s, bytes[64])
    }

    pub fn r(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[..32]);
        out
    }

    pub fn s(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[32..64]);
        out
    }

    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Raw 65-byte layout.
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }
}

/// Derive the 20-byte account address from a public key.
///
/// Address = last 20 bytes of Keccak-256(uncompressed point without the
/// 0x04 tag), matching the Ethereum derivation.
pub fn address_from_pubkey(pubkey: &PublicKey) -> Address {
    let uncompressed = pubkey.serialize_uncompressed();
    let digest = keccak256(&uncompressed[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&digest[12..]);
    addr
}

/// Sign a 32-byte digest, producing a recoverable signature.
pub fn sign_digest(digest: &Hash, secret: &SecretKey) -> RecoverableSig {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest(*digest);
    let signature = secp.sign_ecdsa_recoverable(&message, secret);
    let (recovery_id, compact) = signature.serialize_compact();

    let mut bytes = [0u8; 65];
    bytes[..64].copy_from_slice(&compact);
    bytes[64] = 27 + recovery_id.to_i32() as u8;
    RecoverableSig(bytes)
}

/// Recover the signer address of a digest from a recoverable signature.
pub fn recover_address(digest: &Hash, sig: &RecoverableSig) -> Result<Address, CryptoError> {
    let r = sig.r();
    let s = sig.s();
    if r == [0u8; 32] || s == [0u8; 32] {
        return Err(CryptoError::InvalidSignatureFormat);
    }

    let recovery_id = RecoveryId::from_i32(i32::from(sig.v()) - 27)
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;

    let mut compact = [0u8; 64];
    compact[..32].copy_from_slice(&r);
    compact[32..].copy_from_slice(&s);
    let signature = RecoverableSignature::from_compact(&compact, recovery_id)
        .map_err(|_| CryptoError::InvalidSignatureFormat)?;

    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(*digest);
    let pubkey = secp
        .recover_ecdsa(&message, &signature)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_pubkey(&pubkey))
}

/// A secp256k1 keypair with address derivation.
pub struct Keypair {
    secret: SecretKey,
}

impl Keypair {
    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { secret })
    }

    /// The secret key.
    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// The account address of this keypair.
    pub fn address(&self) -> Address {
        let secp = Secp256k1::signing_only();
        let pubkey = PublicKey::from_secret_key(&secp, &self.secret);
        address_from_pubkey(&pubkey)
    }

    /// Sign a 32-byte digest.
    pub fn sign(&self, digest: &Hash) -> RecoverableSig {
        sign_digest(digest, &self.secret)
    }
}
