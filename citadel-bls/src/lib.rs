// Copyright (C) 2025 Category Labs, Inc.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! BLS12-381 signing primitives for the Citadel remote signer.
//!
//! Thin wrapper around `blst` in the min-pk configuration: 32-byte secret
//! scalars, 48-byte compressed public keys in G1, 96-byte compressed
//! signatures in G2. Public keys and signatures also carry fixed-width
//! lowercase hex renderings (96 and 192 characters) because that is the form
//! the wire protocol and the vault's lookup work with.

use std::fmt;

use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use blst::min_pk as bls;
use blst::BLST_ERROR;

/// Secret scalar length in bytes.
pub const SECRET_KEY_LEN: usize = 32;
/// Compressed G1 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 48;
/// Compressed G2 signature length in bytes.
pub const SIGNATURE_LEN: usize = 96;
/// Hex characters in a compressed public key.
pub const PUBLIC_KEY_HEX_LEN: usize = 96;
/// Hex characters in a compressed signature.
pub const SIGNATURE_HEX_LEN: usize = 192;

/// Domain separation tag for hash-to-curve (proof-of-possession scheme).
const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Errors from BLS operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlsError {
    #[error("invalid secret scalar")]
    InvalidSecretKey,

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("keygen seed too short: {0} bytes, need at least 32")]
    SeedTooShort(usize),

    #[error("signature verification failed")]
    VerifyFailed,
}

/// A 32-byte secret scalar. Zeroized on drop, never printed.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretScalar([u8; SECRET_KEY_LEN]);

impl SecretScalar {
    /// Validate and adopt a raw scalar. Rejects zero and out-of-range values
    /// by round-tripping through the curve library's own check.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        let sk = bls::SecretKey::from_bytes(bytes).map_err(|_| BlsError::InvalidSecretKey)?;
        Ok(Self(sk.to_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.0
    }

    fn to_blst(&self) -> Result<bls::SecretKey, BlsError> {
        bls::SecretKey::from_bytes(&self.0).map_err(|_| BlsError::InvalidSecretKey)
    }
}

impl Default for SecretScalar {
    /// All-zero placeholder for unused storage slots. Not a valid key; the
    /// validating constructor rejects it.
    fn default() -> Self {
        Self([0u8; SECRET_KEY_LEN])
    }
}

impl fmt::Debug for SecretScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretScalar(..)")
    }
}

/// The fixed 96-character hex form of a compressed public key.
///
/// Comparisons are byte-exact over the hex characters; case is preserved as
/// given, so a lookup only matches the lowercase form this crate produces.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKeyHex([u8; PUBLIC_KEY_HEX_LEN]);

impl PublicKeyHex {
    /// Parse from a string of exactly 96 hex characters (no `0x` prefix).
    pub fn parse(s: &str) -> Result<Self, BlsError> {
        let bytes = s.as_bytes();
        if bytes.len() != PUBLIC_KEY_HEX_LEN || !bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(BlsError::InvalidPublicKey);
        }
        let mut out = [0u8; PUBLIC_KEY_HEX_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_str(&self) -> &str {
        // Contents are ASCII hex by construction.
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl Default for PublicKeyHex {
    fn default() -> Self {
        Self([b'0'; PUBLIC_KEY_HEX_LEN])
    }
}

impl fmt::Display for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for PublicKeyHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyHex({})", self.as_str())
    }
}

/// A compressed G1 public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlsPublicKey([u8; PUBLIC_KEY_LEN]);

impl BlsPublicKey {
    /// Parse and group-check a compressed public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        let pk = bls::PublicKey::key_validate(bytes).map_err(|_| BlsError::InvalidPublicKey)?;
        Ok(Self(pk.compress()))
    }

    pub fn compress(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.0
    }

    pub fn to_hex(&self) -> PublicKeyHex {
        let hex = hex::encode(self.0);
        let mut out = [0u8; PUBLIC_KEY_HEX_LEN];
        out.copy_from_slice(hex.as_bytes());
        PublicKeyHex(out)
    }
}

/// A compressed G2 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlsSignature([u8; SIGNATURE_LEN]);

impl BlsSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlsError> {
        let sig = bls::Signature::from_bytes(bytes).map_err(|_| BlsError::InvalidSignature)?;
        Ok(Self(sig.compress()))
    }

    pub fn compress(&self) -> [u8; SIGNATURE_LEN] {
        self.0
    }

    /// Lowercase hex form, 192 characters, no `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Derive a secret scalar from a seed of at least 32 bytes.
///
/// The seed must come from a high-quality entropy source; `key_info` feeds
/// the library's keygen expansion and may be empty.
pub fn derive_secret_from_seed(seed: &[u8], key_info: &[u8]) -> Result<SecretScalar, BlsError> {
    if seed.len() < SECRET_KEY_LEN {
        return Err(BlsError::SeedTooShort(seed.len()));
    }
    let sk = bls::SecretKey::key_gen(seed, key_info).map_err(|_| BlsError::InvalidSecretKey)?;
    Ok(SecretScalar(sk.to_bytes()))
}

/// Compute the public key paired with a secret scalar.
pub fn public_from_secret(secret: &SecretScalar) -> Result<BlsPublicKey, BlsError> {
    Ok(BlsPublicKey(secret.to_blst()?.sk_to_pk().compress()))
}

/// Sign a message. The library hashes the message to the curve under the
/// proof-of-possession domain separation tag.
pub fn sign(secret: &SecretScalar, message: &[u8]) -> Result<BlsSignature, BlsError> {
    Ok(BlsSignature(secret.to_blst()?.sign(message, DST, &[]).compress()))
}

/// Verify a signature against a message and public key.
pub fn verify(
    signature: &BlsSignature,
    message: &[u8],
    public_key: &BlsPublicKey,
) -> Result<(), BlsError> {
    let sig = bls::Signature::from_bytes(&signature.0).map_err(|_| BlsError::InvalidSignature)?;
    let pk = bls::PublicKey::from_bytes(&public_key.0).map_err(|_| BlsError::InvalidPublicKey)?;
    match sig.verify(true, message, DST, &[], &pk, true) {
        BLST_ERROR::BLST_SUCCESS => Ok(()),
        _ => Err(BlsError::VerifyFailed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret() -> SecretScalar {
        derive_secret_from_seed(&[127u8; 32], &[]).unwrap()
    }

    #[test]
    fn test_keygen_deterministic() {
        let a = derive_secret_from_seed(&[7u8; 32], &[]).unwrap();
        let b = derive_secret_from_seed(&[7u8; 32], &[]).unwrap();
        assert_eq!(a, b);

        let c = derive_secret_from_seed(&[8u8; 32], &[]).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_keygen_short_seed_rejected() {
        let err = derive_secret_from_seed(&[1u8; 16], &[]).unwrap_err();
        assert_eq!(err, BlsError::SeedTooShort(16));
    }

    #[test]
    fn test_public_key_hex_form() {
        let pk = public_from_secret(&test_secret()).unwrap();
        let hex = pk.to_hex();
        assert_eq!(hex.as_str().len(), PUBLIC_KEY_HEX_LEN);
        assert!(hex.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_public_key_hex_parse_rejects_bad_input() {
        assert!(PublicKeyHex::parse("ab").is_err());
        assert!(PublicKeyHex::parse(&"g".repeat(96)).is_err());
        assert!(PublicKeyHex::parse(&"a".repeat(96)).is_ok());
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let secret = test_secret();
        let pk = public_from_secret(&secret).unwrap();

        let message = b"test message";
        let sig = sign(&secret, message).unwrap();

        assert!(verify(&sig, message, &pk).is_ok());
        assert_eq!(sig.to_hex().len(), SIGNATURE_HEX_LEN);
    }

    #[test]
    fn test_verify_rejects_tampered_message() {
        let secret = test_secret();
        let pk = public_from_secret(&secret).unwrap();

        let sig = sign(&secret, b"message one").unwrap();
        assert_eq!(
            verify(&sig, b"message two", &pk).unwrap_err(),
            BlsError::VerifyFailed
        );
    }

    #[test]
    fn test_secret_scalar_rejects_invalid_bytes() {
        // Zero is not a valid secret scalar.
        assert!(SecretScalar::from_bytes(&[0u8; 32]).is_err());
        // Values at or above the group order are rejected.
        assert!(SecretScalar::from_bytes(&[0xffu8; 32]).is_err());
        // A scalar produced by keygen round-trips.
        let secret = test_secret();
        let adopted = SecretScalar::from_bytes(secret.as_bytes()).unwrap();
        assert_eq!(secret, adopted);
    }
}
