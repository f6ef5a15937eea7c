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

//! The key store behind the trust boundary.

use citadel_bls::{BlsSignature, PublicKeyHex, SecretScalar};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use thiserror::Error;

use crate::entropy::{EntropyError, EntropySource};

/// Maximum number of keys the vault can hold.
pub const VAULT_CAPACITY: usize = 10;

/// Bytes drawn from the entropy source per generated key. The draw is
/// conditioned with SHA-256 into the 32-byte keygen seed.
const ENTROPY_DRAW_LEN: usize = 144;

/// Errors reported across the vault boundary.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault is at capacity ({0} keys)")]
    CapacityExceeded(usize),

    #[error("secret is already present in the vault")]
    DuplicateKey,

    #[error("no key matches the requested public key")]
    NotFound,

    #[error(transparent)]
    Entropy(#[from] EntropyError),

    #[error("curve operation failed: {0}")]
    Bls(#[from] citadel_bls::BlsError),

    /// Failure of the call crossing into the secure domain. Fatal for the
    /// current request; never retried automatically.
    #[error("secure boundary fault: {0}")]
    BoundaryFault(String),
}

/// Entry calls into the isolated key store.
///
/// Each method is a single atomic crossing of the trust boundary. All
/// operations fail closed: an error leaves the store exactly as it was, and
/// the parallel secret/public storage never goes out of sync.
pub trait SecureVault {
    /// Number of keys currently stored.
    fn size(&self) -> Result<usize, VaultError>;

    /// Copy out the public half of every record, in storage order.
    fn export_public_keys(&self) -> Result<Vec<PublicKeyHex>, VaultError>;

    /// Byte-exact lookup over the 96-character hex form.
    fn contains(&self, public_key: &PublicKeyHex) -> Result<bool, VaultError>;

    /// Look up the secret paired with `public_key` and sign `message` with
    /// it, as one uninterruptible operation. No selection state survives the
    /// call.
    fn sign_with(
        &self,
        public_key: &PublicKeyHex,
        message: &[u8],
    ) -> Result<BlsSignature, VaultError>;

    /// Derive a fresh key from the entropy source and append it.
    fn generate(&mut self, entropy: &mut dyn EntropySource) -> Result<PublicKeyHex, VaultError>;

    /// Append an externally recovered secret, unless it is byte-equal to a
    /// record already stored. This is the sole deduplication guard for
    /// imported keys.
    fn import_external(&mut self, secret: SecretScalar) -> Result<PublicKeyHex, VaultError>;

    /// Zero every record and reset the count. Irreversible.
    fn reset(&mut self) -> Result<(), VaultError>;
}

/// The software rendition of the secure domain: fixed-capacity parallel
/// arrays of secret scalars and public-key hex forms, plus a count. Slots at
/// or beyond `count` hold zeroed placeholders and are never read.
pub struct SoftwareVault {
    secrets: [SecretScalar; VAULT_CAPACITY],
    public_keys: [PublicKeyHex; VAULT_CAPACITY],
    count: usize,
}

impl SoftwareVault {
    pub fn new() -> Self {
        Self {
            secrets: Default::default(),
            public_keys: [PublicKeyHex::default(); VAULT_CAPACITY],
            count: 0,
        }
    }

    fn position_of(&self, public_key: &PublicKeyHex) -> Option<usize> {
        self.public_keys[..self.count]
            .iter()
            .position(|stored| stored == public_key)
    }

    /// Append a record. Both halves are written before the count moves, so a
    /// reader never observes a half-written record.
    fn append(&mut self, secret: SecretScalar, public_key: PublicKeyHex) {
        self.secrets[self.count] = secret;
        self.public_keys[self.count] = public_key;
        self.count += 1;
    }
}

impl Default for SoftwareVault {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureVault for SoftwareVault {
    fn size(&self) -> Result<usize, VaultError> {
        Ok(self.count)
    }

    fn export_public_keys(&self) -> Result<Vec<PublicKeyHex>, VaultError> {
        Ok(self.public_keys[..self.count].to_vec())
    }

    fn contains(&self, public_key: &PublicKeyHex) -> Result<bool, VaultError> {
        Ok(self.position_of(public_key).is_some())
    }

    fn sign_with(
        &self,
        public_key: &PublicKeyHex,
        message: &[u8],
    ) -> Result<BlsSignature, VaultError> {
        let index = self.position_of(public_key).ok_or(VaultError::NotFound)?;
        let signature = citadel_bls::sign(&self.secrets[index], message)?;
        debug!(%public_key, message_len = message.len(), "signed message");
        Ok(signature)
    }

    fn generate(&mut self, entropy: &mut dyn EntropySource) -> Result<PublicKeyHex, VaultError> {
        if self.count == VAULT_CAPACITY {
            warn!("key generation rejected: vault full");
            return Err(VaultError::CapacityExceeded(VAULT_CAPACITY));
        }

        let mut draw = [0u8; ENTROPY_DRAW_LEN];
        entropy.fill(&mut draw)?;
        let seed: [u8; 32] = Sha256::digest(draw).into();

        let secret = citadel_bls::derive_secret_from_seed(&seed, &[])?;
        let public_key = citadel_bls::public_from_secret(&secret)?.to_hex();
        self.append(secret, public_key);
        debug!(%public_key, count = self.count, "generated key");
        Ok(public_key)
    }

    fn import_external(&mut self, secret: SecretScalar) -> Result<PublicKeyHex, VaultError> {
        if self.count == VAULT_CAPACITY {
            warn!("key import rejected: vault full");
            return Err(VaultError::CapacityExceeded(VAULT_CAPACITY));
        }
        if self.secrets[..self.count].iter().any(|s| *s == secret) {
            warn!("key import rejected: duplicate secret");
            return Err(VaultError::DuplicateKey);
        }

        // Derive the public half before touching storage so a failure adds
        // nothing.
        let public_key = citadel_bls::public_from_secret(&secret)?.to_hex();
        self.append(secret, public_key);
        debug!(%public_key, count = self.count, "imported key");
        Ok(public_key)
    }

    fn reset(&mut self) -> Result<(), VaultError> {
        self.secrets = Default::default();
        self.public_keys = [PublicKeyHex::default(); VAULT_CAPACITY];
        self.count = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::OsEntropy;

    /// Deterministic entropy for reproducible vault contents.
    struct StubEntropy(u8);

    impl EntropySource for StubEntropy {
        fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
            buf.fill(self.0);
            self.0 = self.0.wrapping_add(1);
            Ok(())
        }
    }

    /// Entropy source that always fails.
    struct DeadEntropy;

    impl EntropySource for DeadEntropy {
        fn fill(&mut self, _buf: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError("no randomness available".into()))
        }
    }

    fn secret(tag: u8) -> SecretScalar {
        citadel_bls::derive_secret_from_seed(&[tag; 32], &[]).unwrap()
    }

    #[test]
    fn test_new_vault_is_empty() {
        let vault = SoftwareVault::new();
        assert_eq!(vault.size().unwrap(), 0);
        assert!(vault.export_public_keys().unwrap().is_empty());
    }

    #[test]
    fn test_generate_then_export_then_sign() {
        let mut vault = SoftwareVault::new();
        let mut entropy = StubEntropy(1);

        let public_key = vault.generate(&mut entropy).unwrap();
        assert_eq!(vault.size().unwrap(), 1);

        let exported = vault.export_public_keys().unwrap();
        assert_eq!(exported, vec![public_key]);
        assert!(vault.contains(&public_key).unwrap());

        let message = b"attestation root";
        let signature = vault.sign_with(&public_key, message).unwrap();

        let pk = citadel_bls::BlsPublicKey::from_bytes(
            &hex::decode(public_key.as_str()).unwrap(),
        )
        .unwrap();
        assert!(citadel_bls::verify(&signature, message, &pk).is_ok());
    }

    #[test]
    fn test_sign_with_unknown_key_fails() {
        let mut vault = SoftwareVault::new();
        vault.generate(&mut StubEntropy(1)).unwrap();

        let absent = PublicKeyHex::parse(&"a".repeat(96)).unwrap();
        assert!(matches!(
            vault.sign_with(&absent, b"msg").unwrap_err(),
            VaultError::NotFound
        ));
    }

    #[test]
    fn test_import_deduplicates() {
        let mut vault = SoftwareVault::new();

        vault.import_external(secret(1)).unwrap();
        assert_eq!(vault.size().unwrap(), 1);

        let err = vault.import_external(secret(1)).unwrap_err();
        assert!(matches!(err, VaultError::DuplicateKey));
        assert_eq!(vault.size().unwrap(), 1);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut vault = SoftwareVault::new();
        for tag in 0..VAULT_CAPACITY as u8 {
            vault.import_external(secret(tag + 1)).unwrap();
        }
        assert_eq!(vault.size().unwrap(), VAULT_CAPACITY);

        let err = vault.import_external(secret(100)).unwrap_err();
        assert!(matches!(err, VaultError::CapacityExceeded(_)));
        assert_eq!(vault.size().unwrap(), VAULT_CAPACITY);

        let err = vault.generate(&mut StubEntropy(1)).unwrap_err();
        assert!(matches!(err, VaultError::CapacityExceeded(_)));
        assert_eq!(vault.size().unwrap(), VAULT_CAPACITY);
    }

    #[test]
    fn test_entropy_failure_is_fatal_and_adds_nothing() {
        let mut vault = SoftwareVault::new();
        let err = vault.generate(&mut DeadEntropy).unwrap_err();
        assert!(matches!(err, VaultError::Entropy(_)));
        assert_eq!(vault.size().unwrap(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut vault = SoftwareVault::new();
        vault.import_external(secret(1)).unwrap();
        vault.import_external(secret(2)).unwrap();

        vault.reset().unwrap();
        assert_eq!(vault.size().unwrap(), 0);
        assert!(vault.export_public_keys().unwrap().is_empty());

        // The same secrets import cleanly again after a reset.
        vault.import_external(secret(1)).unwrap();
        assert_eq!(vault.size().unwrap(), 1);
    }

    #[test]
    fn test_export_preserves_storage_order() {
        let mut vault = SoftwareVault::new();
        let first = vault.import_external(secret(1)).unwrap();
        let second = vault.import_external(secret(2)).unwrap();
        let third = vault.generate(&mut StubEntropy(9)).unwrap();

        assert_eq!(
            vault.export_public_keys().unwrap(),
            vec![first, second, third]
        );
    }

    #[test]
    fn test_generate_with_os_entropy() {
        let mut vault = SoftwareVault::new();
        let public_key = vault.generate(&mut OsEntropy).unwrap();
        assert!(vault.contains(&public_key).unwrap());
    }
}
