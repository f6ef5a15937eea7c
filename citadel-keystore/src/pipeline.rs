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

//! The import pipeline: keystore + password in, vault record out.

use citadel_vault::{SecureVault, VaultError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cipher::{decrypt_secret, verify_checksum};
use crate::kdf::{decode_hex, Kdf};
use crate::keystore::KeystoreDescriptor;

/// Import failures, ordered by pipeline stage.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The container shape is invalid: missing module, wrong-typed field,
    /// bad hex, unsupported parameter.
    #[error("malformed keystore: {0}")]
    Decode(String),

    /// The derived key failed checksum verification.
    #[error("password verification failed")]
    WrongPassword,

    /// The vault refused the recovered secret (duplicate, capacity, fault).
    #[error(transparent)]
    Vault(#[from] VaultError),
}

/// Run one keystore through the pipeline and hand the recovered secret to
/// the vault. Stages execute in strict order and the first failure stops the
/// import with nothing added.
pub fn import_one<V>(vault: &mut V, keystore: &Value, password: &str) -> Result<(), ImportError>
where
    V: SecureVault + ?Sized,
{
    let descriptor = KeystoreDescriptor::from_value(keystore)
        .map_err(|e| ImportError::Decode(e.to_string()))?;

    let kdf = Kdf::select(&descriptor.crypto.kdf)?;
    let derived = kdf.derive(password)?;

    let cipher_message = decode_hex("cipher message", &descriptor.crypto.cipher.message)?;
    let checksum_message = decode_hex("checksum message", &descriptor.crypto.checksum.message)?;
    verify_checksum(&derived, &cipher_message, &checksum_message)?;

    let iv = decode_hex("cipher iv", &descriptor.crypto.cipher.params.iv)?;
    let secret = decrypt_secret(&derived, &iv, &cipher_message)?;

    let public_key = vault.import_external(secret)?;
    debug!(%public_key, "keystore imported");
    Ok(())
}

/// Run an ordered batch of (keystore, password) pairs.
///
/// Processing stops at the first failing element and reports that failure;
/// keys imported by earlier elements of the same batch are kept. Duplicate
/// detection therefore also covers keys imported earlier in the batch, since
/// they are already in the vault by the time later elements run.
pub fn import_batch<V>(
    vault: &mut V,
    keystores: &[Value],
    passwords: &[&str],
) -> Result<(), ImportError>
where
    V: SecureVault + ?Sized,
{
    debug_assert_eq!(keystores.len(), passwords.len());
    for (index, (keystore, password)) in keystores.iter().zip(passwords).enumerate() {
        if let Err(e) = import_one(vault, keystore, password) {
            warn!(index, "batch import stopped: {e}");
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{compute_checksum, encrypt_secret, IV_LEN};
    use crate::keystore::KdfModule;
    use citadel_bls::SecretScalar;
    use citadel_vault::{SoftwareVault, VAULT_CAPACITY};
    use serde_json::json;

    const PASSWORD: &str = "correct horse battery staple";

    fn secret(tag: u8) -> SecretScalar {
        citadel_bls::derive_secret_from_seed(&[tag; 32], &[]).unwrap()
    }

    /// Build a keystore container with the same primitives the pipeline
    /// reverses.
    fn make_keystore(kdf_params: serde_json::Value, function: &str, password: &str, secret: &SecretScalar) -> Value {
        let module = KdfModule {
            function: function.to_string(),
            params: kdf_params.clone(),
        };
        let derived = Kdf::select(&module).unwrap().derive(password).unwrap();

        let iv = [7u8; IV_LEN];
        let ciphertext = encrypt_secret(&derived, &iv, secret);
        let checksum = compute_checksum(&derived, &ciphertext);

        json!({
            "version": 4,
            "crypto": {
                "kdf": {"function": function, "params": kdf_params, "message": ""},
                "checksum": {"function": "sha256", "params": {}, "message": hex::encode(checksum)},
                "cipher": {"function": "aes-128-ctr", "params": {"iv": hex::encode(iv)}, "message": hex::encode(ciphertext)}
            }
        })
    }

    fn pbkdf2_keystore(password: &str, secret: &SecretScalar) -> Value {
        make_keystore(
            json!({"dklen": 32, "c": 12, "prf": "hmac-sha256", "salt": "d4e5f6"}),
            "pbkdf2",
            password,
            secret,
        )
    }

    fn scrypt_keystore(password: &str, secret: &SecretScalar) -> Value {
        make_keystore(
            json!({"dklen": 32, "n": 16, "r": 2, "p": 1, "salt": "a1b2c3"}),
            "scrypt",
            password,
            secret,
        )
    }

    #[test]
    fn test_import_pbkdf2_keystore() {
        let mut vault = SoftwareVault::new();
        let secret = secret(1);

        import_one(&mut vault, &pbkdf2_keystore(PASSWORD, &secret), PASSWORD).unwrap();

        assert_eq!(vault.size().unwrap(), 1);
        let expected = citadel_bls::public_from_secret(&secret).unwrap().to_hex();
        assert_eq!(vault.export_public_keys().unwrap(), vec![expected]);
    }

    #[test]
    fn test_import_scrypt_keystore() {
        let mut vault = SoftwareVault::new();
        let secret = secret(2);

        import_one(&mut vault, &scrypt_keystore(PASSWORD, &secret), PASSWORD).unwrap();

        assert_eq!(vault.size().unwrap(), 1);
        let expected = citadel_bls::public_from_secret(&secret).unwrap().to_hex();
        assert!(vault.contains(&expected).unwrap());
    }

    #[test]
    fn test_wrong_password_is_an_auth_failure() {
        let mut vault = SoftwareVault::new();
        let keystore = pbkdf2_keystore(PASSWORD, &secret(1));

        let err = import_one(&mut vault, &keystore, "wrong password").unwrap_err();
        assert!(matches!(err, ImportError::WrongPassword));
        assert_eq!(vault.size().unwrap(), 0);
    }

    #[test]
    fn test_unknown_kdf_is_a_decode_failure() {
        let mut vault = SoftwareVault::new();
        let mut keystore = pbkdf2_keystore(PASSWORD, &secret(1));
        keystore["crypto"]["kdf"]["function"] = json!("argon2id");

        let err = import_one(&mut vault, &keystore, PASSWORD).unwrap_err();
        assert!(matches!(err, ImportError::Decode(_)));
        assert_eq!(vault.size().unwrap(), 0);
    }

    #[test]
    fn test_missing_field_fails_before_any_kdf_work() {
        let mut vault = SoftwareVault::new();
        let mut keystore = pbkdf2_keystore(PASSWORD, &secret(1));
        keystore["crypto"]["kdf"]["params"]
            .as_object_mut()
            .unwrap()
            .remove("salt");

        let err = import_one(&mut vault, &keystore, PASSWORD).unwrap_err();
        assert!(matches!(err, ImportError::Decode(_)));
    }

    #[test]
    fn test_duplicate_import_is_rejected() {
        let mut vault = SoftwareVault::new();
        let keystore = pbkdf2_keystore(PASSWORD, &secret(1));

        import_one(&mut vault, &keystore, PASSWORD).unwrap();
        let err = import_one(&mut vault, &keystore, PASSWORD).unwrap_err();
        assert!(matches!(err, ImportError::Vault(VaultError::DuplicateKey)));
        assert_eq!(vault.size().unwrap(), 1);
    }

    #[test]
    fn test_batch_stops_at_first_failure_and_keeps_earlier_imports() {
        let mut vault = SoftwareVault::new();
        let keystores = vec![
            pbkdf2_keystore(PASSWORD, &secret(1)),
            pbkdf2_keystore("other password", &secret(2)),
            pbkdf2_keystore(PASSWORD, &secret(3)),
        ];
        let passwords = vec![PASSWORD, PASSWORD, PASSWORD];

        let err = import_batch(&mut vault, &keystores, &passwords).unwrap_err();
        assert!(matches!(err, ImportError::WrongPassword));

        // The first element stays imported; the third never ran.
        assert_eq!(vault.size().unwrap(), 1);
    }

    #[test]
    fn test_batch_duplicate_within_batch_is_rejected() {
        let mut vault = SoftwareVault::new();
        let keystores = vec![
            pbkdf2_keystore(PASSWORD, &secret(1)),
            scrypt_keystore(PASSWORD, &secret(1)),
        ];
        let passwords = vec![PASSWORD, PASSWORD];

        let err = import_batch(&mut vault, &keystores, &passwords).unwrap_err();
        assert!(matches!(err, ImportError::Vault(VaultError::DuplicateKey)));
        assert_eq!(vault.size().unwrap(), 1);
    }

    #[test]
    fn test_import_up_to_capacity_then_overflow() {
        let mut vault = SoftwareVault::new();
        for tag in 0..VAULT_CAPACITY as u8 {
            let keystore = pbkdf2_keystore(PASSWORD, &secret(tag + 1));
            import_one(&mut vault, &keystore, PASSWORD).unwrap();
        }
        assert_eq!(vault.size().unwrap(), VAULT_CAPACITY);

        let overflow = pbkdf2_keystore(PASSWORD, &secret(99));
        let err = import_one(&mut vault, &overflow, PASSWORD).unwrap_err();
        assert!(matches!(
            err,
            ImportError::Vault(VaultError::CapacityExceeded(_))
        ));
        assert_eq!(vault.size().unwrap(), VAULT_CAPACITY);
    }
}
