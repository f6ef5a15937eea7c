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

//! Password verification and secret recovery.

use aes::cipher::{KeyIvInit, StreamCipher};
use citadel_bls::SecretScalar;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::kdf::DerivedKey;
use crate::pipeline::ImportError;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

/// Initialization vector length for AES-128-CTR.
pub const IV_LEN: usize = 16;
/// Ciphertext length: exactly one secret scalar.
pub const CIPHERTEXT_LEN: usize = 32;

/// Prove the derived key (and therefore the password) is right before any
/// decryption is attempted: SHA-256(checksum_key ‖ ciphertext) must equal the
/// stored checksum message. A mismatch is an authentication failure, distinct
/// from a malformed container.
pub fn verify_checksum(
    key: &DerivedKey,
    cipher_message: &[u8],
    checksum_message: &[u8],
) -> Result<(), ImportError> {
    let mut hasher = Sha256::new();
    hasher.update(key.checksum_key());
    hasher.update(cipher_message);
    if hasher.finalize().as_slice() != checksum_message {
        return Err(ImportError::WrongPassword);
    }
    Ok(())
}

/// Recover the 32-byte secret scalar from the cipher message.
pub fn decrypt_secret(
    key: &DerivedKey,
    iv: &[u8],
    cipher_message: &[u8],
) -> Result<SecretScalar, ImportError> {
    if iv.len() != IV_LEN {
        return Err(ImportError::Decode(format!(
            "cipher iv must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }
    if cipher_message.len() != CIPHERTEXT_LEN {
        return Err(ImportError::Decode(format!(
            "cipher message must be {CIPHERTEXT_LEN} bytes, got {}",
            cipher_message.len()
        )));
    }

    let mut plaintext = [0u8; CIPHERTEXT_LEN];
    plaintext.copy_from_slice(cipher_message);

    let cipher_key = key.cipher_key();
    let mut cipher = Aes128Ctr::new_from_slices(&cipher_key, iv)
        .map_err(|e| ImportError::Decode(format!("cipher init: {e}")))?;
    cipher.apply_keystream(&mut plaintext);

    let secret = SecretScalar::from_bytes(&plaintext)
        .map_err(|e| ImportError::Decode(format!("recovered secret: {e}")));
    plaintext.zeroize();
    secret
}

/// Encrypt a secret scalar. Test-support counterpart of [`decrypt_secret`],
/// also used by tooling that writes keystores.
pub fn encrypt_secret(key: &DerivedKey, iv: &[u8; IV_LEN], secret: &SecretScalar) -> Vec<u8> {
    let mut ciphertext = secret.as_bytes().to_vec();
    let cipher_key = key.cipher_key();
    if let Ok(mut cipher) = Aes128Ctr::new_from_slices(&cipher_key, iv) {
        cipher.apply_keystream(&mut ciphertext);
    }
    ciphertext
}

/// Checksum a cipher message the way [`verify_checksum`] expects.
pub fn compute_checksum(key: &DerivedKey, cipher_message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.checksum_key());
    hasher.update(cipher_message);
    hasher.finalize().into()
}
