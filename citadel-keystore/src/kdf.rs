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

//! Key-derivation function selection and execution.

use pbkdf2::pbkdf2_hmac;
use serde::Deserialize;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::keystore::KdfModule;
use crate::pipeline::ImportError;

/// Length of the derived decryption key. Fixed: bytes 0..16 key the cipher,
/// bytes 16..32 key the checksum.
pub const DERIVED_KEY_LEN: usize = 32;

/// The only pseudo-random function accepted for pbkdf2.
const PBKDF2_PRF: &str = "hmac-sha256";

/// Decryption key derived from the password. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; DERIVED_KEY_LEN]);

impl DerivedKey {
    /// First half: AES-128-CTR key.
    pub fn cipher_key(&self) -> [u8; 16] {
        let mut key = [0u8; 16];
        key.copy_from_slice(&self.0[..16]);
        key
    }

    /// Second half: checksum key.
    pub fn checksum_key(&self) -> &[u8] {
        &self.0[16..]
    }
}

#[derive(Debug, Deserialize)]
pub struct Pbkdf2Params {
    pub dklen: u32,
    pub c: u32,
    pub prf: String,
    pub salt: String,
}

#[derive(Debug, Deserialize)]
pub struct ScryptParams {
    pub dklen: u32,
    pub n: u32,
    pub r: u32,
    pub p: u32,
    pub salt: String,
}

/// KDF chosen from `crypto.kdf.function`. Exactly `"pbkdf2"` and `"scrypt"`
/// are accepted; anything else is a decode failure.
#[derive(Debug)]
pub enum Kdf {
    Pbkdf2(Pbkdf2Params),
    Scrypt(ScryptParams),
}

impl Kdf {
    pub fn select(module: &KdfModule) -> Result<Self, ImportError> {
        match module.function.as_str() {
            "pbkdf2" => Ok(Kdf::Pbkdf2(
                Pbkdf2Params::deserialize(&module.params)
                    .map_err(|e| ImportError::Decode(format!("kdf params: {e}")))?,
            )),
            "scrypt" => Ok(Kdf::Scrypt(
                ScryptParams::deserialize(&module.params)
                    .map_err(|e| ImportError::Decode(format!("kdf params: {e}")))?,
            )),
            other => Err(ImportError::Decode(format!(
                "unsupported kdf function {other:?}"
            ))),
        }
    }

    /// Run the selected KDF over the password.
    pub fn derive(&self, password: &str) -> Result<DerivedKey, ImportError> {
        let mut out = [0u8; DERIVED_KEY_LEN];
        match self {
            Kdf::Pbkdf2(params) => {
                if params.dklen as usize != DERIVED_KEY_LEN {
                    return Err(ImportError::Decode(format!(
                        "unsupported dklen {}",
                        params.dklen
                    )));
                }
                if params.prf != PBKDF2_PRF {
                    return Err(ImportError::Decode(format!(
                        "unsupported prf {:?}",
                        params.prf
                    )));
                }
                if params.c == 0 {
                    return Err(ImportError::Decode("pbkdf2 iteration count is 0".into()));
                }
                let salt = decode_hex("kdf salt", &params.salt)?;
                pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, params.c, &mut out);
            }
            Kdf::Scrypt(params) => {
                if params.dklen as usize != DERIVED_KEY_LEN {
                    return Err(ImportError::Decode(format!(
                        "unsupported dklen {}",
                        params.dklen
                    )));
                }
                if params.n < 2 || !params.n.is_power_of_two() {
                    return Err(ImportError::Decode(format!(
                        "scrypt cost {} is not a power of two",
                        params.n
                    )));
                }
                let log_n = params.n.trailing_zeros() as u8;
                let scrypt_params =
                    scrypt::Params::new(log_n, params.r, params.p, DERIVED_KEY_LEN)
                        .map_err(|e| ImportError::Decode(format!("scrypt params: {e}")))?;
                let salt = decode_hex("kdf salt", &params.salt)?;
                scrypt::scrypt(password.as_bytes(), &salt, &scrypt_params, &mut out)
                    .map_err(|e| ImportError::Decode(format!("scrypt: {e}")))?;
            }
        }
        Ok(DerivedKey(out))
    }
}

pub(crate) fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, ImportError> {
    hex::decode(value).map_err(|e| ImportError::Decode(format!("{field}: {e}")))
}
