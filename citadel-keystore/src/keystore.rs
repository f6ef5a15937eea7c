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

//! Keystore container shape.
//!
//! Field lookups are case-sensitive; a missing or wrong-typed field is a
//! decode failure before any cryptographic work starts. Containers routinely
//! carry extra metadata (`version`, `uuid`, `path`, ...) which is ignored.

use serde::Deserialize;
use serde_json::Value;

/// One parsed keystore container. Transient: lives for a single import step
/// and is discarded once a secret (or a failure) has been produced.
#[derive(Debug, Deserialize)]
pub struct KeystoreDescriptor {
    pub crypto: CryptoModules,
}

#[derive(Debug, Deserialize)]
pub struct CryptoModules {
    pub kdf: KdfModule,
    pub checksum: ChecksumModule,
    pub cipher: CipherModule,
}

/// KDF selection plus its still-untyped parameter object. The parameters are
/// decoded per function by [`crate::kdf::Kdf::select`].
#[derive(Debug, Deserialize)]
pub struct KdfModule {
    pub function: String,
    pub params: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChecksumModule {
    /// Hex digest the derived key must reproduce.
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CipherModule {
    pub params: CipherParams,
    /// Hex ciphertext of the secret scalar.
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CipherParams {
    /// Hex initialization vector.
    pub iv: String,
}

impl KeystoreDescriptor {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}
