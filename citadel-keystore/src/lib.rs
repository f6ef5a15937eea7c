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

//! Encrypted keystore handling.
//!
//! A keystore is a password-protected JSON container for one private key:
//! a key-derivation module (`scrypt` or `pbkdf2`), a checksum module proving
//! the password is right, and a cipher module holding the encrypted secret.
//!
//! The import pipeline runs the stages in strict order and fails closed at
//! the first error:
//!
//! 1. KDF selection (`crypto.kdf.function`)
//! 2. decryption-key derivation from the password
//! 3. password verification against the checksum
//! 4. secret recovery (AES-128-CTR)
//! 5. hand-off to the vault
//!
//! A failing stage stops the current import before any later stage runs;
//! wrong-password and malformed-container failures are distinct.

pub mod cipher;
pub mod kdf;
pub mod keystore;
pub mod pipeline;

pub use kdf::{DerivedKey, Kdf};
pub use keystore::KeystoreDescriptor;
pub use pipeline::{import_batch, import_one, ImportError};
