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

//! Isolated signing-key vault.
//!
//! The vault is the only component that holds secret scalars. Everything else
//! talks to it through the [`SecureVault`] entry calls, which have strict
//! copy-in/copy-out semantics: arguments and results are owned values, and no
//! reference to vault-internal memory ever crosses the boundary.
//!
//! On hardware targets the boundary is a privilege transition; in this
//! repository [`SoftwareVault`] is the one concrete implementation, and tests
//! substitute doubles that simulate boundary faults.

pub mod entropy;
pub mod vault;

pub use entropy::{EntropyError, EntropySource, OsEntropy};
pub use vault::{SecureVault, SoftwareVault, VaultError, VAULT_CAPACITY};
