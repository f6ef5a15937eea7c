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

//! Entropy source contract for key generation.
//!
//! Key generation refuses to proceed without fresh randomness; a failing
//! source is reported, never silently substituted.

use rand::RngCore;
use thiserror::Error;

/// Failure of the underlying randomness source.
#[derive(Debug, Error)]
#[error("entropy source failed: {0}")]
pub struct EntropyError(pub String);

/// Supplies high-quality randomness on demand.
pub trait EntropySource {
    /// Fill `buf` completely or fail; partial fills are not allowed.
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError>;
}

/// Operating-system randomness.
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&mut self, buf: &mut [u8]) -> Result<(), EntropyError> {
        rand::rngs::OsRng
            .try_fill_bytes(buf)
            .map_err(|e| EntropyError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_entropy_fills_buffer() {
        let mut buf = [0u8; 64];
        OsEntropy.fill(&mut buf).unwrap();
        // 64 zero bytes from the OS RNG would be astronomically unlikely.
        assert!(buf.iter().any(|&b| b != 0));
    }
}
