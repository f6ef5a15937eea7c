//! Remote signer for validator keys.
//!
//! This crate serves a small HTTP surface over a key vault that lives in an
//! isolated trust domain. Private key material never leaves the vault except
//! as a computed signature or a public key.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐    HTTP over TCP    ┌─────────────────┐  entry calls  ┌────────────┐
//! │  Validator   │ ◄─────────────────► │  Signer daemon  │ ◄───────────► │  Key vault │
//! │   client     │   request/response  │  (this crate)   │  copy-in/out  │ (isolated) │
//! └──────────────┘                     └─────────────────┘               └────────────┘
//! ```
//!
//! One request is in flight at a time; the flow per request is strictly
//! receive buffer → framer/classifier → vault or keystore pipeline →
//! response builder → transport.
//!
//! ## Surface
//!
//! | Method | Path                          | Action                     |
//! |--------|-------------------------------|----------------------------|
//! | GET    | `/upcheck`                    | health check               |
//! | GET    | `/api/v1/eth2/publicKeys`     | list stored public keys    |
//! | POST   | `/api/v1/eth2/sign/0x<96hex>` | sign a `signingRoot`       |
//! | POST   | `/eth/v1/keystores`           | import encrypted keystores |
//!
//! Anything else is answered with a 400; signing with an unknown key with a
//! 404.
//!
//! ## Usage
//!
//! Start the signer daemon:
//! ```bash
//! citadel-signer-daemon \
//!     --listen 127.0.0.1:9000 \
//!     --keystore /path/to/keystore.json
//! ```

pub mod framing;
pub mod response;
pub mod server;

pub use framing::{classify, AcceptType, Command, Verdict, MAX_HEADERS, MAX_REQUEST_BYTES};
pub use server::{KeystoreFileError, Outcome, ServerError, SignerServer, SignerService};
