//! Orchestrator and serving loop.
//!
//! [`SignerService`] is the only component that talks to the framer, the
//! vault and the keystore pipeline: one received buffer in, one rendered
//! response out. [`SignerServer`] wraps it in a blocking accept/read/respond
//! loop, one request in flight at a time.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};

use citadel_bls::PublicKeyHex;
use citadel_keystore::{pipeline, ImportError};
use citadel_vault::{SecureVault, VaultError, VAULT_CAPACITY};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::framing::{self, AcceptType, Command, Verdict, MAX_REQUEST_BYTES};
use crate::response;

/// Errors from the serving loop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of feeding the received bytes to the service.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The request is not complete yet; keep reading.
    Pending,
    /// Final response for this request.
    Respond(Vec<u8>),
}

/// Failures while unpacking an import request, before and around the
/// pipeline. All of them map to a 400 response.
#[derive(Debug, Error)]
enum ImportRequestError {
    #[error("request body is not valid JSON: {0}")]
    Body(#[from] serde_json::Error),

    #[error("missing or mistyped {0} array")]
    MissingArray(&'static str),

    #[error("keystores and passwords differ in length or are empty")]
    LengthMismatch,

    #[error("passwords must be strings")]
    PasswordType,

    #[error("import of {requested} keystores with {stored} keys stored exceeds capacity")]
    Capacity { stored: usize, requested: usize },

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Pipeline(#[from] ImportError),
}

/// Errors loading a keystore file at startup.
#[derive(Debug, Error)]
pub enum KeystoreFileError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path:?} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Dispatches classified commands against the vault.
pub struct SignerService<V> {
    vault: V,
}

impl<V: SecureVault> SignerService<V> {
    pub fn new(vault: V) -> Self {
        Self { vault }
    }

    pub fn vault(&self) -> &V {
        &self.vault
    }

    pub fn vault_mut(&mut self) -> &mut V {
        &mut self.vault
    }

    pub fn into_vault(self) -> V {
        self.vault
    }

    /// Run the framer over the buffer as received so far and, if it yields a
    /// verdict, produce the response bytes.
    pub fn handle_buffer(&mut self, buffer: &[u8]) -> Outcome {
        match framing::classify(buffer) {
            Verdict::Incomplete => Outcome::Pending,
            Verdict::Malformed => {
                debug!(len = buffer.len(), "rejecting malformed request");
                Outcome::Respond(response::BAD_REQUEST_RESPONSE.to_vec())
            }
            Verdict::Complete { command, accept } => {
                Outcome::Respond(self.dispatch(command, accept))
            }
        }
    }

    fn dispatch(&mut self, command: Command<'_>, accept: AcceptType) -> Vec<u8> {
        match command {
            Command::Upcheck => response::UPCHECK_RESPONSE.to_vec(),
            Command::ListKeys => self.list_keys(),
            Command::Sign {
                public_key_hex,
                body,
            } => self.sign(public_key_hex, body, accept),
            Command::ImportKeystores { body } => self.import_keystores(body),
        }
    }

    fn list_keys(&self) -> Vec<u8> {
        match self.vault.export_public_keys() {
            Ok(keys) => response::public_keys(&keys),
            Err(e) => {
                error!("public key export failed: {e}");
                response::BAD_REQUEST_RESPONSE.to_vec()
            }
        }
    }

    fn sign(&mut self, public_key_hex: &str, body: &[u8], accept: AcceptType) -> Vec<u8> {
        // Routing already validated length and charset.
        let Ok(public_key) = PublicKeyHex::parse(public_key_hex) else {
            return response::BAD_REQUEST_RESPONSE.to_vec();
        };

        // Unknown key wins over a bad body: 404 regardless of what follows.
        match self.vault.contains(&public_key) {
            Ok(true) => {}
            Ok(false) => {
                debug!(%public_key, "signing key not found");
                return response::KEY_NOT_FOUND_RESPONSE.to_vec();
            }
            Err(e) => {
                error!("vault lookup failed: {e}");
                return response::BAD_REQUEST_RESPONSE.to_vec();
            }
        }

        let Some(signing_root) = signing_root(body) else {
            debug!("sign request body missing a usable signingRoot");
            return response::BAD_REQUEST_RESPONSE.to_vec();
        };

        match self.vault.sign_with(&public_key, &signing_root) {
            Ok(signature) => response::signature(&signature.to_hex(), accept),
            Err(e) => {
                error!("signing failed: {e}");
                response::BAD_REQUEST_RESPONSE.to_vec()
            }
        }
    }

    fn import_keystores(&mut self, body: &[u8]) -> Vec<u8> {
        match self.try_import(body) {
            Ok(imported) => {
                info!(imported, "keystore import complete");
                self.list_keys()
            }
            Err(e) => {
                warn!("keystore import rejected: {e}");
                response::BAD_REQUEST_RESPONSE.to_vec()
            }
        }
    }

    fn try_import(&mut self, body: &[u8]) -> Result<usize, ImportRequestError> {
        let request: Value = serde_json::from_slice(body)?;

        let keystores = request
            .get("keystores")
            .and_then(Value::as_array)
            .ok_or(ImportRequestError::MissingArray("keystores"))?;
        let passwords = request
            .get("passwords")
            .and_then(Value::as_array)
            .ok_or(ImportRequestError::MissingArray("passwords"))?;
        if keystores.is_empty() || keystores.len() != passwords.len() {
            return Err(ImportRequestError::LengthMismatch);
        }
        let passwords: Vec<&str> = passwords
            .iter()
            .map(Value::as_str)
            .collect::<Option<_>>()
            .ok_or(ImportRequestError::PasswordType)?;

        let stored = self.vault.size()?;
        if stored + keystores.len() > VAULT_CAPACITY {
            return Err(ImportRequestError::Capacity {
                stored,
                requested: keystores.len(),
            });
        }

        pipeline::import_batch(&mut self.vault, keystores, &passwords)?;
        Ok(keystores.len())
    }

    /// Import one encrypted keystore file, typically at daemon startup.
    pub fn import_keystore_file(
        &mut self,
        path: &Path,
        password: &str,
    ) -> Result<(), KeystoreFileError> {
        let contents = std::fs::read_to_string(path).map_err(|e| KeystoreFileError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let keystore: Value =
            serde_json::from_str(&contents).map_err(|e| KeystoreFileError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;
        pipeline::import_one(&mut self.vault, &keystore, password)?;
        info!(?path, "imported keystore file");
        Ok(())
    }
}

/// Pull `signingRoot` out of the request body and hex-decode it. An optional
/// `0x` prefix is accepted.
fn signing_root(body: &[u8]) -> Option<Vec<u8>> {
    let json: Value = serde_json::from_slice(body).ok()?;
    let root = json.get("signingRoot")?.as_str()?;
    let root = root.strip_prefix("0x").unwrap_or(root);
    hex::decode(root).ok()
}

/// Blocking TCP server around a [`SignerService`].
pub struct SignerServer<V> {
    listener: TcpListener,
    service: SignerService<V>,
}

impl<V: SecureVault> SignerServer<V> {
    pub fn bind(addr: SocketAddr, vault: V) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)?;
        info!("signer listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            service: SignerService::new(vault),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve forever, one connection and one request at a time.
    pub fn run(&mut self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "new connection");
                    if let Err(e) = self.handle_connection(stream) {
                        error!("error handling connection: {e}");
                    }
                }
                Err(e) => {
                    error!("error accepting connection: {e}");
                }
            }
        }
    }

    /// Read into the receive buffer until the framer yields a verdict, then
    /// write the response and close.
    fn handle_connection(&mut self, mut stream: TcpStream) -> Result<(), ServerError> {
        let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
        let mut filled = 0;

        loop {
            let read = stream.read(&mut buffer[filled..])?;
            if read == 0 {
                debug!("peer closed before a complete request");
                return Ok(());
            }
            filled += read;

            match self.service.handle_buffer(&buffer[..filled]) {
                Outcome::Pending => {
                    if filled == buffer.len() {
                        // Buffer exhausted without a complete request.
                        stream.write_all(response::BAD_REQUEST_RESPONSE)?;
                        stream.flush()?;
                        return Ok(());
                    }
                }
                Outcome::Respond(bytes) => {
                    stream.write_all(&bytes)?;
                    stream.flush()?;
                    return Ok(());
                }
            }
        }
    }
}
