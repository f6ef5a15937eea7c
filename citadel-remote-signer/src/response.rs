//! Wire-format responses.
//!
//! Fixed responses are canned byte strings; variable responses render their
//! body first, then emit headers with the measured byte length. The key-list
//! and signature responses terminate their headers with `\n\n` and count only
//! the bytes after it in `Content-Length`. Clients depend on those exact
//! bytes, so the quirk is part of the contract.

use citadel_bls::PublicKeyHex;

use crate::framing::AcceptType;

pub const UPCHECK_RESPONSE: &[u8] =
    b"HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\ncontent-length: 0\r\n\r\n";

pub const BAD_REQUEST_RESPONSE: &[u8] =
    b"HTTP/1.1 400 Bad request format\r\nContent-Type: application/json\r\nContent-Length: 0\r\n\r\n";

pub const KEY_NOT_FOUND_RESPONSE: &[u8] =
    b"HTTP/1.1 404 Public key not found\r\nContent-Type: application/json\r\nContent-Length: 0\r\n\r\n";

/// Render the key list: a JSON array of `0x`-prefixed hex strings, one per
/// line, in storage order.
pub fn public_keys(keys: &[PublicKeyHex]) -> Vec<u8> {
    let mut body = String::from("[\n");
    for (index, key) in keys.iter().enumerate() {
        body.push_str("\"0x");
        body.push_str(key.as_str());
        body.push('"');
        if index + 1 < keys.len() {
            body.push(',');
        }
        body.push('\n');
    }
    body.push(']');

    assemble("application/json", &body)
}

/// Render a signature per the negotiated accept type.
pub fn signature(signature_hex: &str, accept: AcceptType) -> Vec<u8> {
    match accept {
        AcceptType::ApplicationJson => assemble(
            "application/json",
            &format!("{{\"signature\": \"0x{signature_hex}\"}}"),
        ),
        AcceptType::TextPlain => assemble("text/plain", &format!("0x{signature_hex}")),
    }
}

fn assemble(content_type: &str, body: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(80 + body.len());
    out.extend_from_slice(b"HTTP/1.1 200 OK\r\nContent-Type: ");
    out.extend_from_slice(content_type.as_bytes());
    out.extend_from_slice(b"\r\nContent-Length: ");
    out.extend_from_slice(body.len().to_string().as_bytes());
    out.extend_from_slice(b"\n\n");
    out.extend_from_slice(body.as_bytes());
    out
}
