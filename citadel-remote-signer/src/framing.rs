//! Request framing and classification.
//!
//! Works directly on the raw receive buffer: first a cheap textual pass
//! decides whether the request is even complete, then the header tokenizer
//! produces the structured view and the path routes to a typed command.
//! Commands borrow from the buffer and must not outlive it.

use tracing::debug;

/// Receive buffer ceiling. A request that does not fit is rejected.
pub const MAX_REQUEST_BYTES: usize = 32 * 1024;

/// Upper bound on headers; the tokenizer fails hard above this.
pub const MAX_HEADERS: usize = 100;

/// Hex characters in a compressed public key.
pub const PUBLIC_KEY_HEX_LEN: usize = 96;

/// Buffers shorter than this with no terminator in sight may still be
/// growing; longer ones without one are garbage.
const MIN_DECIDABLE_LEN: usize = 300;

const SIGN_PATH_PREFIX: &str = "/api/v1/eth2/sign/0x";
const CONTENT_LENGTH_NEEDLE: &[u8] = b"Content-Length: ";

/// Response body encoding chosen from the `Accept` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptType {
    TextPlain,
    ApplicationJson,
}

/// A classified request. Borrowed fields are views into the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Upcheck,
    ListKeys,
    Sign {
        /// The 96 hex characters from the path, without the `0x` prefix.
        public_key_hex: &'a str,
        body: &'a [u8],
    },
    ImportKeystores {
        body: &'a [u8],
    },
}

/// Outcome of one framing pass over the buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// Not a final answer: more bytes may still arrive.
    Incomplete,
    /// Request shape rejected outright.
    Malformed,
    Complete {
        command: Command<'a>,
        accept: AcceptType,
    },
}

/// Frame and classify the buffer as received so far.
pub fn classify(buffer: &[u8]) -> Verdict<'_> {
    match completeness(buffer) {
        Completeness::Incomplete => return Verdict::Incomplete,
        Completeness::Malformed => return Verdict::Malformed,
        Completeness::Complete => {}
    }
    structured_parse(buffer)
}

enum Completeness {
    Incomplete,
    Malformed,
    Complete,
}

/// Textual completeness check, before any structured parsing.
///
/// POST completeness hangs off the `Content-Length` header: the expected
/// total is the offset of the CR terminating that header line, plus the
/// declared body length, plus 4 for the blank-line terminator. A buffer
/// longer than expected carries trailing garbage and is rejected.
fn completeness(buffer: &[u8]) -> Completeness {
    if buffer.len() > MAX_REQUEST_BYTES {
        return Completeness::Malformed;
    }

    if buffer.starts_with(b"POST") {
        let Some(needle_at) = find(buffer, CONTENT_LENGTH_NEEDLE) else {
            return short_or_malformed(buffer);
        };
        let value_at = needle_at + CONTENT_LENGTH_NEEDLE.len();
        let Some(cr_offset) = buffer[value_at..].iter().position(|&b| b == b'\r') else {
            // Header line not terminated yet.
            return short_or_malformed(buffer);
        };
        let Some(declared) = parse_decimal(&buffer[value_at..value_at + cr_offset]) else {
            return Completeness::Malformed;
        };
        let expected = value_at + cr_offset + declared + 4;
        match buffer.len().cmp(&expected) {
            std::cmp::Ordering::Less => Completeness::Incomplete,
            std::cmp::Ordering::Greater => Completeness::Malformed,
            std::cmp::Ordering::Equal => Completeness::Complete,
        }
    } else if buffer.starts_with(b"GET") {
        if find(buffer, b"\r\n\r\n").is_some() {
            Completeness::Complete
        } else {
            short_or_malformed(buffer)
        }
    } else if b"POST".starts_with(buffer) || b"GET".starts_with(buffer) {
        // Too few bytes to even tell the method apart.
        Completeness::Incomplete
    } else {
        Completeness::Malformed
    }
}

fn short_or_malformed(buffer: &[u8]) -> Completeness {
    if buffer.len() < MIN_DECIDABLE_LEN {
        Completeness::Incomplete
    } else {
        Completeness::Malformed
    }
}

/// Tokenize headers and route the path.
fn structured_parse(buffer: &[u8]) -> Verdict<'_> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut request = httparse::Request::new(&mut headers);

    let status = match request.parse(buffer) {
        Ok(status) => status,
        // Includes the too-many-headers hard failure.
        Err(_) => return Verdict::Malformed,
    };
    if status.is_partial() {
        return Verdict::Incomplete;
    }

    let (Some(method), Some(path)) = (request.method, request.path) else {
        return Verdict::Malformed;
    };
    debug!(
        method,
        path,
        minor_version = request.version.unwrap_or(0),
        "parsed request"
    );

    let accept = negotiate_accept(request.headers);

    match method {
        "GET" => match path {
            "/upcheck" => Verdict::Complete {
                command: Command::Upcheck,
                accept,
            },
            "/api/v1/eth2/publicKeys" => Verdict::Complete {
                command: Command::ListKeys,
                accept,
            },
            _ => Verdict::Malformed,
        },
        "POST" => {
            let Some(body) = body_view(buffer, request.headers) else {
                return Verdict::Malformed;
            };
            if let Some(key_hex) = path.strip_prefix(SIGN_PATH_PREFIX) {
                if key_hex.len() == PUBLIC_KEY_HEX_LEN
                    && key_hex.bytes().all(|b| b.is_ascii_hexdigit())
                {
                    Verdict::Complete {
                        command: Command::Sign {
                            public_key_hex: key_hex,
                            body,
                        },
                        accept,
                    }
                } else {
                    Verdict::Malformed
                }
            } else if path == "/eth/v1/keystores" {
                Verdict::Complete {
                    command: Command::ImportKeystores { body },
                    accept,
                }
            } else {
                Verdict::Malformed
            }
        }
        _ => Verdict::Malformed,
    }
}

/// The body occupies the last `Content-Length` bytes of the buffer.
fn body_view<'a>(buffer: &'a [u8], headers: &[httparse::Header<'_>]) -> Option<&'a [u8]> {
    let declared = headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
        .and_then(|h| parse_decimal(h.value))?;
    if declared > buffer.len() {
        return None;
    }
    Some(&buffer[buffer.len() - declared..])
}

/// `application/json` only on an exact match (or `*/*`); everything else,
/// including no header at all, falls back to plain text.
fn negotiate_accept(headers: &[httparse::Header<'_>]) -> AcceptType {
    for header in headers {
        if header.name == "Accept" {
            return if header.value == b"application/json" || header.value == b"*/*" {
                AcceptType::ApplicationJson
            } else {
                AcceptType::TextPlain
            };
        }
    }
    AcceptType::TextPlain
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: usize = 0;
    for &b in bytes {
        value = value.checked_mul(10)?.checked_add((b - b'0') as usize)?;
    }
    Some(value)
}
