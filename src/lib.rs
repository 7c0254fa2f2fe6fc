//! The `talon` crate provides support for the Hawk HTTP authentication
//! scheme: a client proves possession of a shared symmetric key by sending
//! a keyed digest (MAC) over a canonical form of each request, and the
//! server can prove its own possession of the same key back to the client
//! with a response-side MAC (`Server-Authorization`).
//!
//! The crate implements the protocol only.  It does not touch sockets or
//! parse HTTP; the embedding client or server hands it the relevant parts
//! of a request (method, host, port, path and query) and the header field
//! values, and gets headers or verdicts back.  Credential storage and
//! nonce tracking are injected collaborators (see [`CredentialsStore`] and
//! [`NonceStore`]).
//!
//! # Examples
//!
//! ## Signing a request (client)
//!
//! ```
//! use talon::{Credentials, Key, RequestBuilder, SHA256};
//!
//! let credentials = Credentials {
//!     id: "test-client".to_string(),
//!     key: Key::new("no-secret", SHA256).unwrap(),
//! };
//! let request = RequestBuilder::new("GET", "localhost", 8000, "/resource").request();
//! let (header, _state) = request.make_header(&credentials).unwrap();
//!
//! let value = format!("Hawk {}", header);
//! assert!(value.starts_with("Hawk id="));
//! assert!(value.contains("mac="));
//! ```
//!
//! ## Authenticating a request and proving the response (server)
//!
//! ```
//! use talon::{
//!     authenticate, AuthOptions, Credentials, Header, Key, MemoryCredentialsStore,
//!     MemoryNonceStore, RequestBuilder, ResponseBuilder, SHA256,
//! };
//!
//! // Client side: sign an outgoing request, keeping the state for later.
//! let credentials = Credentials {
//!     id: "dh37fgj492je".to_string(),
//!     key: Key::new("werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn", SHA256).unwrap(),
//! };
//! let request = RequestBuilder::new("GET", "127.0.0.1", 8002, "/resource/1?b=1&a=2")
//!     .ext("and welcome!")
//!     .request();
//! let (header, state) = request.make_header(&credentials).unwrap();
//! let authorization = format!("Hawk {}", header);
//!
//! // Server side: authenticate against injected stores, then sign the
//! // response.
//! let mut store = MemoryCredentialsStore::new();
//! store.insert("dh37fgj492je", "werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn", SHA256);
//! let nonces = MemoryNonceStore::new();
//!
//! let parsed = Header::from_authorization(&authorization).unwrap();
//! let view = RequestBuilder::new("GET", "127.0.0.1", 8002, "/resource/1?b=1&a=2").request();
//! let (creds, artifacts) =
//!     authenticate(&view, &parsed, None, &store, &nonces, &AuthOptions::default()).unwrap();
//! assert_eq!(creds.id, "dh37fgj492je");
//! assert_eq!(artifacts.ext.as_ref().map(String::as_str), Some("and welcome!"));
//!
//! let response_header = ResponseBuilder::from_artifacts(&artifacts)
//!     .response()
//!     .make_header(&creds.key)
//!     .unwrap();
//!
//! // Client side again: check the server's proof.
//! let check = request
//!     .make_response_builder(&state)
//!     .response()
//!     .validate_header(&response_header, &credentials.key);
//! assert!(check.is_ok());
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

mod credentials;
pub use crate::credentials::{Credentials, Key};

mod crypto;
pub use crate::crypto::{
    set_boxed_cryptographer, set_cryptographer, CryptoError, Cryptographer, Hasher, HmacKey,
    SetCryptographerError,
};

mod error;
pub use crate::error::{Error, Result};

mod header;
pub use crate::header::Header;

mod mac;
pub use crate::mac::{Mac, MacInput, MacType};

mod payload;
pub use crate::payload::PayloadHasher;

mod request;
pub use crate::request::{Request, RequestBuilder};

mod response;
pub use crate::response::{Response, ResponseBuilder};

mod server;
pub use crate::server::{
    authenticate, Artifacts, AuthOptions, CredentialsStore, MemoryCredentialsStore,
    MemoryNonceStore, NonceStore, Payload,
};

/// The authentication scheme name, as it appears on the wire in
/// `Authorization`, `Server-Authorization` and `WWW-Authenticate` headers.
pub const SCHEME: &str = "Hawk";

/// The digest algorithms the protocol can be parameterized with.  The
/// algorithm name is part of the stored credentials; an unrecognized name
/// fails with [`Error::UnsupportedAlgorithm`] rather than falling back to
/// any default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

pub const SHA256: DigestAlgorithm = DigestAlgorithm::Sha256;
pub const SHA384: DigestAlgorithm = DigestAlgorithm::Sha384;
pub const SHA512: DigestAlgorithm = DigestAlgorithm::Sha512;

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            DigestAlgorithm::Sha256 => "sha256",
            DigestAlgorithm::Sha384 => "sha384",
            DigestAlgorithm::Sha512 => "sha512",
        })
    }
}

impl FromStr for DigestAlgorithm {
    type Err = Error;
    fn from_str(s: &str) -> Result<DigestAlgorithm> {
        match s {
            "sha256" => Ok(DigestAlgorithm::Sha256),
            "sha384" => Ok(DigestAlgorithm::Sha384),
            "sha512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Client-side state for a single request: the timestamp and nonce that
/// went into the request MAC.  Keep it around to validate the server's
/// `Server-Authorization` response header against the same values.
#[derive(Debug, Clone)]
pub struct RequestState {
    pub ts: SystemTime,
    pub nonce: String,
}

impl RequestState {
    /// Generate state for a new request: the current time and a fresh
    /// random nonce.
    pub fn new() -> Result<RequestState> {
        RequestState::with_offset(0)
    }

    /// As [`RequestState::new`], but offsetting the local clock by
    /// `offset_secs`.  Use this to pre-compensate known skew against a
    /// server, e.g. from the server time conveyed in
    /// [`Error::StaleTimestamp`].
    pub fn with_offset(offset_secs: i64) -> Result<RequestState> {
        let now = SystemTime::now();
        let ts = if offset_secs >= 0 {
            now + Duration::from_secs(offset_secs as u64)
        } else {
            now - Duration::from_secs((-offset_secs) as u64)
        };
        Ok(RequestState {
            ts,
            nonce: random_nonce(6)?,
        })
    }
}

/// Generate a random nonce with `bytes` bytes of entropy.  The result is
/// base64-encoded, so it is longer than `bytes` characters.
fn random_nonce(bytes: usize) -> Result<String> {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().try_fill_bytes(&mut buf)?;
    Ok(base64::encode(&buf))
}
