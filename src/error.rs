use crate::crypto::CryptoError;
use failure::Fail;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "Unparseable Hawk header: {}", _0)]
    HeaderParseError(String),

    #[fail(display = "Missing `{}` attribute in Hawk header", _0)]
    MissingAttribute(&'static str),

    #[fail(display = "Invalid timestamp")]
    InvalidTimestamp,

    #[fail(display = "Invalid url: {}", _0)]
    InvalidUrl(String),

    #[fail(display = "Unsupported digest algorithm: {}", _0)]
    UnsupportedAlgorithm(String),

    #[fail(display = "Invalid credentials")]
    InvalidCredentials,

    #[fail(display = "Unknown credentials id")]
    CredentialsNotFound,

    #[fail(display = "MAC mismatch")]
    BadMac,

    /// The request timestamp fell outside the allowed skew window.  Carries
    /// the server's current time (seconds since the epoch) so a legitimate
    /// client can retry with a corrected local-time offset.
    #[fail(display = "Stale timestamp; server time is {}", _0)]
    StaleTimestamp(u64),

    #[fail(display = "Nonce has already been used")]
    ReplayDetected,

    #[fail(display = "Payload hash mismatch")]
    PayloadTampered,

    #[fail(display = "Payload verification requested but no payload supplied")]
    MissingPayload,

    #[fail(display = "Server authentication header did not validate")]
    ServerAuthInvalid,

    /// The credential or nonce store could not be reached.  Not an
    /// authentication failure; callers decide whether to retry.
    #[fail(display = "Collaborator unavailable: {}", _0)]
    CollaboratorUnavailable(String),

    #[fail(display = "{}", _0)]
    Crypto(#[fail(cause)] CryptoError),

    #[fail(display = "Base64 decode error: {}", _0)]
    Decode(#[fail(cause)] base64::DecodeError),

    #[fail(display = "{}", _0)]
    Io(#[fail(cause)] std::io::Error),

    #[fail(display = "RNG error: {}", _0)]
    Rng(#[fail(cause)] rand::Error),
}

impl Error {
    /// True for the kinds that an embedding server must collapse to a
    /// uniform 401 on the wire.  The wire response never distinguishes
    /// among these; the kind itself is for the caller's logs and metrics.
    /// Everything else (store outages, caller integration mistakes) is the
    /// server's own problem and maps to a 5xx.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::HeaderParseError(_)
            | Error::MissingAttribute(_)
            | Error::InvalidTimestamp
            | Error::Decode(_)
            | Error::CredentialsNotFound
            | Error::BadMac
            | Error::StaleTimestamp(_)
            | Error::ReplayDetected
            | Error::PayloadTampered => true,
            _ => false,
        }
    }
}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::UnsupportedDigest(algo) => {
                Error::UnsupportedAlgorithm(algo.to_string())
            }
            e => Error::Crypto(e),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<rand::Error> for Error {
    fn from(e: rand::Error) -> Self {
        Error::Rng(e)
    }
}
