//! Pluggable cryptographic primitives.
//!
//! Everything the protocol needs from a crypto library — HMAC, digests,
//! random bytes and constant-time comparison — goes through the
//! [`Cryptographer`] trait.  The `use_ring` feature (default) installs a
//! *ring*-backed implementation automatically; `use_openssl` provides an
//! OpenSSL one.  Embedders with their own primitives (NSS, a HSM shim)
//! can install them with [`set_cryptographer`] before any other call into
//! this crate.

use crate::DigestAlgorithm;
use failure::Fail;
use once_cell::sync::OnceCell;

#[cfg(feature = "use_openssl")]
pub(crate) mod openssl;
#[cfg(feature = "use_ring")]
pub(crate) mod ring;

#[derive(Debug, Fail)]
pub enum CryptoError {
    #[fail(display = "Digest algorithm {} is not supported by this backend", _0)]
    UnsupportedDigest(DigestAlgorithm),

    #[fail(display = "Cryptographic backend error: {}", _0)]
    Other(failure::Error),
}

/// An initialized HMAC key, bound to the algorithm it was created with.
pub trait HmacKey: Send + Sync {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// An incremental hash computation.
pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError>;

    /// Finish the computation, returning the digest bytes.  Must not be
    /// called twice.
    fn finish(&mut self) -> Result<Vec<u8>, CryptoError>;
}

/// The set of primitives the protocol consumes.
pub trait Cryptographer: Send + Sync {
    fn rand_bytes(&self, output: &mut [u8]) -> Result<(), CryptoError>;
    fn hmac_key(
        &self,
        algorithm: DigestAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HmacKey>, CryptoError>;
    fn hasher(&self, algorithm: DigestAlgorithm) -> Result<Box<dyn Hasher>, CryptoError>;

    /// Compare two byte strings without short-circuiting on content.
    /// Callers guarantee equal lengths.
    fn constant_time_compare(&self, a: &[u8], b: &[u8]) -> bool;
}

static CRYPTOGRAPHER: OnceCell<&'static dyn Cryptographer> = OnceCell::new();

#[derive(Debug, Fail)]
#[fail(display = "Cryptographer already initialized")]
pub struct SetCryptographerError(());

/// Install the global [`Cryptographer`].  May only be called once in the
/// lifetime of a program, before any operation that performs cryptography.
pub fn set_cryptographer(c: &'static dyn Cryptographer) -> Result<(), SetCryptographerError> {
    CRYPTOGRAPHER.set(c).map_err(|_| SetCryptographerError(()))
}

/// As [`set_cryptographer`], but taking (and leaking) a boxed instance.
pub fn set_boxed_cryptographer(
    c: Box<dyn Cryptographer>,
) -> Result<(), SetCryptographerError> {
    set_cryptographer(Box::leak(c))
}

pub(crate) fn cryptographer() -> &'static dyn Cryptographer {
    autoinit();
    *CRYPTOGRAPHER
        .get()
        .expect("no `talon` cryptographer installed; enable a backend feature or call set_cryptographer")
}

#[cfg(feature = "use_ring")]
#[inline]
fn autoinit() {
    let _ = set_cryptographer(&ring::RingCryptographer);
}

#[cfg(all(feature = "use_openssl", not(feature = "use_ring")))]
#[inline]
fn autoinit() {
    let _ = set_cryptographer(&openssl::OpensslCryptographer);
}

#[cfg(not(any(feature = "use_ring", feature = "use_openssl")))]
#[inline]
fn autoinit() {}
