use crate::crypto::{self, HmacKey};
use crate::error::{Error, Result};
use crate::DigestAlgorithm;
use std::fmt;

/// A Hawk key: secret bytes bound to a digest algorithm.
///
/// Any non-empty byte sequence can serve as a key, but note that each
/// algorithm has a suggested key length and that passwords should *not*
/// be used as keys.  Keys of unusual length are handled according to the
/// backend's HMAC implementation.
pub struct Key {
    key: Box<dyn HmacKey>,
    algorithm: DigestAlgorithm,
}

impl Key {
    pub fn new<B: AsRef<[u8]>>(key: B, algorithm: DigestAlgorithm) -> Result<Key> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        Ok(Key {
            key: crypto::cryptographer().hmac_key(algorithm, key)?,
            algorithm,
        })
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(data)?)
    }

    /// The digest algorithm this key was created with.  Payload hashes
    /// accompanying a request or response use the same algorithm family.
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }
}

// Key material must never appear in logs or error output.
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Key {{ algorithm: {}, key: <redacted> }}", self.algorithm)
    }
}

/// Hawk credentials: an id and the key associated with that id.  The
/// algorithm must be agreed between server and client; it travels inside
/// the [`Key`].
#[derive(Debug)]
pub struct Credentials {
    pub id: String,
    pub key: Key,
}
