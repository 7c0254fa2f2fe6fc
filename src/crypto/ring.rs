use super::{CryptoError, Cryptographer, Hasher, HmacKey};
use crate::DigestAlgorithm;
use failure::err_msg;
use ring::{digest, hmac};

impl From<ring::error::Unspecified> for CryptoError {
    // ring's errors are entirely opaque
    fn from(_: ring::error::Unspecified) -> Self {
        CryptoError::Other(err_msg("Unspecified ring error"))
    }
}

pub struct RingCryptographer;

struct RingHmacKey(hmac::Key);

impl HmacKey for RingHmacKey {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let tag = hmac::sign(&self.0, data);
        Ok(tag.as_ref().to_vec())
    }
}

// Always `Some` until `finish` is called.
struct RingHasher(Option<digest::Context>);

impl Hasher for RingHasher {
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.0
            .as_mut()
            .expect("update called after `finish`")
            .update(data);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, CryptoError> {
        let digest = self.0.take().expect("`finish` called twice").finish();
        Ok(digest.as_ref().to_vec())
    }
}

impl Cryptographer for RingCryptographer {
    fn rand_bytes(&self, output: &mut [u8]) -> Result<(), CryptoError> {
        use ring::rand::SecureRandom;
        ring::rand::SystemRandom::new().fill(output)?;
        Ok(())
    }

    fn hmac_key(
        &self,
        algorithm: DigestAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HmacKey>, CryptoError> {
        let k = hmac::Key::new(hmac_algorithm(algorithm)?, key);
        Ok(Box::new(RingHmacKey(k)))
    }

    fn hasher(&self, algorithm: DigestAlgorithm) -> Result<Box<dyn Hasher>, CryptoError> {
        let ctx = digest::Context::new(digest_algorithm(algorithm)?);
        Ok(Box::new(RingHasher(Some(ctx))))
    }

    fn constant_time_compare(&self, a: &[u8], b: &[u8]) -> bool {
        ring::constant_time::verify_slices_are_equal(a, b).is_ok()
    }
}

fn hmac_algorithm(algorithm: DigestAlgorithm) -> Result<hmac::Algorithm, CryptoError> {
    match algorithm {
        DigestAlgorithm::Sha256 => Ok(hmac::HMAC_SHA256),
        DigestAlgorithm::Sha384 => Ok(hmac::HMAC_SHA384),
        DigestAlgorithm::Sha512 => Ok(hmac::HMAC_SHA512),
    }
}

fn digest_algorithm(
    algorithm: DigestAlgorithm,
) -> Result<&'static digest::Algorithm, CryptoError> {
    match algorithm {
        DigestAlgorithm::Sha256 => Ok(&digest::SHA256),
        DigestAlgorithm::Sha384 => Ok(&digest::SHA384),
        DigestAlgorithm::Sha512 => Ok(&digest::SHA512),
    }
}
