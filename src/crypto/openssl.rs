use super::{CryptoError, Cryptographer, Hasher, HmacKey};
use crate::DigestAlgorithm;
use openssl::{hash, memcmp, pkey, sign};

impl From<openssl::error::ErrorStack> for CryptoError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        CryptoError::Other(e.into())
    }
}

pub struct OpensslCryptographer;

struct OpensslHmacKey {
    key: pkey::PKey<pkey::Private>,
    digest: hash::MessageDigest,
}

impl HmacKey for OpensslHmacKey {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut signer = sign::Signer::new(self.digest, &self.key)?;
        signer.update(data)?;
        Ok(signer.sign_to_vec()?)
    }
}

struct OpensslHasher(hash::Hasher);

impl Hasher for OpensslHasher {
    fn update(&mut self, data: &[u8]) -> Result<(), CryptoError> {
        self.0.update(data)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, CryptoError> {
        Ok(self.0.finish()?.as_ref().to_vec())
    }
}

impl Cryptographer for OpensslCryptographer {
    fn rand_bytes(&self, output: &mut [u8]) -> Result<(), CryptoError> {
        openssl::rand::rand_bytes(output)?;
        Ok(())
    }

    fn hmac_key(
        &self,
        algorithm: DigestAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn HmacKey>, CryptoError> {
        Ok(Box::new(OpensslHmacKey {
            key: pkey::PKey::hmac(key)?,
            digest: message_digest(algorithm),
        }))
    }

    fn hasher(&self, algorithm: DigestAlgorithm) -> Result<Box<dyn Hasher>, CryptoError> {
        Ok(Box::new(OpensslHasher(hash::Hasher::new(message_digest(
            algorithm,
        ))?)))
    }

    fn constant_time_compare(&self, a: &[u8], b: &[u8]) -> bool {
        // memcmp::eq panics on length mismatch
        a.len() == b.len() && memcmp::eq(a, b)
    }
}

fn message_digest(algorithm: DigestAlgorithm) -> hash::MessageDigest {
    match algorithm {
        DigestAlgorithm::Sha256 => hash::MessageDigest::sha256(),
        DigestAlgorithm::Sha384 => hash::MessageDigest::sha384(),
        DigestAlgorithm::Sha512 => hash::MessageDigest::sha512(),
    }
}
