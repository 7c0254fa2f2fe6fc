use crate::crypto::{self, Hasher};
use crate::error::Result;
use crate::DigestAlgorithm;

/// A utility for hashing request and response payloads.
///
/// The hash binds the entity body and its media type to the MAC: it covers
/// a `hawk.1.payload` tag line, the normalized content type, and the raw
/// body bytes.  Feed the body to [`update`](PayloadHasher::update) (or use
/// the one-shot [`hash`](PayloadHasher::hash)), then carry the result in
/// the request or response being signed.
///
/// The content type is normalized here: parameters are stripped at the
/// first `;`, and the media type is trimmed and lower-cased, so
/// `"text/plain; charset=utf-8"` and `"text/plain"` hash identically.
pub struct PayloadHasher {
    inner: Box<dyn Hasher>,
}

impl PayloadHasher {
    /// Create a new hasher for a body with the given content type.  The
    /// algorithm is the same one the credentials' MAC key uses, available
    /// from [`Key::algorithm`](crate::Key::algorithm).
    pub fn new(content_type: &str, algorithm: DigestAlgorithm) -> Result<PayloadHasher> {
        let mut inner = crypto::cryptographer().hasher(algorithm)?;
        inner.update(b"hawk.1.payload\n")?;
        inner.update(normalize_content_type(content_type).as_bytes())?;
        inner.update(b"\n")?;
        Ok(PayloadHasher { inner })
    }

    /// Hash a complete payload in one call.
    pub fn hash<B: AsRef<[u8]>>(
        content_type: &str,
        algorithm: DigestAlgorithm,
        payload: B,
    ) -> Result<Vec<u8>> {
        let mut hasher = PayloadHasher::new(content_type, algorithm)?;
        hasher.update(payload)?;
        hasher.finish()
    }

    /// Add body bytes to the hash.
    pub fn update<B: AsRef<[u8]>>(&mut self, data: B) -> Result<()> {
        self.inner.update(data.as_ref())?;
        Ok(())
    }

    /// Finish hashing and return the digest.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.inner.update(b"\n")?;
        Ok(self.inner.finish()?)
    }
}

fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}
