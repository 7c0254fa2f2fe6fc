use crate::credentials::{Credentials, Key};
use crate::crypto;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::mac::{self, Mac, MacInput, MacType};
use crate::payload::PayloadHasher;
use crate::request::Request;
use crate::DigestAlgorithm;
use log::debug;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// The credential lookup collaborator, supplied by the embedding
/// application.
pub trait CredentialsStore: Send + Sync {
    /// Look up the credentials for an id.  `Ok(None)` means the id is
    /// unknown or disabled.  A failure of the store itself is reported as
    /// an `Err` — conventionally [`Error::CollaboratorUnavailable`] — and
    /// is never conflated with an authentication failure.
    fn lookup(&self, id: &str) -> Result<Option<Credentials>>;
}

/// The anti-replay collaborator: remembers `(id, nonce)` pairs for the
/// duration of the freshness window.
pub trait NonceStore: Send + Sync {
    /// Record `(id, nonce)` unless it is already present, returning
    /// whether it was inserted.  The check-and-insert must be atomic with
    /// respect to concurrent calls for the same pair; two racing
    /// authentications of one replayed nonce must not both see `true`.
    fn insert_if_absent(
        &self,
        id: &str,
        nonce: &str,
        ts: SystemTime,
        ttl: Duration,
    ) -> Result<bool>;
}

/// A `HashMap`-backed credentials store, for tests and single-process
/// embeddings.  Larger deployments implement [`CredentialsStore`] over
/// their own storage.
#[derive(Default)]
pub struct MemoryCredentialsStore {
    entries: HashMap<String, (Vec<u8>, DigestAlgorithm)>,
}

impl MemoryCredentialsStore {
    pub fn new() -> Self {
        MemoryCredentialsStore::default()
    }

    pub fn insert<I, K>(&mut self, id: I, key: K, algorithm: DigestAlgorithm)
    where
        I: Into<String>,
        K: AsRef<[u8]>,
    {
        self.entries
            .insert(id.into(), (key.as_ref().to_vec(), algorithm));
    }
}

impl CredentialsStore for MemoryCredentialsStore {
    fn lookup(&self, id: &str) -> Result<Option<Credentials>> {
        match self.entries.get(id) {
            Some((key, algorithm)) => Ok(Some(Credentials {
                id: id.to_string(),
                key: Key::new(key, *algorithm)?,
            })),
            None => Ok(None),
        }
    }
}

/// An in-process [`NonceStore`].  Expired records are evicted lazily on
/// insert; the check-and-insert runs under a single lock acquisition.
pub struct MemoryNonceStore {
    // maps (id, nonce) to the record's expiry time
    seen: Mutex<HashMap<(String, String), SystemTime>>,
}

impl MemoryNonceStore {
    pub fn new() -> Self {
        MemoryNonceStore {
            seen: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryNonceStore {
    fn default() -> Self {
        MemoryNonceStore::new()
    }
}

impl NonceStore for MemoryNonceStore {
    fn insert_if_absent(
        &self,
        id: &str,
        nonce: &str,
        _ts: SystemTime,
        ttl: Duration,
    ) -> Result<bool> {
        let now = SystemTime::now();
        let mut seen = self
            .seen
            .lock()
            .map_err(|_| Error::CollaboratorUnavailable("nonce store lock poisoned".to_string()))?;
        seen.retain(|_, expiry| *expiry > now);
        let key = (id.to_string(), nonce.to_string());
        if seen.contains_key(&key) {
            return Ok(false);
        }
        seen.insert(key, now + ttl);
        Ok(true)
    }
}

/// Server-side authentication options.
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Allowed clock skew between client and server, in either direction.
    /// A request whose timestamp is exactly this far from the server's
    /// clock still passes.
    pub ts_skew: Duration,

    /// Require every request to carry a payload hash (and supply the
    /// payload so it can be verified).
    pub require_hash: bool,
}

impl Default for AuthOptions {
    fn default() -> Self {
        AuthOptions {
            ts_skew: Duration::from_secs(60),
            require_hash: false,
        }
    }
}

/// A request body and its `Content-Type` as actually received, for
/// payload-hash verification.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    pub content_type: &'a str,
    pub body: &'a [u8],
}

/// The full set of values proven valid by [`authenticate`]: the server's
/// own view of the request coordinates plus the header attributes covered
/// by the verified MAC.  Feed them to
/// [`ResponseBuilder::from_artifacts`](crate::ResponseBuilder::from_artifacts)
/// to sign the response.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub method: String,
    pub host: String,
    pub port: u16,
    pub resource: String,
    pub ts: SystemTime,
    pub nonce: String,
    pub mac: Mac,
    pub hash: Option<Vec<u8>>,
    pub ext: Option<String>,
    pub app: Option<String>,
    pub dlg: Option<String>,
}

/// Authenticate a request.
///
/// `request` is the server's *own* view of the method, host, port, and
/// resource — never values taken from the header, which is exactly what an
/// attacker controls.  Only `ts`, `nonce`, `ext`, `hash`, `app`, and `dlg`
/// are read from the parsed `Authorization` header.
///
/// The checks run in a fixed order with no backtracking: required
/// attributes, credential lookup, MAC verification, freshness, replay,
/// payload hash.  Any failure is terminal for the request.  The error
/// kind identifies the failed check for the caller's logs; on the wire
/// every kind for which [`Error::is_unauthorized`] is true must collapse
/// to the same 401 response.
///
/// The only state this touches is the nonce store insert, which the store
/// guarantees atomic.  Nothing here retries; a stale-timestamp failure
/// carries the server's clock so a well-behaved client can retry on its
/// own with a corrected offset.
pub fn authenticate(
    request: &Request,
    header: &Header,
    payload: Option<Payload>,
    credentials_store: &dyn CredentialsStore,
    nonce_store: &dyn NonceStore,
    options: &AuthOptions,
) -> Result<(Credentials, Artifacts)> {
    authenticate_at(
        SystemTime::now(),
        request,
        header,
        payload,
        credentials_store,
        nonce_store,
        options,
    )
}

fn authenticate_at(
    now: SystemTime,
    request: &Request,
    header: &Header,
    payload: Option<Payload>,
    credentials_store: &dyn CredentialsStore,
    nonce_store: &dyn NonceStore,
    options: &AuthOptions,
) -> Result<(Credentials, Artifacts)> {
    let id = header.id.as_ref().ok_or(Error::MissingAttribute("id"))?;
    let ts = header.ts.ok_or(Error::MissingAttribute("ts"))?;
    let nonce = header.nonce.as_ref().ok_or(Error::MissingAttribute("nonce"))?;
    let header_mac = header.mac.as_ref().ok_or(Error::MissingAttribute("mac"))?;

    let credentials = credentials_store.lookup(id)?.ok_or_else(|| {
        debug!("authentication failed: unknown credentials id {:?}", id);
        Error::CredentialsNotFound
    })?;

    let mac = Mac::new(
        MacType::Header,
        &credentials.key,
        &MacInput {
            ts,
            nonce,
            method: request.method,
            host: request.host,
            port: request.port,
            resource: request.resource,
            hash: header.hash.as_ref().map(|h| &h[..]),
            ext: header.ext.as_ref().map(|e| &e[..]),
            app: header.app.as_ref().map(|a| &a[..]),
            dlg: header.dlg.as_ref().map(|d| &d[..]),
        },
    )?;
    if &mac != header_mac {
        debug!("authentication failed: MAC mismatch for id {:?}", id);
        return Err(Error::BadMac);
    }

    let now_secs = mac::unix_secs(now)?;
    let ts_secs = mac::unix_secs(ts)?;
    let delta = if now_secs >= ts_secs {
        now_secs - ts_secs
    } else {
        ts_secs - now_secs
    };
    if delta > options.ts_skew.as_secs() {
        debug!("authentication failed: stale timestamp for id {:?}", id);
        return Err(Error::StaleTimestamp(now_secs));
    }

    // A nonce only needs to be remembered while its timestamp could still
    // pass the freshness check.
    let ttl = options.ts_skew * 2;
    if !nonce_store.insert_if_absent(id, nonce, ts, ttl)? {
        debug!("authentication failed: replayed nonce for id {:?}", id);
        return Err(Error::ReplayDetected);
    }

    if options.require_hash && header.hash.is_none() {
        return Err(Error::MissingAttribute("hash"));
    }
    if let Some(ref expected) = header.hash {
        match payload {
            Some(payload) => {
                let computed = PayloadHasher::hash(
                    payload.content_type,
                    credentials.key.algorithm(),
                    payload.body,
                )?;
                if !constant_time_eq(&computed, expected) {
                    debug!("authentication failed: payload hash mismatch for id {:?}", id);
                    return Err(Error::PayloadTampered);
                }
            }
            None if options.require_hash => return Err(Error::MissingPayload),
            // The caller did not supply the body, so it has opted out of
            // payload verification for this request.
            None => {}
        }
    }

    let artifacts = Artifacts {
        method: request.method.to_string(),
        host: request.host.to_string(),
        port: request.port,
        resource: request.resource.to_string(),
        ts,
        nonce: nonce.clone(),
        mac: header_mac.clone(),
        hash: header.hash.clone(),
        ext: header.ext.clone(),
        app: header.app.clone(),
        dlg: header.dlg.clone(),
    };
    Ok((credentials, artifacts))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && crypto::cryptographer().constant_time_compare(a, b)
}

#[cfg(all(test, any(feature = "use_ring", feature = "use_openssl")))]
mod tests {
    use super::*;
    use crate::request::RequestBuilder;
    use crate::{RequestState, SHA256};
    use std::time::{Duration, UNIX_EPOCH};

    const ID: &str = "dh37fgj492je";
    const KEY: &str = "werxhqb98rpaxn39848xrunpaw3489ruxnpa98w4rxn";

    fn now() -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1353832234)
    }

    fn stores() -> (MemoryCredentialsStore, MemoryNonceStore) {
        let mut creds = MemoryCredentialsStore::new();
        creds.insert(ID, KEY, SHA256);
        (creds, MemoryNonceStore::new())
    }

    fn client_credentials() -> Credentials {
        Credentials {
            id: ID.to_string(),
            key: Key::new(KEY, SHA256).unwrap(),
        }
    }

    fn state_at(secs_before_now: u64) -> RequestState {
        RequestState {
            ts: now() - Duration::from_secs(secs_before_now),
            nonce: "j4h3g2".to_string(),
        }
    }

    fn request() -> Request<'static> {
        RequestBuilder::new("GET", "127.0.0.1", 8002, "/resource/1?b=1&a=2")
            .ext("and welcome!")
            .request()
    }

    fn auth(
        header: &Header,
        payload: Option<Payload>,
        options: &AuthOptions,
        nonces: &MemoryNonceStore,
    ) -> Result<(Credentials, Artifacts)> {
        let (creds, _) = stores();
        authenticate_at(now(), &request(), header, payload, &creds, nonces, options)
    }

    #[test]
    fn round_trip() {
        let header = request()
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        let (creds, artifacts) =
            auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()).unwrap();
        assert_eq!(creds.id, ID);
        assert_eq!(artifacts.method, "GET");
        assert_eq!(artifacts.resource, "/resource/1?b=1&a=2");
        assert_eq!(artifacts.nonce, "j4h3g2");
        assert_eq!(artifacts.ext.as_ref().map(|s| &s[..]), Some("and welcome!"));
    }

    #[test]
    fn missing_required_attribute() {
        let mut header = request()
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        header.nonce = None;
        match auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()) {
            Err(Error::MissingAttribute("nonce")) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unknown_id() {
        let unknown = Credentials {
            id: "someone-else".to_string(),
            key: Key::new(KEY, SHA256).unwrap(),
        };
        let header = request().make_header_full(&unknown, &state_at(0)).unwrap();
        match auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()) {
            Err(Error::CredentialsNotFound) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn tampered_mac() {
        let mut header = request()
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        let mut mac_bytes = header.mac.as_ref().unwrap().as_ref().to_vec();
        mac_bytes[0] ^= 0x01;
        header.mac = Some(Mac::from(mac_bytes));
        match auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()) {
            Err(Error::BadMac) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn server_view_wins_over_header() {
        // A MAC computed for one resource does not validate a request for
        // another, even though the header parses cleanly.
        let other = RequestBuilder::new("GET", "127.0.0.1", 8002, "/other").request();
        let header = other
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        match auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()) {
            Err(Error::BadMac) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn freshness_boundary() {
        // exactly at the skew boundary: pass
        let header = request()
            .make_header_full(&client_credentials(), &state_at(60))
            .unwrap();
        assert!(auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()).is_ok());

        // one second past it: fail, reporting the server's clock
        let header = request()
            .make_header_full(&client_credentials(), &state_at(61))
            .unwrap();
        match auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()) {
            Err(Error::StaleTimestamp(server_time)) => {
                assert_eq!(server_time, 1353832234);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn future_timestamp_is_stale_too() {
        let state = RequestState {
            ts: now() + Duration::from_secs(120),
            nonce: "j4h3g2".to_string(),
        };
        let header = request()
            .make_header_full(&client_credentials(), &state)
            .unwrap();
        match auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()) {
            Err(Error::StaleTimestamp(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn replayed_header_rejected() {
        let nonces = MemoryNonceStore::new();
        let header = request()
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        assert!(auth(&header, None, &AuthOptions::default(), &nonces).is_ok());
        match auth(&header, None, &AuthOptions::default(), &nonces) {
            Err(Error::ReplayDetected) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn nonces_tracked_per_id() {
        let nonces = MemoryNonceStore::new();
        assert!(nonces
            .insert_if_absent("a", "n1", now(), Duration::from_secs(120))
            .unwrap());
        assert!(nonces
            .insert_if_absent("b", "n1", now(), Duration::from_secs(120))
            .unwrap());
        assert!(!nonces
            .insert_if_absent("a", "n1", now(), Duration::from_secs(120))
            .unwrap());
    }

    #[test]
    fn nonce_records_expire() {
        let nonces = MemoryNonceStore::new();
        assert!(nonces
            .insert_if_absent("a", "n1", now(), Duration::from_secs(0))
            .unwrap());
        // a zero ttl record is already expired by the next insert
        assert!(nonces
            .insert_if_absent("a", "n1", now(), Duration::from_secs(0))
            .unwrap());
    }

    #[test]
    fn payload_verified() {
        let body = b"foo=bar";
        let hash = PayloadHasher::hash("text/plain", SHA256, &body[..]).unwrap();
        let signed = RequestBuilder::new("GET", "127.0.0.1", 8002, "/resource/1?b=1&a=2")
            .ext("and welcome!")
            .hash(&hash[..])
            .request();
        let header = signed
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();

        let payload = Payload {
            content_type: "text/plain",
            body,
        };
        let (_, artifacts) = auth(
            &header,
            Some(payload),
            &AuthOptions::default(),
            &MemoryNonceStore::new(),
        )
        .unwrap();
        assert_eq!(artifacts.hash.unwrap(), hash);
    }

    #[test]
    fn tampered_payload_rejected() {
        let hash = PayloadHasher::hash("text/plain", SHA256, "foo=bar").unwrap();
        let signed = RequestBuilder::new("GET", "127.0.0.1", 8002, "/resource/1?b=1&a=2")
            .ext("and welcome!")
            .hash(&hash[..])
            .request();
        let header = signed
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();

        let payload = Payload {
            content_type: "text/plain",
            body: b"foo=baz",
        };
        match auth(
            &header,
            Some(payload),
            &AuthOptions::default(),
            &MemoryNonceStore::new(),
        ) {
            Err(Error::PayloadTampered) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn require_hash_without_hash() {
        let header = request()
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        let options = AuthOptions {
            require_hash: true,
            ..AuthOptions::default()
        };
        match auth(&header, None, &options, &MemoryNonceStore::new()) {
            Err(Error::MissingAttribute("hash")) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn declared_hash_skipped_without_payload() {
        // Without require_hash, a declared hash is only verified when the
        // caller supplies the body.
        let hash = PayloadHasher::hash("text/plain", SHA256, "foo=bar").unwrap();
        let signed = RequestBuilder::new("GET", "127.0.0.1", 8002, "/resource/1?b=1&a=2")
            .ext("and welcome!")
            .hash(&hash[..])
            .request();
        let header = signed
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        assert!(auth(&header, None, &AuthOptions::default(), &MemoryNonceStore::new()).is_ok());
    }

    #[test]
    fn collaborator_failure_is_not_unauthorized() {
        struct DownStore;
        impl CredentialsStore for DownStore {
            fn lookup(&self, _id: &str) -> Result<Option<Credentials>> {
                Err(Error::CollaboratorUnavailable("connection refused".to_string()))
            }
        }

        let header = request()
            .make_header_full(&client_credentials(), &state_at(0))
            .unwrap();
        let result = authenticate_at(
            now(),
            &request(),
            &header,
            None,
            &DownStore,
            &MemoryNonceStore::new(),
            &AuthOptions::default(),
        );
        match result {
            Err(ref e @ Error::CollaboratorUnavailable(_)) => {
                assert!(!e.is_unauthorized());
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn auth_failures_map_to_401() {
        for err in &[
            Error::MissingAttribute("id"),
            Error::CredentialsNotFound,
            Error::BadMac,
            Error::StaleTimestamp(1353832234),
            Error::ReplayDetected,
            Error::PayloadTampered,
        ] {
            assert!(err.is_unauthorized(), "{:?} should be unauthorized", err);
        }
        assert!(!Error::MissingPayload.is_unauthorized());
        assert!(!Error::InvalidCredentials.is_unauthorized());
    }
}
