use crate::credentials::Credentials;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::mac::{Mac, MacInput, MacType};
use crate::response::ResponseBuilder;
use crate::RequestState;
use url::{Position, Url};

/// A request as the protocol sees it: method, host, port, and the resource
/// (path plus query) exactly as it appears on the wire.
///
/// On the client this is the request about to be sent; on the server it is
/// the server's *own* view of the request under authentication — never
/// values copied out of the `Authorization` header.
///
/// Requests are built with [`RequestBuilder`].  Most applications hold
/// several of the fields fixed; cloning a partially-built builder is a
/// convenient way to avoid repeating them.
#[derive(Debug, Clone)]
pub struct Request<'a> {
    pub(crate) method: &'a str,
    pub(crate) host: &'a str,
    pub(crate) port: u16,
    pub(crate) resource: &'a str,
    pub(crate) hash: Option<&'a [u8]>,
    pub(crate) ext: Option<&'a str>,
    pub(crate) app: Option<&'a str>,
    pub(crate) dlg: Option<&'a str>,
}

impl<'a> Request<'a> {
    /// Create an `Authorization` header for this request, generating a
    /// fresh timestamp and nonce.  The returned [`RequestState`] is needed
    /// later to validate the server's mutual-authentication response;
    /// discard it if you do not intend to.
    pub fn make_header(&self, credentials: &Credentials) -> Result<(Header, RequestState)> {
        let state = RequestState::new()?;
        let header = self.make_header_full(credentials, &state)?;
        Ok((header, state))
    }

    /// As [`make_header`](Request::make_header), but with a caller-supplied
    /// timestamp and nonce.
    pub fn make_header_full(
        &self,
        credentials: &Credentials,
        state: &RequestState,
    ) -> Result<Header> {
        if credentials.id.is_empty() {
            return Err(Error::InvalidCredentials);
        }
        let mac = Mac::new(
            MacType::Header,
            &credentials.key,
            &MacInput {
                ts: state.ts,
                nonce: &state.nonce,
                method: self.method,
                host: self.host,
                port: self.port,
                resource: self.resource,
                hash: self.hash,
                ext: self.ext,
                app: self.app,
                dlg: self.dlg,
            },
        )?;
        Header::new(
            Some(credentials.id.clone()),
            Some(state.ts),
            Some(state.nonce.clone()),
            Some(mac),
            self.ext.map(str::to_string),
            self.hash.map(|h| h.to_vec()),
            self.app.map(str::to_string),
            self.dlg.map(str::to_string),
        )
    }

    /// Begin building the [`Response`](crate::Response) that will verify
    /// this request's `Server-Authorization` header.  The response context
    /// reuses this request's coordinates, `app` and `dlg`, and the given
    /// state's timestamp and nonce.
    pub fn make_response_builder<'b>(&'b self, state: &'b RequestState) -> ResponseBuilder<'b> {
        ResponseBuilder::from_request_state(state, self.method, self.host, self.port, self.resource)
            .app(self.app)
            .dlg(self.dlg)
    }
}

#[derive(Debug, Clone)]
pub struct RequestBuilder<'a>(Request<'a>);

impl<'a> RequestBuilder<'a> {
    /// Create a new builder from the method, host, port, and resource.
    /// The resource is the path and query exactly as sent on the wire.
    pub fn new(method: &'a str, host: &'a str, port: u16, resource: &'a str) -> Self {
        RequestBuilder(Request {
            method,
            host,
            port,
            resource,
            hash: None,
            ext: None,
            app: None,
            dlg: None,
        })
    }

    /// Create a new builder, taking host, port, and resource from a URL.
    /// The query string is part of the resource; any fragment is not.
    pub fn from_url(method: &'a str, url: &'a Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::InvalidUrl(format!("url {} has no host", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::InvalidUrl(format!("url {} has no port", url)))?;
        let resource = &url[Position::BeforePath..Position::AfterQuery];
        Ok(RequestBuilder(Request {
            method,
            host,
            port,
            resource,
            hash: None,
            ext: None,
            app: None,
            dlg: None,
        }))
    }

    /// Set the payload hash for the request.  Compute it with
    /// [`PayloadHasher`](crate::PayloadHasher) over the body about to be
    /// sent.
    pub fn hash<H: Into<Option<&'a [u8]>>>(mut self, hash: H) -> Self {
        self.0.hash = hash.into();
        self
    }

    /// Set the `ext` application data for the request.
    pub fn ext<S: Into<Option<&'a str>>>(mut self, ext: S) -> Self {
        self.0.ext = ext.into();
        self
    }

    /// Set the `app` id for third-party delegated authentication.
    pub fn app<S: Into<Option<&'a str>>>(mut self, app: S) -> Self {
        self.0.app = app.into();
        self
    }

    /// Set the `dlg` (delegated-by) id; only meaningful together with
    /// `app`.
    pub fn dlg<S: Into<Option<&'a str>>>(mut self, dlg: S) -> Self {
        self.0.dlg = dlg.into();
        self
    }

    /// Get the request from this builder.
    pub fn request(self) -> Request<'a> {
        self.0
    }
}


#[cfg(all(test, any(feature = "use_ring", feature = "use_openssl")))]
mod header_tests {
    use super::*;
    use crate::credentials::Key;
    use crate::mac::Mac;
    use crate::SHA256;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, UNIX_EPOCH};

    fn credentials() -> Credentials {
        Credentials {
            id: "me".to_string(),
            key: Key::new(vec![99u8; 32], SHA256).unwrap(),
        }
    }

    fn state() -> RequestState {
        RequestState {
            ts: UNIX_EPOCH + Duration::from_secs(1000),
            nonce: "nonny".to_string(),
        }
    }

    #[test]
    fn make_header_full() {
        let req = RequestBuilder::new("GET", "example.com", 443, "/foo").request();
        let header = req.make_header_full(&credentials(), &state()).unwrap();
        assert_eq!(header.id.as_deref(), Some("me"));
        assert_eq!(header.nonce.as_deref(), Some("nonny"));
        assert_eq!(
            header.mac.unwrap(),
            Mac::from(vec![
                122, 47, 2, 53, 195, 247, 185, 107, 133, 250, 61, 134, 200, 35, 118, 94, 48, 175,
                237, 108, 60, 71, 4, 2, 244, 66, 41, 172, 91, 7, 233, 140
            ])
        );
        assert_eq!(header.ext, None);
        assert_eq!(header.hash, None);
    }

    #[test]
    fn make_header_full_with_optional_fields() {
        let hash = vec![0u8];
        let req = RequestBuilder::new("GET", "example.com", 443, "/foo")
            .hash(&hash[..])
            .ext("ext")
            .app("app")
            .dlg("dlg")
            .request();
        let header = req.make_header_full(&credentials(), &state()).unwrap();
        assert_eq!(
            header.mac.unwrap(),
            Mac::from(vec![
                93, 12, 77, 2, 71, 247, 66, 197, 252, 184, 121, 57, 90, 176, 150, 87, 9, 129, 224,
                108, 48, 84, 89, 168, 94, 18, 150, 156, 145, 142, 108, 165
            ])
        );
        assert_eq!(header.hash.unwrap(), hash);
        assert_eq!(header.app.as_deref(), Some("app"));
        assert_eq!(header.dlg.as_deref(), Some("dlg"));
    }

    #[test]
    fn make_header_empty_id_rejected() {
        let creds = Credentials {
            id: String::new(),
            key: Key::new("xxx", SHA256).unwrap(),
        };
        let req = RequestBuilder::new("GET", "example.com", 443, "/foo").request();
        match req.make_header_full(&creds, &state()) {
            Err(Error::InvalidCredentials) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn generated_state_varies() {
        let req = RequestBuilder::new("GET", "example.com", 443, "/foo").request();
        let (h1, s1) = req.make_header(&credentials()).unwrap();
        let (h2, s2) = req.make_header(&credentials()).unwrap();
        assert_ne!(s1.nonce, s2.nonce);
        assert_ne!(h1.mac.unwrap(), h2.mac.unwrap());
    }
}
