use crate::credentials::Key;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::mac::{Mac, MacInput, MacType};
use crate::server::Artifacts;
use crate::RequestState;
use std::time::SystemTime;

/// A response to an authenticated request.
///
/// The same structure serves both sides of the mutual-authentication
/// exchange: the server uses it to *create* a `Server-Authorization`
/// header ([`make_header`](Response::make_header)), and the client uses it
/// to *validate* the header it received
/// ([`validate_header`](Response::validate_header)).  Both reuse the
/// timestamp and nonce that went into the request MAC, so a response
/// header only ever proves the response to the one request it answers.
///
/// Responses are built with [`ResponseBuilder`]: on the server from the
/// [`Artifacts`] the authenticator proved valid, on the client from the
/// [`RequestState`] kept when the request was signed.
#[derive(Debug, Clone)]
pub struct Response<'a> {
    method: &'a str,
    host: &'a str,
    port: u16,
    resource: &'a str,
    ts: SystemTime,
    nonce: &'a str,
    hash: Option<Vec<u8>>,
    ext: Option<&'a str>,
    app: Option<&'a str>,
    dlg: Option<&'a str>,
}

impl<'a> Response<'a> {
    fn mac_input<'b>(&'b self, hash: Option<&'b [u8]>, ext: Option<&'b str>) -> MacInput<'b> {
        MacInput {
            ts: self.ts,
            nonce: self.nonce,
            method: self.method,
            host: self.host,
            port: self.port,
            resource: self.resource,
            hash,
            ext,
            app: self.app,
            dlg: self.dlg,
        }
    }

    /// Create a `Server-Authorization` header for this response.
    ///
    /// Only `mac`, `hash`, and `ext` appear in the header; everything else
    /// the MAC covers is implied by the request being answered.
    pub fn make_header(&self, key: &Key) -> Result<Header> {
        let mac = Mac::new(
            MacType::Response,
            key,
            &self.mac_input(self.hash.as_ref().map(|h| &h[..]), self.ext),
        )?;
        Header::new(
            None,
            None,
            None,
            Some(mac),
            self.ext.map(str::to_string),
            self.hash.clone(),
            None,
            None,
        )
    }

    /// Validate a `Server-Authorization` header against this response.
    ///
    /// The MAC is recomputed over the hash and ext the header declares
    /// (those are what the server signed) and compared in constant time.
    /// If a hash was set on this response — computed over the body as
    /// actually received — the header must declare one and it must match;
    /// a declared hash with no local one is ignored, as the caller chose
    /// not to verify the payload.
    ///
    /// Failure means mutual trust could not be established; it says
    /// nothing about whether the underlying request succeeded.
    pub fn validate_header(&self, header: &Header, key: &Key) -> Result<()> {
        let header_mac = header
            .mac
            .as_ref()
            .ok_or(Error::MissingAttribute("mac"))?;
        let header_hash = header.hash.as_ref().map(|h| &h[..]);
        let header_ext = header.ext.as_ref().map(|e| &e[..]);

        let mac = Mac::new(MacType::Response, key, &self.mac_input(header_hash, header_ext))?;
        if &mac != header_mac {
            return Err(Error::ServerAuthInvalid);
        }

        if let Some(ref local_hash) = self.hash {
            match header.hash {
                Some(ref declared) if declared == local_hash => {}
                _ => return Err(Error::ServerAuthInvalid),
            }
        }

        // The timestamp and nonce were generated locally for the request,
        // so there is no freshness to re-check here.

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ResponseBuilder<'a>(Response<'a>);

impl<'a> ResponseBuilder<'a> {
    /// Generate a new builder from the state kept when the request was
    /// signed, plus the client's view of the request coordinates.
    ///
    /// This is more commonly reached through
    /// [`Request::make_response_builder`](crate::Request::make_response_builder),
    /// which also carries over the request's `app` and `dlg`.
    pub fn from_request_state(
        state: &'a RequestState,
        method: &'a str,
        host: &'a str,
        port: u16,
        resource: &'a str,
    ) -> Self {
        ResponseBuilder(Response {
            method,
            host,
            port,
            resource,
            ts: state.ts,
            nonce: &state.nonce,
            hash: None,
            ext: None,
            app: None,
            dlg: None,
        })
    }

    /// Generate a new builder from the artifacts a successful
    /// [`authenticate`](crate::authenticate) call returned.  This is the
    /// server-side entry point.
    pub fn from_artifacts(artifacts: &'a Artifacts) -> Self {
        ResponseBuilder(Response {
            method: &artifacts.method,
            host: &artifacts.host,
            port: artifacts.port,
            resource: &artifacts.resource,
            ts: artifacts.ts,
            nonce: &artifacts.nonce,
            hash: None,
            ext: None,
            app: artifacts.app.as_ref().map(|s| &s[..]),
            dlg: artifacts.dlg.as_ref().map(|s| &s[..]),
        })
    }

    /// Set the payload hash for the response.
    ///
    /// On the server, compute this over the response body about to be
    /// sent; on the client, over the body as actually received.  Never
    /// copy it out of a header.
    pub fn hash<H: Into<Option<Vec<u8>>>>(mut self, hash: H) -> Self {
        self.0.hash = hash.into();
        self
    }

    /// Set the `ext` application data for the response.  Only meaningful
    /// on the server; validation takes the value from the received header.
    pub fn ext<S: Into<Option<&'a str>>>(mut self, ext: S) -> Self {
        self.0.ext = ext.into();
        self
    }

    /// Set the `app` id carried over from the request.
    pub fn app<S: Into<Option<&'a str>>>(mut self, app: S) -> Self {
        self.0.app = app.into();
        self
    }

    /// Set the `dlg` id carried over from the request.
    pub fn dlg<S: Into<Option<&'a str>>>(mut self, dlg: S) -> Self {
        self.0.dlg = dlg.into();
        self
    }

    /// Get the response from this builder.
    pub fn response(self) -> Response<'a> {
        self.0
    }
}
