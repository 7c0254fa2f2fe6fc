use crate::credentials::Key;
use crate::crypto;
use crate::error::{Error, Result};
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// The two kinds of MAC the scheme computes: one over a request
/// (`Authorization`) and one over a response (`Server-Authorization`).
/// The kind is folded into the signed bytes, so a request MAC can never
/// be replayed as a response MAC or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacType {
    Header,
    Response,
}

impl MacType {
    fn tag(self) -> &'static str {
        match self {
            MacType::Header => "header",
            MacType::Response => "response",
        }
    }
}

/// The full set of fields a MAC is computed over.  Signer and verifier
/// must supply byte-identical values; in particular `resource` is the
/// path and query exactly as they appear on the wire, with no
/// re-normalization of percent-encoding.
#[derive(Debug, Clone)]
pub struct MacInput<'a> {
    pub ts: SystemTime,
    pub nonce: &'a str,
    pub method: &'a str,
    pub host: &'a str,
    pub port: u16,
    pub resource: &'a str,
    pub hash: Option<&'a [u8]>,
    pub ext: Option<&'a str>,
    pub app: Option<&'a str>,
    pub dlg: Option<&'a str>,
}

pub(crate) fn unix_secs(ts: SystemTime) -> Result<u64> {
    ts.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| Error::InvalidTimestamp)
}

// `ext` is escaped in the signed bytes exactly as the reference
// implementation escapes it; everything else is written verbatim.
fn escape_ext(ext: &str) -> String {
    ext.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Build the canonical byte string for a request or response.
///
/// This is a pure function of its inputs.  Fields are newline-terminated,
/// in fixed order; an absent hash or ext is written as an empty line so
/// that field positions never shift.  The `app` and `dlg` lines are
/// appended only when `app` is present, matching the reference scheme.
pub fn canonicalize(mac_type: MacType, input: &MacInput) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = vec![];

    writeln!(buf, "hawk.1.{}", mac_type.tag())?;
    writeln!(buf, "{}", unix_secs(input.ts)?)?;
    writeln!(buf, "{}", input.nonce)?;
    writeln!(buf, "{}", input.method.to_uppercase())?;
    writeln!(buf, "{}", input.resource)?;
    writeln!(buf, "{}", input.host.to_lowercase())?;
    writeln!(buf, "{}", input.port)?;

    match input.hash {
        Some(h) => writeln!(buf, "{}", base64::encode(h))?,
        None => writeln!(buf)?,
    }
    match input.ext {
        Some(e) => writeln!(buf, "{}", escape_ext(e))?,
        None => writeln!(buf)?,
    }
    if let Some(app) = input.app {
        writeln!(buf, "{}", app)?;
        writeln!(buf, "{}", input.dlg.unwrap_or(""))?;
    }

    Ok(buf)
}

/// A computed MAC.
///
/// Equality between `Mac`s compares digest content in constant time (after
/// an early length check), so a parsed header MAC can be compared directly
/// against a freshly computed one.
#[derive(Debug, Clone)]
pub struct Mac(Vec<u8>);

impl Mac {
    pub fn new(mac_type: MacType, key: &Key, input: &MacInput) -> Result<Mac> {
        Ok(Mac(key.sign(&canonicalize(mac_type, input)?)?))
    }
}

impl From<Vec<u8>> for Mac {
    fn from(original: Vec<u8>) -> Self {
        Mac(original)
    }
}

impl AsRef<[u8]> for Mac {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for Mac {
    fn eq(&self, other: &Mac) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        crypto::cryptographer().constant_time_compare(&self.0, &other.0)
    }
}
