use crate::error::{Error, Result};
use crate::mac::Mac;
use crate::SCHEME;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Representation of a Hawk `Authorization` or `Server-Authorization`
/// field value, without the scheme prefix.
///
/// All fields are optional at this level: a request header carries `id`,
/// `ts`, `nonce` and `mac` (the server authenticator enforces their
/// presence), while a response header carries only `mac` and optionally
/// `hash` and `ext`.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub id: Option<String>,
    pub ts: Option<SystemTime>,
    pub nonce: Option<String>,
    pub mac: Option<Mac>,
    pub ext: Option<String>,
    pub hash: Option<Vec<u8>>,
    pub app: Option<String>,
    pub dlg: Option<String>,
}

impl Header {
    /// Create a new Header, validating the string components.
    ///
    /// The scheme does not support escaping in attribute values, so no
    /// component may contain a double quote or a control character.
    pub fn new<S: Into<String>>(
        id: Option<S>,
        ts: Option<SystemTime>,
        nonce: Option<S>,
        mac: Option<Mac>,
        ext: Option<S>,
        hash: Option<Vec<u8>>,
        app: Option<S>,
        dlg: Option<S>,
    ) -> Result<Header> {
        Ok(Header {
            id: Header::check_component(id)?,
            ts,
            nonce: Header::check_component(nonce)?,
            mac,
            ext: Header::check_component(ext)?,
            hash,
            app: Header::check_component(app)?,
            dlg: Header::check_component(dlg)?,
        })
    }

    /// Parse a complete header value, scheme prefix included
    /// (`Hawk id="…", …`).  The scheme name is matched case-insensitively;
    /// any other scheme is rejected.
    pub fn from_authorization(value: &str) -> Result<Header> {
        let v = value.trim_start();
        let matches_scheme = v.len() >= SCHEME.len()
            && v.as_bytes()[..SCHEME.len()].eq_ignore_ascii_case(SCHEME.as_bytes());
        if !matches_scheme {
            return Err(Error::HeaderParseError(
                "unsupported authorization scheme".to_string(),
            ));
        }
        let rest = &v[SCHEME.len()..];
        if !rest.is_empty() && !rest.starts_with(' ') {
            return Err(Error::HeaderParseError(
                "unsupported authorization scheme".to_string(),
            ));
        }
        rest.trim_start().parse()
    }

    fn check_component<S: Into<String>>(value: Option<S>) -> Result<Option<String>> {
        match value {
            Some(value) => {
                let value = value.into();
                if value.chars().any(|c| c == '"' || c.is_control()) {
                    return Err(Error::HeaderParseError(
                        "header attribute contains an illegal character".to_string(),
                    ));
                }
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut sep = "";
        if let Some(ref id) = self.id {
            write!(f, "{}id=\"{}\"", sep, id)?;
            sep = ", ";
        }
        if let Some(ts) = self.ts {
            let since_epoch = ts.duration_since(UNIX_EPOCH).map_err(|_| fmt::Error)?;
            write!(f, "{}ts=\"{}\"", sep, since_epoch.as_secs())?;
            sep = ", ";
        }
        if let Some(ref nonce) = self.nonce {
            write!(f, "{}nonce=\"{}\"", sep, nonce)?;
            sep = ", ";
        }
        if let Some(ref mac) = self.mac {
            write!(f, "{}mac=\"{}\"", sep, base64::encode(mac.as_ref()))?;
            sep = ", ";
        }
        if let Some(ref ext) = self.ext {
            write!(f, "{}ext=\"{}\"", sep, ext)?;
            sep = ", ";
        }
        if let Some(ref hash) = self.hash {
            write!(f, "{}hash=\"{}\"", sep, base64::encode(hash))?;
            sep = ", ";
        }
        if let Some(ref app) = self.app {
            write!(f, "{}app=\"{}\"", sep, app)?;
            sep = ", ";
        }
        if let Some(ref dlg) = self.dlg {
            write!(f, "{}dlg=\"{}\"", sep, dlg)?;
        }
        Ok(())
    }
}

impl FromStr for Header {
    type Err = Error;
    fn from_str(s: &str) -> Result<Header> {
        let mut id = None;
        let mut ts = None;
        let mut nonce = None;
        let mut mac = None;
        let mut ext = None;
        let mut hash = None;
        let mut app = None;
        let mut dlg = None;

        let mut p = s;
        while !p.is_empty() {
            // commas and whitespace separate attributes
            p = p.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
            if p.is_empty() {
                break;
            }
            let eq = p
                .find('=')
                .ok_or_else(|| Error::HeaderParseError(s.to_string()))?;
            let attr = p[..eq].trim();
            p = p[eq + 1..].trim_start();
            if !p.starts_with('"') {
                return Err(Error::HeaderParseError(s.to_string()));
            }
            p = &p[1..];
            // The scheme forbids `"` and `\` inside values, so there is no
            // escaping to undo: the value runs to the next quote.
            let end = p
                .find('"')
                .ok_or_else(|| Error::HeaderParseError(s.to_string()))?;
            let val = &p[..end];
            match attr {
                "id" => id = Some(val.to_string()),
                "ts" => ts = Some(parse_ts(val)?),
                "nonce" => nonce = Some(val.to_string()),
                "mac" => mac = Some(Mac::from(base64::decode(val)?)),
                "hash" => hash = Some(base64::decode(val)?),
                "ext" => ext = Some(val.to_string()),
                "app" => app = Some(val.to_string()),
                "dlg" => dlg = Some(val.to_string()),
                _ => {
                    return Err(Error::HeaderParseError(format!(
                        "unknown attribute `{}`",
                        attr
                    )));
                }
            }
            p = &p[end + 1..];
        }

        Ok(Header {
            id,
            ts,
            nonce,
            mac,
            ext,
            hash,
            app,
            dlg,
        })
    }
}

fn parse_ts(val: &str) -> Result<SystemTime> {
    let secs: u64 = val.parse().map_err(|_| Error::InvalidTimestamp)?;
    Ok(UNIX_EPOCH + Duration::from_secs(secs))
}
