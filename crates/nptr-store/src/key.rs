use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Longest key accepted; matches the usual filename limit.
pub const MAX_KEY_LEN: usize = 255;

/// Name of a stored object: a single flat filename inside the storage root.
///
/// A key never contains a path separator, never starts with `.` and only uses
/// `[A-Za-z0-9._-]`, so joining it onto the root can never leave the root or
/// collide with the store's hidden temporary files.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate an untrusted key (e.g. a URL path segment).
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let reject = |reason| {
            Err(StoreError::InvalidKey {
                key: raw.to_string(),
                reason,
            })
        };
        if raw.is_empty() {
            return reject("empty");
        }
        if raw.len() > MAX_KEY_LEN {
            return reject("too long");
        }
        if raw.starts_with('.') {
            return reject("leading dot");
        }
        if raw.contains(['/', '\\']) {
            return reject("path separator");
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
        {
            return reject("unsupported character");
        }
        Ok(Self(raw.to_string()))
    }

    /// Build a key from a stem and an optional extension.
    ///
    /// Only the namer calls this, with a hex digest or token as the stem and an
    /// extension already restricted to key characters.
    pub(crate) fn from_parts(stem: &str, extension: Option<&str>) -> Self {
        match extension {
            Some(ext) => Self(format!("{stem}.{ext}")),
            None => Self(stem.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Text after the last `.`, if any.
    pub fn extension(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
