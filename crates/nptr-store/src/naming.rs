use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hasher::{Digest, HashAlgorithm};
use crate::key::ObjectKey;

/// Longest extension carried over from the uploaded filename.
pub const MAX_EXTENSION_LEN: usize = 16;

/// How uploaded objects are named.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingScheme {
    /// CRC-32 digest of the content. Identical uploads share one object.
    #[default]
    Crc32,
    /// BLAKE3 digest of the content. Identical uploads share one object.
    Blake3,
    /// Time-ordered random token (UUID v7). Every upload gets its own object,
    /// so two uploads of the same bytes cannot be linked by their URLs.
    Random,
}

impl NamingScheme {
    /// The checksum computed while spooling an upload.
    ///
    /// Random naming still hashes (cheaply) so that every spool carries a
    /// digest; the digest just does not end up in the key.
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Crc32 | Self::Random => HashAlgorithm::Crc32,
            Self::Blake3 => HashAlgorithm::Blake3,
        }
    }
}

impl fmt::Display for NamingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc32 => write!(f, "crc32"),
            Self::Blake3 => write!(f, "blake3"),
            Self::Random => write!(f, "random"),
        }
    }
}

impl FromStr for NamingScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "crc32" => Ok(Self::Crc32),
            "blake3" => Ok(Self::Blake3),
            "random" => Ok(Self::Random),
            other => Err(format!(
                "unknown naming scheme {other:?} (expected crc32, blake3 or random)"
            )),
        }
    }
}

/// Turns a digest and the client's filename into a storage key.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectNamer {
    scheme: NamingScheme,
}

impl ObjectNamer {
    pub fn new(scheme: NamingScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> NamingScheme {
        self.scheme
    }

    /// Name an object.
    ///
    /// Content-addressed schemes use the hex digest as the stem; the random
    /// scheme ignores the digest and uses a fresh UUID v7.
    pub fn name(&self, digest: &Digest, original_filename: &str) -> ObjectKey {
        let extension = extension_of(original_filename);
        match self.scheme {
            NamingScheme::Crc32 | NamingScheme::Blake3 => {
                ObjectKey::from_parts(&digest.to_hex(), extension)
            }
            NamingScheme::Random => {
                let token = Uuid::now_v7().simple().to_string();
                ObjectKey::from_parts(&token, extension)
            }
        }
    }
}

/// Extension of a client-supplied filename.
///
/// Only the last path component is considered (both `/` and `\` count as
/// separators), and the text after its last `.` is kept only when it is
/// 1..=16 characters from `[A-Za-z0-9_-]`. Anything else yields no extension.
pub fn extension_of(filename: &str) -> Option<&str> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() {
        // ".bashrc" is a name, not an extension.
        return None;
    }
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }
    Some(ext)
}
