use std::fmt;
use std::io::{self, SeekFrom};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Read buffer used when hashing a stream.
const READ_CHUNK: usize = 64 * 1024;

/// Checksum algorithm used to derive content-addressed keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// CRC-32 (IEEE polynomial `0xedb88320`), 4 bytes, big-endian hex.
    Crc32,
    /// BLAKE3, 32 bytes.
    Blake3,
}

impl HashAlgorithm {
    /// Hash an in-memory buffer in one call.
    pub fn digest(&self, data: &[u8]) -> Digest {
        let mut hasher = ContentHasher::new(*self);
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc32 => write!(f, "crc32"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

/// A finished content digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Digest {
    algorithm: HashAlgorithm,
    bytes: Vec<u8>,
}

impl Digest {
    /// The algorithm that produced this digest.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercase hex encoding, as used in object keys.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}:{})", self.algorithm, self.to_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental content hasher.
///
/// Bytes are fed with [`update`](Self::update) as they arrive so that the
/// payload never has to be held in memory as a whole.
pub enum ContentHasher {
    Crc32(crc32fast::Hasher),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    /// Start a new hash computation.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Crc32 => Self::Crc32(crc32fast::Hasher::new()),
            HashAlgorithm::Blake3 => Self::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            Self::Crc32(_) => HashAlgorithm::Crc32,
            Self::Blake3(_) => HashAlgorithm::Blake3,
        }
    }

    /// Feed more bytes into the hash.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Crc32(h) => h.update(data),
            Self::Blake3(h) => {
                h.update(data);
            }
        }
    }

    /// Consume the hasher and produce the digest.
    pub fn finalize(self) -> Digest {
        match self {
            Self::Crc32(h) => Digest {
                algorithm: HashAlgorithm::Crc32,
                bytes: h.finalize().to_be_bytes().to_vec(),
            },
            Self::Blake3(h) => Digest {
                algorithm: HashAlgorithm::Blake3,
                bytes: h.finalize().as_bytes().to_vec(),
            },
        }
    }
}

impl fmt::Debug for ContentHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHasher")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Hash a stream to its end. Returns the digest and the number of bytes read.
pub async fn hash_reader<R>(algorithm: HashAlgorithm, reader: &mut R) -> io::Result<(Digest, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = ContentHasher::new(algorithm);
    let mut buf = vec![0u8; READ_CHUNK];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((hasher.finalize(), total))
}

/// Hash a seekable stream from offset 0, then seek it back to offset 0 so the
/// same bytes can be read again for storage.
pub async fn hash_and_rewind<R>(
    algorithm: HashAlgorithm,
    reader: &mut R,
) -> io::Result<(Digest, u64)>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    reader.seek(SeekFrom::Start(0)).await?;
    let result = hash_reader(algorithm, reader).await?;
    reader.seek(SeekFrom::Start(0)).await?;
    Ok(result)
}
