//! Content-addressed blob storage for the nptr file drop.
//!
//! Uploaded files are stored as single files in one flat directory, named by
//! a digest of their content plus the original extension (or by a random
//! time-ordered token when unlinkable names are wanted).
//!
//! # Pipeline
//!
//! 1. [`BlobStore::spool`] -- stream the upload into a hidden temporary file,
//!    hashing it on the way ([`Spooler`]).
//! 2. [`ObjectNamer::name`] -- derive the [`ObjectKey`] from the digest and
//!    the client's filename.
//! 3. [`BlobStore::put`] -- publish the spool under the key, or discard it if
//!    the key already exists (dedup hit).
//! 4. [`BlobStore::get`] -- open an object for (ranged) streaming.
//!
//! # Design Rules
//!
//! 1. Objects are write-once and never deleted by the store.
//! 2. Publishing is an atomic no-clobber rename; "already exists" is a dedup
//!    hit, never an error.
//! 3. Keys are flat filenames and can never address anything outside the root.
//! 4. All I/O errors are propagated, never retried.

pub mod error;
pub mod hasher;
pub mod key;
pub mod naming;
pub mod spool;
pub mod store;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use hasher::{hash_and_rewind, hash_reader, ContentHasher, Digest, HashAlgorithm};
pub use key::ObjectKey;
pub use naming::{extension_of, NamingScheme, ObjectNamer};
pub use spool::{Spooled, Spooler};
pub use store::{content_type_for, BlobHandle, BlobStore, PutOutcome, DEFAULT_CONTENT_TYPE};
