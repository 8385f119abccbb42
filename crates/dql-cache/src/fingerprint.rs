//! Cache key derivation
//!
//! Keys are SHA-256 digests over a length-prefixed encoding of the request
//! fields, so no choice of input text can make two different field lists
//! serialize to the same bytes. Inputs are hashed exactly as received: a query
//! that differs only in whitespace gets a different key.

use dql_core::QueryRequest;
use sha2::{Digest, Sha256};
use std::fmt;

const DOMAIN: &[u8] = b"dql-proxy:v1";

const TAG_NAMESPACE: u8 = 0x01;
const TAG_FIELD: u8 = 0x02;
const TAG_ABSENT: u8 = 0x03;

/// Opaque cache key: 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental key builder.
///
/// ```
/// use dql_cache::Fingerprint;
///
/// let key = Fingerprint::new("table")
///     .field("fetch logs")
///     .field("now()-1h")
///     .field("now()")
///     .optional(None)
///     .finish();
/// assert_eq!(key.as_str().len(), 64);
/// ```
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new(namespace: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        let mut fp = Self { hasher };
        fp.write(TAG_NAMESPACE, namespace.as_bytes());
        fp
    }

    pub fn field(mut self, value: &str) -> Self {
        self.write(TAG_FIELD, value.as_bytes());
        self
    }

    /// Absent and empty values hash differently.
    pub fn optional(mut self, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.write(TAG_FIELD, v.as_bytes()),
            None => self.write(TAG_ABSENT, &[]),
        }
        self
    }

    pub fn finish(self) -> CacheKey {
        CacheKey(hex::encode(self.hasher.finalize()))
    }

    fn write(&mut self, tag: u8, bytes: &[u8]) {
        self.hasher.update([tag]);
        self.hasher.update((bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }
}

/// Key for a request plus the shaping parameters that select its cached payload.
pub fn build_key(namespace: &str, request: &QueryRequest, extras: &[Option<&str>]) -> CacheKey {
    let fp = Fingerprint::new(namespace)
        .field(request.query())
        .field(request.range_start())
        .field(request.range_end());

    extras
        .iter()
        .fold(fp, |fp, extra| fp.optional(*extra))
        .finish()
}
