//! Stored cache document: the payload plus its provenance.
//!
//! Metadata is embedded in the document so any reader of the raw store can
//! tell when and how an entry was produced:
//!
//! ```json
//! {
//!   "payload": { "formatted_address": "New York, NY, USA" },
//!   "metadata": {
//!     "cachedAt": "2024-01-01T00:00:00Z",
//!     "perpetual": true,
//!     "operationKind": "reverse",
//!     "declaredTtlSeconds": 0
//!   }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key_generator::OperationKind;
use super::stores::CacheTtl;

/// Provenance attached to every stored payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub cached_at: DateTime<Utc>,
    pub perpetual: bool,
    pub operation_kind: OperationKind,
    pub declared_ttl_seconds: u64,
}

impl CacheMetadata {
    /// Fresh metadata stamped with the current time
    pub fn stamp(kind: OperationKind, ttl: CacheTtl) -> Self {
        Self {
            cached_at: Utc::now(),
            perpetual: ttl.is_perpetual(),
            operation_kind: kind,
            declared_ttl_seconds: ttl.declared_seconds(),
        }
    }

    /// Whole seconds since the entry was written, never negative
    pub fn age_seconds(&self, now: DateTime<Utc>) -> u64 {
        (now - self.cached_at).num_seconds().max(0) as u64
    }
}

/// The unit of storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub metadata: CacheMetadata,
}

impl<T> CacheEntry<T> {
    pub fn new(payload: T, kind: OperationKind, ttl: CacheTtl) -> Self {
        Self {
            payload,
            metadata: CacheMetadata::stamp(kind, ttl),
        }
    }
}

/// Decodes only the metadata of a stored document, skipping the payload
#[derive(Debug, Deserialize)]
pub(crate) struct MetadataView {
    pub metadata: CacheMetadata,
}
