//! # Geocode Cache
//!
//! A response cache in front of a paid geocoding provider. Lookups are keyed
//! by a digest of their quantized, normalized inputs; entries are either
//! perpetual or expiring, and a broken cache store never fails a lookup.
//!
//! The crate is organised in four parts:
//! - `caching`: key derivation, store backends, the `with_cache` middleware,
//!   introspection, diagnostics, warmup and migration, admin endpoints
//! - `geocode`: the provider seam and the cached lookup service
//! - `observability`: structured logging
//! - `core`: configuration and the service-level error type

pub mod caching;
pub mod core;
pub mod geocode;
pub mod observability;

pub use caching::{CacheError, CacheManager, CacheResult, ResponseCache};
pub use core::config::GeocacheConfig;
pub use core::error::{GeocacheError, GeocacheResult};
pub use geocode::{GeocodeProvider, GeocodeService};
