//! # Cache Key Generator
//!
//! Turns a logical lookup request into a stable cache key.
//!
//! Coordinates are quantized to a fixed number of decimal places before
//! hashing, so nearby points collapse onto one key and one provider response.
//! With the default precision of 2 decimals that is roughly a 1 km grid.
//! Addresses are only trimmed; there is no safe normalization without
//! geocoding them first.
//!
//! Keys have the shape `<kind>:<sha256>` or `<kind>:user:<scope>:<sha256>`.

use super::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Decimal places kept for coordinates when nothing else is configured
pub const DEFAULT_QUANTIZATION_PRECISION: u32 = 2;

/// Upper bound for the configurable precision (~11 cm)
pub const MAX_QUANTIZATION_PRECISION: u32 = 6;

/// Cache key type
pub type CacheKey = String;

/// Cache namespace of a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Coordinates to address
    Reverse,
    /// Address to coordinates
    Forward,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Reverse => "reverse",
            OperationKind::Forward => "forward",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw input of a lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupInput {
    Coordinates { lat: f64, lng: f64 },
    Address { address: String },
}

/// A single lookup as issued by a caller. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest {
    pub kind: OperationKind,

    #[serde(flatten)]
    pub input: LookupInput,

    /// Preferred result language, part of the key when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Partitions the cache per caller identity; absent means shared caching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_scope: Option<String>,
}

impl LookupRequest {
    /// Reverse lookup for a coordinate pair
    pub fn reverse(lat: f64, lng: f64) -> Self {
        Self {
            kind: OperationKind::Reverse,
            input: LookupInput::Coordinates { lat, lng },
            language: None,
            user_scope: None,
        }
    }

    /// Forward lookup for a free-text address
    pub fn forward(address: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Forward,
            input: LookupInput::Address {
                address: address.into(),
            },
            language: None,
            user_scope: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_user_scope(mut self, scope: impl Into<String>) -> Self {
        self.user_scope = Some(scope.into());
        self
    }
}

/// Quantized and trimmed request payload, the only input to the key hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lng: Option<String>,
}

impl NormalizedInputs {
    /// Canonical JSON text: keys in lexicographic order, absent fields omitted.
    pub fn canonical(&self) -> String {
        // Inserted in sorted order so the output is identical with or without
        // serde_json's `preserve_order` feature.
        let mut map = Map::new();
        let fields = [
            ("address", &self.address),
            ("language", &self.language),
            ("lat", &self.lat),
            ("lng", &self.lng),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                map.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(map).to_string()
    }

    /// Quantized latitude as a number
    pub fn lat_value(&self) -> Option<f64> {
        self.lat.as_deref().and_then(|lat| lat.parse().ok())
    }

    /// Quantized longitude as a number
    pub fn lng_value(&self) -> Option<f64> {
        self.lng.as_deref().and_then(|lng| lng.parse().ok())
    }
}

/// Round `value` to `precision` decimals and render it as fixed-point text.
///
/// Rounding is half away from zero on the f64 product `value * 10^precision`,
/// so decimal ties that are not exact in binary may round down
/// (`quantize(1.005, 2)` is `"1.00"`). The result is deterministic.
/// Negative zero is folded to zero so `-0.001` and `0.001` share a key.
pub fn quantize(value: f64, precision: u32) -> String {
    let factor = 10f64.powi(precision as i32);
    let mut rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        rounded = 0.0;
    }
    format!("{:.*}", precision as usize, rounded)
}

/// Build the cache key for already-normalized inputs.
///
/// Pure and deterministic across calls and process restarts.
pub fn derive_key(kind: OperationKind, inputs: &NormalizedInputs, user_scope: Option<&str>) -> CacheKey {
    let digest = Sha256::digest(inputs.canonical().as_bytes());
    let hash = hex::encode(digest);

    match user_scope.map(str::trim).filter(|scope| !scope.is_empty()) {
        Some(scope) => format!("{}:user:{}:{}", kind, scope, hash),
        None => format!("{}:{}", kind, hash),
    }
}

/// Normalizes lookup requests and derives their keys
#[derive(Debug, Clone, Copy)]
pub struct KeyGenerator {
    precision: u32,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTIZATION_PRECISION)
    }
}

impl KeyGenerator {
    /// Create a key generator; precision is clamped to `1..=6`
    pub fn new(precision: u32) -> Self {
        Self {
            precision: precision.clamp(1, MAX_QUANTIZATION_PRECISION),
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    /// Quantize coordinates, trim text fields and check the request is usable.
    pub fn normalize(&self, request: &LookupRequest) -> CacheResult<NormalizedInputs> {
        let language = request
            .language
            .as_deref()
            .map(|lang| lang.trim().to_lowercase())
            .filter(|lang| !lang.is_empty());

        match (&request.kind, &request.input) {
            (OperationKind::Reverse, LookupInput::Coordinates { lat, lng }) => {
                if !lat.is_finite() {
                    return Err(CacheError::invalid_request("lat", "latitude must be a finite number"));
                }
                if !lng.is_finite() {
                    return Err(CacheError::invalid_request("lng", "longitude must be a finite number"));
                }
                if !(-90.0..=90.0).contains(lat) {
                    return Err(CacheError::invalid_request("lat", format!("latitude {} is outside [-90, 90]", lat)));
                }
                if !(-180.0..=180.0).contains(lng) {
                    return Err(CacheError::invalid_request("lng", format!("longitude {} is outside [-180, 180]", lng)));
                }

                Ok(NormalizedInputs {
                    address: None,
                    language,
                    lat: Some(quantize(*lat, self.precision)),
                    lng: Some(quantize(*lng, self.precision)),
                })
            }

            (OperationKind::Forward, LookupInput::Address { address }) => {
                let address = address.trim();
                if address.is_empty() {
                    return Err(CacheError::invalid_request("address", "address must not be empty"));
                }

                Ok(NormalizedInputs {
                    address: Some(address.to_string()),
                    language,
                    lat: None,
                    lng: None,
                })
            }

            (OperationKind::Reverse, LookupInput::Address { .. }) => Err(CacheError::invalid_request(
                "input",
                "reverse lookups require lat and lng",
            )),

            (OperationKind::Forward, LookupInput::Coordinates { .. }) => Err(CacheError::invalid_request(
                "input",
                "forward lookups require an address",
            )),
        }
    }

    /// Normalize the request and derive its key
    pub fn key_for(&self, request: &LookupRequest) -> CacheResult<CacheKey> {
        let inputs = self.normalize(request)?;
        Ok(derive_key(request.kind, &inputs, request.user_scope.as_deref()))
    }
}
