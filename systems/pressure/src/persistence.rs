//! JSON persistence of the pressure store.
//!
//! The whole document is rewritten on every save. Loading is lenient: region
//! entries that are not well-formed objects are skipped, and numeric fields are
//! clamped to non-negative values within the counter range.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use rank_pressure_core::{RegionKey, TIER_CAPACITY};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::store::{PressureStore, RegionPressure};

/// Errors raised while saving or loading the pressure store.
#[derive(Debug, Error)]
pub enum PressureStoreError {
    /// The persisted document could not be read.
    #[error("could not read pressure state {}: {source}", .path.display())]
    Read {
        /// Location of the document.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The document could not be written.
    #[error("could not write pressure state {}: {source}", .path.display())]
    Write {
        /// Location of the document.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The document is not valid JSON.
    #[error("failed to parse pressure state: {0}")]
    Parse(#[source] serde_json::Error),
    /// The store could not be encoded.
    #[error("failed to encode pressure state: {0}")]
    Encode(#[source] serde_json::Error),
    /// The document parsed but its root is not an object.
    #[error("pressure state root must be an object")]
    RootNotObject,
    /// The document carries a `regions` field that is not an array.
    #[error("pressure state regions must be an array")]
    RegionsNotArray,
}

impl PressureStoreError {
    /// Reports whether the failure is a missing file, as on a world's first run.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Serialize)]
struct PressureDocument {
    regions: Vec<RegionRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegionRecord {
    #[serde(flatten)]
    key: RegionKey,
    intensity: f64,
    last_update_ms: u64,
    recent_outbreaks: u32,
    kills: [u32; TIER_CAPACITY],
}

impl PressureStore {
    /// Encodes every region, in key order, as a pretty-printed JSON document.
    pub fn to_json_string(&self) -> Result<String, PressureStoreError> {
        let document = PressureDocument {
            regions: self
                .sorted()
                .into_iter()
                .map(|(key, record)| RegionRecord {
                    key,
                    intensity: record.intensity(),
                    last_update_ms: record.last_update_ms(),
                    recent_outbreaks: record.recent_outbreaks(),
                    kills: *record.kills(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&document).map_err(PressureStoreError::Encode)
    }

    /// Overwrites `path` with the encoded store.
    pub fn persist(&self, path: &Path) -> Result<(), PressureStoreError> {
        let json = self.to_json_string()?;
        fs::write(path, json).map_err(|source| PressureStoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), regions = self.len(), "persisted pressure state");
        Ok(())
    }

    /// Replaces every region with those decoded from `document`.
    ///
    /// Returns the number of regions restored. On error the store is untouched.
    pub fn restore_from_str(&mut self, document: &str) -> Result<usize, PressureStoreError> {
        let regions = decode_regions(document)?;
        let restored = regions.len();
        self.replace_regions(regions);
        Ok(restored)
    }

    /// Replaces every region with those read from `path`.
    pub fn restore(&mut self, path: &Path) -> Result<usize, PressureStoreError> {
        let contents = fs::read_to_string(path).map_err(|source| PressureStoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let restored = self.restore_from_str(&contents)?;
        info!(path = %path.display(), regions = restored, "restored pressure state");
        Ok(restored)
    }
}

fn decode_regions(
    document: &str,
) -> Result<HashMap<RegionKey, RegionPressure>, PressureStoreError> {
    let document: Value = serde_json::from_str(document).map_err(PressureStoreError::Parse)?;
    let root = document
        .as_object()
        .ok_or(PressureStoreError::RootNotObject)?;

    let entries = match root.get("regions") {
        None => return Ok(HashMap::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(PressureStoreError::RegionsNotArray),
    };

    let mut regions = HashMap::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        match decode_region(entry) {
            Some((key, record)) => {
                let _ = regions.insert(key, record);
            }
            None => warn!(position, "skipping malformed pressure region"),
        }
    }
    Ok(regions)
}

fn decode_region(entry: &Value) -> Option<(RegionKey, RegionPressure)> {
    let object = entry.as_object()?;
    let key = RegionKey::new(
        coordinate(object, "rx")?,
        coordinate(object, "ry")?,
        coordinate(object, "z")?,
    );

    let intensity = object
        .get("intensity")
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
        .max(0.0);
    let last_update_ms = object.get("lastUpdateMs").map_or(0, timestamp);
    let recent_outbreaks = object.get("recentOutbreaks").map_or(0, counter);

    let mut kills = [0; TIER_CAPACITY];
    if let Some(values) = object.get("kills").and_then(Value::as_array) {
        for (slot, value) in kills.iter_mut().zip(values) {
            *slot = counter(value);
        }
    }

    Some((
        key,
        RegionPressure::from_parts(kills, intensity, last_update_ms, recent_outbreaks),
    ))
}

fn coordinate(object: &Map<String, Value>, key: &str) -> Option<i32> {
    object
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|value| i32::try_from(value).ok())
}

fn counter(value: &Value) -> u32 {
    if let Some(value) = value.as_u64() {
        return u32::try_from(value).unwrap_or(u32::MAX);
    }
    value
        .as_f64()
        .filter(|value| !value.is_nan())
        .map_or(0, |value| value.clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn timestamp(value: &Value) -> u64 {
    if let Some(value) = value.as_u64() {
        return value;
    }
    value
        .as_f64()
        .filter(|value| !value.is_nan())
        .map_or(0, |value| value.clamp(0.0, u64::MAX as f64) as u64)
}
