//! File-based geocode cache at ~/.center-finder/geocode.json.
//!
//! Keys are normalized addresses (lowercase, single spaces, no stray
//! punctuation at the ends). Hits live 30 days; definite misses live one
//! hour so a bad address is not re-queried on every pass.
//!
//! Writes only touch memory; [`GeocodeCache::take_pending`] hands out the
//! serialized file so callers can write it off the async runtime.

use crate::geo::GeoPoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const HIT_TTL_MS: i64 = 30 * 24 * 3600 * 1000; // 30 days
const MISS_TTL_MS: i64 = 3600 * 1000; // 1 hour

#[derive(Serialize, Deserialize, Clone)]
struct CacheEntry {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    timestamp: i64,
}

impl CacheEntry {
    fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    fn ttl(&self) -> i64 {
        if self.point().is_some() { HIT_TTL_MS } else { MISS_TTL_MS }
    }
}

/// Normalize an address into a cache key.
pub fn normalize_address(address: &str) -> String {
    address
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c == ',' || c == '.' || c.is_whitespace())
        .to_string()
}

/// The geocode cache.
pub struct GeocodeCache {
    path: Option<PathBuf>,
    entries: HashMap<String, CacheEntry>,
    dirty: bool,
}

impl GeocodeCache {
    /// Load from `path`, dropping expired entries. A missing or corrupt
    /// file yields an empty cache.
    pub fn load_from(path: PathBuf) -> Self {
        let entries = Self::read_file(&path).unwrap_or_default();
        let mut cache = Self { path: Some(path), entries, dirty: false };
        cache.prune();
        cache
    }

    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self { path: None, entries: HashMap::new(), dirty: false }
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".center-finder")
            .join("geocode.json")
    }

    fn read_file(path: &Path) -> Option<HashMap<String, CacheEntry>> {
        let data = fs::read_to_string(path).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Cached outcome for `address`: `Some(Some(point))` for a hit,
    /// `Some(None)` for a remembered miss, `None` if unknown or expired.
    pub fn get(&self, address: &str) -> Option<Option<GeoPoint>> {
        self.get_at(address, chrono::Utc::now().timestamp_millis())
    }

    fn get_at(&self, address: &str, now_ms: i64) -> Option<Option<GeoPoint>> {
        let entry = self.entries.get(&normalize_address(address))?;
        if now_ms - entry.timestamp > entry.ttl() {
            return None; // expired
        }
        Some(entry.point())
    }

    /// Record an outcome in memory.
    pub fn put(&mut self, address: &str, point: Option<GeoPoint>) {
        self.put_at(address, point, chrono::Utc::now().timestamp_millis());
    }

    fn put_at(&mut self, address: &str, point: Option<GeoPoint>, now_ms: i64) {
        let entry = CacheEntry {
            lat: point.map(|p| p.lat),
            lng: point.map(|p| p.lng),
            timestamp: now_ms,
        };
        self.entries.insert(normalize_address(address), entry);
        self.dirty = true;
    }

    /// Drop expired entries.
    pub fn prune(&mut self) {
        let now = chrono::Utc::now().timestamp_millis();
        self.entries.retain(|_, e| now - e.timestamp <= e.ttl());
    }

    /// The file to write if anything changed since the last call.
    pub fn take_pending(&mut self) -> Option<(PathBuf, String)> {
        if !self.dirty {
            return None;
        }
        let path = self.path.clone()?;
        match serde_json::to_string_pretty(&self.entries) {
            Ok(json) => {
                self.dirty = false;
                Some((path, json))
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize geocode cache");
                None
            }
        }
    }

    /// Write pending changes now, blocking the calling thread.
    pub fn save(&mut self) {
        if let Some((path, json)) = self.take_pending() {
            write_file(&path, &json);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn write_file(path: &Path, json: &str) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if let Err(e) = fs::write(path, json) {
        tracing::warn!(path = %path.display(), error = %e, "could not write geocode cache");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_cache() -> (GeocodeCache, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geocode.json");
        (GeocodeCache::load_from(path), dir)
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("  12  Nguyen Hue,  District 1, "), "12 nguyen hue, district 1");
        assert_eq!(normalize_address("A.B Street."), "a.b street");
    }

    #[test]
    fn test_put_get() {
        let (mut cache, _dir) = test_cache();
        cache.put("12 Nguyen Hue", Some(GeoPoint::new(10.77, 106.70)));
        assert_eq!(cache.get("12 NGUYEN HUE"), Some(Some(GeoPoint::new(10.77, 106.70))));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_miss_unknown() {
        let (cache, _dir) = test_cache();
        assert!(cache.get("nowhere").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_negative_entry_expires_sooner() {
        let mut cache = GeocodeCache::in_memory();
        let t0 = 1_000_000_000_000;
        cache.put_at("bad address", None, t0);
        cache.put_at("good address", Some(GeoPoint::new(1.0, 2.0)), t0);

        let two_hours = t0 + 2 * 3600 * 1000;
        assert_eq!(cache.get_at("bad address", t0 + 60_000), Some(None));
        assert_eq!(cache.get_at("bad address", two_hours), None);
        assert_eq!(cache.get_at("good address", two_hours), Some(Some(GeoPoint::new(1.0, 2.0))));
        assert_eq!(cache.get_at("good address", t0 + HIT_TTL_MS + 1), None);
    }

    #[test]
    fn test_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("geocode.json");
        {
            let mut cache = GeocodeCache::load_from(path.clone());
            cache.put("1 Le Loi", Some(GeoPoint::new(10.0, 106.0)));
            cache.save();
        }
        let reloaded = GeocodeCache::load_from(path);
        assert_eq!(reloaded.get("1 le loi"), Some(Some(GeoPoint::new(10.0, 106.0))));
    }

    #[test]
    fn test_put_only_touches_memory_until_taken() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geocode.json");
        let mut cache = GeocodeCache::load_from(path.clone());
        assert!(cache.take_pending().is_none());

        cache.put("1 Le Loi", None);
        assert!(!path.exists());

        let (pending_path, json) = cache.take_pending().unwrap();
        assert_eq!(pending_path, path);
        assert!(json.contains("1 le loi"));
        assert!(cache.take_pending().is_none());
    }

    #[test]
    fn test_in_memory_cache_has_nothing_to_write() {
        let mut cache = GeocodeCache::in_memory();
        cache.put("1 Le Loi", None);
        assert!(cache.take_pending().is_none());
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("geocode.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(GeocodeCache::load_from(path).is_empty());
    }

    #[test]
    fn test_prune_drops_expired() {
        let mut cache = GeocodeCache::in_memory();
        cache.put_at("old", None, 0);
        cache.put_at("fresh", Some(GeoPoint::new(0.0, 0.0)), chrono::Utc::now().timestamp_millis());
        cache.prune();
        assert_eq!(cache.len(), 1);
    }
}
