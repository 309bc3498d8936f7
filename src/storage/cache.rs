//! On-disk cache of rule vectors.
//!
//! A cache directory holds four artifacts:
//!
//! | File | Contents |
//! |------|----------|
//! | `embeddings.bin` | Vector blob: magic, count, dimension, little-endian `f32` payload |
//! | `metadata.json` | `{rule_ids, count, model, created_at}` |
//! | `timestamp.txt` | Creation time, RFC 3339 |
//! | `version.txt` | Format version |
//!
//! The cache is usable only when all four exist, the version matches
//! [`CACHE_FORMAT_VERSION`], and the cache is younger than its validity
//! window. No operation here returns an error: I/O and decode failures are
//! logged and reported as a miss.

use crate::config::MatcherConfig;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Format version written to `version.txt`.
pub const CACHE_FORMAT_VERSION: &str = "1.0.0";

const EMBEDDINGS_FILE: &str = "embeddings.bin";
const METADATA_FILE: &str = "metadata.json";
const TIMESTAMP_FILE: &str = "timestamp.txt";
const VERSION_FILE: &str = "version.txt";

const ARTIFACTS: [&str; 4] = [EMBEDDINGS_FILE, METADATA_FILE, TIMESTAMP_FILE, VERSION_FILE];

/// Blob header: magic, then count and dimension as little-endian `u64`.
const BLOB_MAGIC: [u8; 4] = *b"RGVC";
const BLOB_HEADER_LEN: usize = 4 + 8 + 8;

/// Describes a saved set of vectors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Rule ids in the order their vectors are stored.
    pub rule_ids: Vec<String>,
    /// Number of vectors.
    pub count: usize,
    /// Model that produced the vectors.
    pub model: String,
    /// When the vectors were generated.
    pub created_at: DateTime<Utc>,
    /// Format version; stored in `version.txt` rather than the JSON.
    #[serde(skip, default = "current_version")]
    pub version: String,
}

fn current_version() -> String {
    CACHE_FORMAT_VERSION.to_string()
}

impl CacheManifest {
    /// Creates a manifest for vectors generated now.
    #[must_use]
    pub fn new(rule_ids: Vec<String>, model: impl Into<String>) -> Self {
        Self {
            count: rule_ids.len(),
            rule_ids,
            model: model.into(),
            created_at: Utc::now(),
            version: current_version(),
        }
    }

    /// Returns true if `ids` holds exactly the manifest's rule ids, in any
    /// order.
    #[must_use]
    pub fn matches_ids(&self, ids: &[String]) -> bool {
        let saved: BTreeSet<&str> = self.rule_ids.iter().map(String::as_str).collect();
        let current: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
        saved == current
    }
}

/// Persistent store for rule vectors.
#[derive(Debug, Clone)]
pub struct VectorCache {
    dir: PathBuf,
    validity: Duration,
}

impl VectorCache {
    /// Creates a cache rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, validity: Duration) -> Self {
        Self {
            dir: dir.into(),
            validity,
        }
    }

    /// Creates the cache described by `config`.
    #[must_use]
    pub fn from_config(config: &MatcherConfig) -> Self {
        Self::new(config.cache_dir.clone(), config.cache_validity_window)
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns true if all artifacts exist, the format version matches and
    /// the cache is within its validity window.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if !ARTIFACTS.iter().all(|name| self.dir.join(name).is_file()) {
            return false;
        }

        match self.read_version() {
            Some(version) if version == CACHE_FORMAT_VERSION => {},
            Some(version) => {
                tracing::debug!(
                    found = %version,
                    expected = CACHE_FORMAT_VERSION,
                    "Cache format version mismatch"
                );
                return false;
            },
            None => return false,
        }

        self.age().is_some_and(|age| age < self.validity)
    }

    /// Returns how long ago the cache was written.
    ///
    /// A timestamp in the future counts as age zero.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        let raw = fs::read_to_string(self.dir.join(TIMESTAMP_FILE)).ok()?;
        let created = DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|e| {
                tracing::warn!(error = %e, "Unreadable cache timestamp");
            })
            .ok()?;
        Some(
            Utc::now()
                .signed_duration_since(created.with_timezone(&Utc))
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Reads the manifest without the vector blob.
    #[must_use]
    pub fn manifest(&self) -> Option<CacheManifest> {
        let path = self.dir.join(METADATA_FILE);
        let raw = fs::read_to_string(&path).ok()?;
        let mut manifest: CacheManifest = serde_json::from_str(&raw)
            .map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable cache manifest");
            })
            .ok()?;
        manifest.version = self.read_version()?;
        Some(manifest)
    }

    /// Returns true unless the cache is valid and holds exactly `rule_ids`.
    #[must_use]
    pub fn needs_update(&self, rule_ids: &[String]) -> bool {
        if !self.is_valid() {
            return true;
        }
        self.manifest()
            .is_none_or(|manifest| !manifest.matches_ids(rule_ids))
    }

    /// Writes vectors and manifest, replacing any previous cache.
    ///
    /// Every artifact is written to a temporary sibling first and renamed
    /// into place afterwards. Returns false, leaving no temporaries behind,
    /// if anything fails.
    #[must_use]
    pub fn save(&self, vectors: &[Vec<f32>], manifest: &CacheManifest) -> bool {
        match self.try_save(vectors, manifest) {
            Ok(()) => {
                tracing::info!(
                    path = %self.dir.display(),
                    rule_count = manifest.count,
                    model = %manifest.model,
                    "Saved vector cache"
                );
                true
            },
            Err(e) => {
                self.remove_temporaries();
                tracing::warn!(path = %self.dir.display(), error = %e, "Failed to save vector cache");
                false
            },
        }
    }

    /// Loads vectors and manifest.
    ///
    /// Returns `None` when the cache is invalid or any artifact is corrupt.
    #[must_use]
    pub fn load(&self) -> Option<(Vec<Vec<f32>>, CacheManifest)> {
        if !self.is_valid() {
            return None;
        }
        match self.try_load() {
            Ok(loaded) => {
                tracing::info!(
                    path = %self.dir.display(),
                    rule_count = loaded.1.count,
                    "Loaded vector cache"
                );
                Some(loaded)
            },
            Err(e) => {
                tracing::warn!(path = %self.dir.display(), error = %e, "Discarding vector cache");
                None
            },
        }
    }

    /// Deletes every artifact.
    ///
    /// Returns true if nothing remains; a missing cache counts as success.
    #[must_use]
    pub fn invalidate(&self) -> bool {
        let mut ok = true;
        for name in ARTIFACTS {
            let path = self.dir.join(name);
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache artifact");
                    ok = false;
                }
            }
        }
        if ok {
            tracing::debug!(path = %self.dir.display(), "Invalidated vector cache");
        }
        ok
    }

    fn read_version(&self) -> Option<String> {
        fs::read_to_string(self.dir.join(VERSION_FILE))
            .ok()
            .map(|v| v.trim().to_string())
    }

    fn try_save(&self, vectors: &[Vec<f32>], manifest: &CacheManifest) -> Result<()> {
        if vectors.len() != manifest.count || manifest.rule_ids.len() != manifest.count {
            return Err(Error::InvalidInput(format!(
                "manifest lists {} rules ({} ids) but {} vectors were given",
                manifest.count,
                manifest.rule_ids.len(),
                vectors.len()
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|e| io_failed("create_cache_dir", &self.dir, &e))?;

        let metadata = serde_json::to_string_pretty(manifest).map_err(|e| Error::OperationFailed {
            operation: "serialize_cache_manifest".to_string(),
            cause: e.to_string(),
        })?;

        let contents: [(&str, Vec<u8>); 4] = [
            (EMBEDDINGS_FILE, encode_blob(vectors)?),
            (METADATA_FILE, metadata.into_bytes()),
            (TIMESTAMP_FILE, manifest.created_at.to_rfc3339().into_bytes()),
            (VERSION_FILE, CACHE_FORMAT_VERSION.as_bytes().to_vec()),
        ];

        for (name, bytes) in &contents {
            let tmp = self.temp_path(name);
            fs::write(&tmp, bytes).map_err(|e| io_failed("write_cache_artifact", &tmp, &e))?;
        }
        for (name, _) in &contents {
            let tmp = self.temp_path(name);
            let target = self.dir.join(name);
            fs::rename(&tmp, &target).map_err(|e| io_failed("rename_cache_artifact", &target, &e))?;
        }
        Ok(())
    }

    fn try_load(&self) -> Result<(Vec<Vec<f32>>, CacheManifest)> {
        let manifest = self
            .manifest()
            .ok_or_else(|| Error::CacheCorrupt(format!("{METADATA_FILE} unreadable")))?;

        let path = self.dir.join(EMBEDDINGS_FILE);
        let bytes = fs::read(&path).map_err(|e| io_failed("read_cache_blob", &path, &e))?;
        let vectors = decode_blob(&bytes)?;

        if vectors.len() != manifest.count || manifest.rule_ids.len() != manifest.count {
            return Err(Error::CacheCorrupt(format!(
                "blob holds {} vectors, manifest lists {} ({} ids)",
                vectors.len(),
                manifest.count,
                manifest.rule_ids.len()
            )));
        }
        Ok((vectors, manifest))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.tmp"))
    }

    fn remove_temporaries(&self) {
        for name in ARTIFACTS {
            let tmp = self.temp_path(name);
            if tmp.exists() {
                let _ = fs::remove_file(&tmp);
            }
        }
    }
}

fn io_failed(operation: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("{}: {e}", path.display()),
    }
}

/// Encodes equally sized vectors as a header followed by little-endian `f32`s.
fn encode_blob(vectors: &[Vec<f32>]) -> Result<Vec<u8>> {
    let dimension = vectors.first().map_or(0, Vec::len);
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(Error::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }

    let mut data = Vec::with_capacity(BLOB_HEADER_LEN + vectors.len() * dimension * 4);
    data.extend_from_slice(&BLOB_MAGIC);
    data.extend_from_slice(&(vectors.len() as u64).to_le_bytes());
    data.extend_from_slice(&(dimension as u64).to_le_bytes());
    data.extend(vectors.iter().flatten().flat_map(|f| f.to_le_bytes()));
    Ok(data)
}

fn decode_blob(data: &[u8]) -> Result<Vec<Vec<f32>>> {
    if data.len() < BLOB_HEADER_LEN {
        return Err(Error::CacheCorrupt("vector blob too small".to_string()));
    }
    if data[0..4] != BLOB_MAGIC {
        return Err(Error::CacheCorrupt("invalid vector blob magic".to_string()));
    }

    let count = read_len(&data[4..12])?;
    let dimension = read_len(&data[12..20])?;
    let payload = &data[BLOB_HEADER_LEN..];

    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::CacheCorrupt("vector blob header overflows".to_string()))?;
    if payload.len() != expected {
        return Err(Error::CacheCorrupt(format!(
            "vector blob payload is {} bytes, header implies {expected}",
            payload.len()
        )));
    }
    if count > 0 && dimension == 0 {
        return Err(Error::CacheCorrupt("zero-dimension vectors".to_string()));
    }

    let floats: Vec<f32> = payload
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok(floats.chunks(dimension.max(1)).map(<[f32]>::to_vec).collect())
}

fn read_len(bytes: &[u8]) -> Result<usize> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| Error::CacheCorrupt("invalid vector blob header".to_string()))?;
    usize::try_from(u64::from_le_bytes(raw))
        .map_err(|_| Error::CacheCorrupt("vector blob header out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    fn vectors(n: usize) -> Vec<Vec<f32>> {
        (0..n).map(|i| vec![i as f32, 0.5, -1.25]).collect()
    }

    fn saved_cache(rule_ids: &[&str]) -> (TempDir, VectorCache) {
        let dir = TempDir::new().expect("tempdir");
        let cache = VectorCache::new(dir.path().join("vectors"), DAY);
        let manifest = CacheManifest::new(ids(rule_ids), "all-MiniLM-L6-v2");
        assert!(cache.save(&vectors(rule_ids.len()), &manifest));
        (dir, cache)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (_dir, cache) = saved_cache(&["ERR-001", "ERR-002", "ERR-003"]);
        assert!(cache.is_valid());

        let (loaded, manifest) = cache.load().expect("cache hit");
        assert_eq!(loaded, vectors(3));
        assert_eq!(manifest.rule_ids, ids(&["ERR-001", "ERR-002", "ERR-003"]));
        assert_eq!(manifest.count, 3);
        assert_eq!(manifest.model, "all-MiniLM-L6-v2");
        assert_eq!(manifest.version, CACHE_FORMAT_VERSION);
    }

    #[test]
    fn test_save_writes_all_artifacts_without_temporaries() {
        let (_dir, cache) = saved_cache(&["ERR-001"]);
        for name in ARTIFACTS {
            assert!(cache.dir().join(name).is_file(), "{name} missing");
            assert!(!cache.temp_path(name).exists(), "{name}.tmp left behind");
        }
        let version = fs::read_to_string(cache.dir().join(VERSION_FILE)).expect("read");
        assert_eq!(version, "1.0.0");
    }

    #[test]
    fn test_needs_update_tracks_id_set() {
        let (_dir, cache) = saved_cache(&["ERR-001", "ERR-002"]);
        assert!(!cache.needs_update(&ids(&["ERR-001", "ERR-002"])));
        assert!(!cache.needs_update(&ids(&["ERR-002", "ERR-001"])));
        assert!(cache.needs_update(&ids(&["ERR-001", "ERR-002", "ERR-003"])));
        assert!(cache.needs_update(&ids(&["ERR-001"])));
    }

    #[test]
    fn test_missing_cache_needs_update() {
        let dir = TempDir::new().expect("tempdir");
        let cache = VectorCache::new(dir.path(), DAY);
        assert!(!cache.is_valid());
        assert!(cache.needs_update(&ids(&["ERR-001"])));
        assert!(cache.load().is_none());
        assert!(cache.age().is_none());
        assert!(cache.manifest().is_none());
    }

    #[test]
    fn test_expired_cache_is_invalid() {
        let (_dir, cache) = saved_cache(&["ERR-001"]);
        let expired = VectorCache::new(cache.dir(), Duration::ZERO);
        assert!(!expired.is_valid());
        assert!(expired.needs_update(&ids(&["ERR-001"])));
    }

    #[test]
    fn test_old_timestamp_is_invalid() {
        let (_dir, cache) = saved_cache(&["ERR-001"]);
        fs::write(cache.dir().join(TIMESTAMP_FILE), "2020-01-01T00:00:00+00:00").expect("write");
        assert!(!cache.is_valid());
        assert!(cache.age().expect("age") > DAY);
    }

    #[test]
    fn test_version_mismatch_is_invalid() {
        let (_dir, cache) = saved_cache(&["ERR-001"]);
        fs::write(cache.dir().join(VERSION_FILE), "0.9.0").expect("write");
        assert!(!cache.is_valid());
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_corrupt_blob_is_a_miss() {
        let (_dir, cache) = saved_cache(&["ERR-001", "ERR-002"]);
        let path = cache.dir().join(EMBEDDINGS_FILE);
        let bytes = fs::read(&path).expect("read");
        fs::write(&path, &bytes[..bytes.len() - 3]).expect("write");

        assert!(cache.is_valid());
        assert!(cache.load().is_none());
    }

    #[test]
    fn test_corrupt_manifest_is_a_miss() {
        let (_dir, cache) = saved_cache(&["ERR-001"]);
        fs::write(cache.dir().join(METADATA_FILE), "{not json").expect("write");
        assert!(cache.load().is_none());
        assert!(cache.needs_update(&ids(&["ERR-001"])));
    }

    #[test]
    fn test_save_rejects_count_mismatch() {
        let dir = TempDir::new().expect("tempdir");
        let cache = VectorCache::new(dir.path(), DAY);
        let manifest = CacheManifest::new(ids(&["ERR-001", "ERR-002"]), "m");
        assert!(!cache.save(&vectors(1), &manifest));
        assert!(!cache.is_valid());
    }

    #[test]
    fn test_save_rejects_ragged_vectors() {
        let dir = TempDir::new().expect("tempdir");
        let cache = VectorCache::new(dir.path(), DAY);
        let manifest = CacheManifest::new(ids(&["A", "B"]), "m");
        assert!(!cache.save(&[vec![1.0, 0.0], vec![1.0]], &manifest));
        for name in ARTIFACTS {
            assert!(!cache.temp_path(name).exists());
        }
    }

    #[test]
    fn test_invalidate() {
        let (_dir, cache) = saved_cache(&["ERR-001"]);
        assert!(cache.invalidate());
        assert!(!cache.is_valid());
        assert!(cache.invalidate());
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = CacheManifest::new(ids(&["ERR-001"]), "m");
        let value = serde_json::to_value(&manifest).expect("serialize");
        let object = value.as_object().expect("object");
        assert!(object.contains_key("rule_ids"));
        assert!(object.contains_key("count"));
        assert!(object.contains_key("model"));
        assert!(object.contains_key("created_at"));
        assert!(!object.contains_key("version"));
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut blob = encode_blob(&vectors(2)).expect("encode");
        blob[0] = b'X';
        assert!(matches!(decode_blob(&blob), Err(Error::CacheCorrupt(_))));
    }

    #[test]
    fn test_empty_vector_set() {
        let blob = encode_blob(&[]).expect("encode");
        assert_eq!(decode_blob(&blob).expect("decode"), Vec::<Vec<f32>>::new());
    }
}
