//! Snapshot persistence.
//!
//! Serializes the live entry set as a framed, GZIP-compressed stream and
//! restores it on startup. Writes go to `<path>.tmp` and are renamed over
//! the target so a crash mid-write never clobbers the previous snapshot.
//!
//! Frame layout (network byte order), inside the GZIP stream:
//!
//! ```text
//! magic          u32   0x4348524F ("CHRO")
//! version        u32   1
//! written_at_ms  u64   wall clock, informational
//! entry_count    u32
//! entries        repeated entry_count times:
//!     key_len    u16, key bytes
//!     value_len  u32, value bytes
//!     ttl_s      i64, remaining seconds; -1 encodes "never"
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::config::MAX_VALUE_LEN;
use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use crate::time::wall_ms;

pub const SNAPSHOT_MAGIC: u32 = 0x4348_524F;
pub const SNAPSHOT_VERSION: u32 = 1;

/// Writes and restores snapshots for one store.
pub struct SnapshotManager {
    store: Arc<Store>,
    path: PathBuf,
}

impl SnapshotManager {
    pub fn new(store: Arc<Store>, path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            path: path.into(),
        }
    }

    /// Serialize the live entry set. Returns the number of entries written.
    ///
    /// The entry iteration is weakly consistent: entries added or deleted
    /// while the snapshot runs may or may not appear.
    pub fn save(&self) -> CacheResult<usize> {
        let records = self.store.snapshot_records();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = tmp_path_for(&self.path);
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(GzEncoder::new(file, Compression::default()));

            writer.write_all(&SNAPSHOT_MAGIC.to_be_bytes())?;
            writer.write_all(&SNAPSHOT_VERSION.to_be_bytes())?;
            writer.write_all(&wall_ms().to_be_bytes())?;
            writer.write_all(&(records.len() as u32).to_be_bytes())?;

            for (key, value, ttl_remaining) in &records {
                writer.write_all(&(key.len() as u16).to_be_bytes())?;
                writer.write_all(key.as_bytes())?;
                writer.write_all(&(value.len() as u32).to_be_bytes())?;
                writer.write_all(value)?;
                // Entries about to lapse round up to one second rather than
                // coming back immortal: TTL 0 means "never" on the put path.
                let ttl: i64 = match ttl_remaining {
                    Some(seconds) => (*seconds).max(1) as i64,
                    None => -1,
                };
                writer.write_all(&ttl.to_be_bytes())?;
            }

            writer.into_inner().map_err(|e| e.into_error())?.finish()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        tracing::info!(entries = records.len(), path = %self.path.display(), "snapshot saved");
        Ok(records.len())
    }

    /// Restore entries from the snapshot file, if one exists.
    ///
    /// A missing file is not an error. A corrupt entry aborts the rest of
    /// the restore but keeps everything loaded up to that point; only a bad
    /// header fails the whole restore.
    pub fn load(&self) -> CacheResult<usize> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no snapshot file, starting empty");
            return Ok(0);
        }

        let file = File::open(&self.path)?;
        let mut reader = BufReader::new(GzDecoder::new(file));

        let magic = read_u32(&mut reader)?;
        if magic != SNAPSHOT_MAGIC {
            return Err(CacheError::BadMagic(magic));
        }
        let version = read_u32(&mut reader)?;
        if version != SNAPSHOT_VERSION {
            return Err(CacheError::UnsupportedVersion(version));
        }
        let written_at_ms = read_u64(&mut reader)?;
        let count = read_u32(&mut reader)?;

        let mut loaded = 0usize;
        for index in 0..count {
            match read_entry(&mut reader) {
                Ok((key, value, ttl)) => {
                    let ttl_seconds = if ttl < 0 { 0 } else { ttl as u64 };
                    self.store.put(key, value, ttl_seconds);
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        entry = index + 1,
                        total = count,
                        error = %e,
                        "snapshot entry unreadable, keeping entries loaded so far"
                    );
                    break;
                }
            }
        }

        tracing::info!(loaded, written_at_ms, path = %self.path.display(), "snapshot restored");
        Ok(loaded)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn read_entry<R: Read>(reader: &mut R) -> std::io::Result<(String, Bytes, i64)> {
    let key_len = read_u16(reader)? as usize;
    let mut key_bytes = vec![0u8; key_len];
    reader.read_exact(&mut key_bytes)?;
    let key = String::from_utf8(key_bytes)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "key not UTF-8"))?;

    let value_len = read_u32(reader)? as usize;
    if value_len > MAX_VALUE_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "value length exceeds limit",
        ));
    }
    let mut value = vec![0u8; value_len];
    reader.read_exact(&mut value)?;

    let ttl = read_i64(reader)?;
    Ok((key, Bytes::from(value), ttl))
}

fn read_u16<R: Read>(reader: &mut R) -> std::io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_be_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_u64<R: Read>(reader: &mut R) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

fn read_i64<R: Read>(reader: &mut R) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyKind, StoreConfig};

    fn test_store() -> Arc<Store> {
        Arc::new(Store::new(&StoreConfig {
            segments: 8,
            max_memory_bytes: 1 << 22,
            eviction_policy: PolicyKind::Lru,
        }))
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.snapshot");

        let source = test_store();
        source.put("plain".to_string(), Bytes::from_static(b"value"), 0);
        source.put("expiring".to_string(), Bytes::from_static(b"soon"), 600);
        source.put("empty".to_string(), Bytes::new(), 0);

        let written = SnapshotManager::new(source, &path).save().unwrap();
        assert_eq!(written, 3);

        let restored = test_store();
        let loaded = SnapshotManager::new(restored.clone(), &path)
            .load()
            .unwrap();
        assert_eq!(loaded, 3);

        assert_eq!(restored.get("plain"), Some(Bytes::from_static(b"value")));
        assert_eq!(restored.get("empty"), Some(Bytes::new()));
        assert_eq!(restored.ttl("plain"), -1);
        let ttl = restored.ttl("expiring");
        assert!((590..=600).contains(&ttl), "ttl was {}", ttl);
    }

    #[test]
    fn test_missing_file_is_empty_start() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SnapshotManager::new(test_store(), dir.path().join("absent.snapshot"));
        assert_eq!(manager.load().unwrap(), 0);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bogus.snapshot");
        {
            let file = File::create(&path).unwrap();
            let mut writer = GzEncoder::new(file, Compression::default());
            writer.write_all(&0xdeadbeefu32.to_be_bytes()).unwrap();
            writer.write_all(&SNAPSHOT_VERSION.to_be_bytes()).unwrap();
            writer.finish().unwrap();
        }

        let result = SnapshotManager::new(test_store(), &path).load();
        assert!(matches!(result, Err(CacheError::BadMagic(0xdeadbeef))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.snapshot");
        {
            let file = File::create(&path).unwrap();
            let mut writer = GzEncoder::new(file, Compression::default());
            writer.write_all(&SNAPSHOT_MAGIC.to_be_bytes()).unwrap();
            writer.write_all(&99u32.to_be_bytes()).unwrap();
            writer.write_all(&0u64.to_be_bytes()).unwrap();
            writer.write_all(&0u32.to_be_bytes()).unwrap();
            writer.finish().unwrap();
        }

        let result = SnapshotManager::new(test_store(), &path).load();
        assert!(matches!(result, Err(CacheError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_truncated_stream_keeps_loaded_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("truncated.snapshot");
        {
            // Header claims three entries, stream carries two.
            let file = File::create(&path).unwrap();
            let mut writer = GzEncoder::new(file, Compression::default());
            writer.write_all(&SNAPSHOT_MAGIC.to_be_bytes()).unwrap();
            writer.write_all(&SNAPSHOT_VERSION.to_be_bytes()).unwrap();
            writer.write_all(&wall_ms().to_be_bytes()).unwrap();
            writer.write_all(&3u32.to_be_bytes()).unwrap();

            for key in ["a", "b"] {
                writer.write_all(&(key.len() as u16).to_be_bytes()).unwrap();
                writer.write_all(key.as_bytes()).unwrap();
                writer.write_all(&1u32.to_be_bytes()).unwrap();
                writer.write_all(b"v").unwrap();
                writer.write_all(&(-1i64).to_be_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }

        let store = test_store();
        let loaded = SnapshotManager::new(store.clone(), &path).load().unwrap();
        assert_eq!(loaded, 2);
        assert!(store.contains("a"));
        assert!(store.contains("b"));
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.snapshot");

        let first = test_store();
        first.put("old".to_string(), Bytes::from_static(b"1"), 0);
        SnapshotManager::new(first, &path).save().unwrap();

        let second = test_store();
        second.put("new".to_string(), Bytes::from_static(b"2"), 0);
        SnapshotManager::new(second, &path).save().unwrap();

        let restored = test_store();
        SnapshotManager::new(restored.clone(), &path).load().unwrap();
        assert!(restored.contains("new"));
        assert!(!restored.contains("old"));
        // No stray temp file left behind.
        assert!(!tmp_path_for(&path).exists());
    }
}
