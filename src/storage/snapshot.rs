//! Point-in-time snapshot of a record store.
//!
//! Layout: magic, version byte, 12-byte timestamp (secs + nanos), record
//! count, then one length-prefixed bincode record per entry. Saves go to a
//! temp file that atomically replaces the previous snapshot.

use crate::error::{MeetspotError, Result};
use crate::types::EntityRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const SNAPSHOT_MAGIC: &[u8] = b"MEETSPOT_SNAPSHOT";
const SNAPSHOT_VERSION: u8 = 1;

/// Upper bound on a single encoded record; anything larger is corruption.
const MAX_RECORD_BYTES: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all records. A missing or empty file is an empty snapshot.
    pub fn load(&self) -> Result<Vec<EntityRecord>> {
        if !self.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        if file.metadata()?.len() == 0 {
            return Ok(Vec::new());
        }

        let mut reader = BufReader::new(file);

        let mut magic = vec![0u8; SNAPSHOT_MAGIC.len()];
        reader.read_exact(&mut magic)?;
        if magic != SNAPSHOT_MAGIC {
            return Err(MeetspotError::InvalidFormat);
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != SNAPSHOT_VERSION {
            return Err(MeetspotError::InvalidFormat);
        }

        let mut timestamp = [0u8; 12];
        reader.read_exact(&mut timestamp)?;

        let count = read_u64(&mut reader)?;
        let mut records = Vec::with_capacity(count.min(1 << 20) as usize);

        for _ in 0..count {
            let len = read_u64(&mut reader)?;
            if len > MAX_RECORD_BYTES {
                return Err(MeetspotError::InvalidFormat);
            }
            let mut buf = vec![0u8; len as usize];
            reader.read_exact(&mut buf)?;
            let record: EntityRecord = bincode::deserialize(&buf)
                .map_err(|e| MeetspotError::Serialization(e.to_string()))?;
            records.push(record);
        }

        log::info!(
            "Loaded {} records from snapshot {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    /// Write `records` as the new snapshot.
    pub fn save<'a, I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a EntityRecord>,
    {
        let encoded = records
            .into_iter()
            .map(|record| {
                bincode::serialize(record).map_err(|e| MeetspotError::Serialization(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let temp_path = self.temp_path();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(SNAPSHOT_MAGIC)?;
        writer.write_all(&[SNAPSHOT_VERSION])?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        writer.write_all(&now.as_secs().to_le_bytes())?;
        writer.write_all(&now.subsec_nanos().to_le_bytes())?;

        writer.write_all(&(encoded.len() as u64).to_le_bytes())?;
        for bytes in &encoded {
            writer.write_all(&(bytes.len() as u64).to_le_bytes())?;
            writer.write_all(bytes)?;
        }

        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&temp_path, &self.path)?;

        log::info!(
            "Saved {} records to snapshot {}",
            encoded.len(),
            self.path.display()
        );
        Ok(encoded.len())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        if let Some(name) = temp.file_name() {
            let mut new_name = name.to_string_lossy().into_owned();
            new_name.push_str(".tmp");
            temp.set_file_name(new_name);
        }
        temp
    }
}

fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("meetings.snap"));

        let records = vec![
            EntityRecord::new("a", "AMNA", GeoPoint::new(51.02723, -113.9928005))
                .with_attribute("weekday", 3i64)
                .with_sort_key(480.0),
            EntityRecord::new("b", "Courage", GeoPoint::new(51.0117555, -114.0837796)),
        ];

        assert_eq!(snapshot.save(&records).unwrap(), 2);
        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("absent.snap"));
        assert!(snapshot.load().unwrap().is_empty());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.snap");
        std::fs::write(&path, b"definitely not a snapshot file").unwrap();
        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, MeetspotError::InvalidFormat));
    }
}
