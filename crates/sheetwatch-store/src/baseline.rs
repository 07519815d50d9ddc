//! Durable per-document baselines.
//!
//! One gzip-compressed JSON file per monitored document, keyed by basename.
//! Saves go through a sibling temp file, are verified by re-reading the
//! written bytes, and land with an atomic rename, so a reader only ever
//! observes the prior baseline or the new one.

use crate::StoreError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sheetwatch_common::Baseline;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

pub const BASELINE_SUFFIX: &str = ".baseline.json.gz";

pub struct BaselineStore {
    dir: PathBuf,
}

impl BaselineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Baselines are keyed by basename, not full path. Two monitored
    /// documents sharing a basename collide on the same baseline file and
    /// the last writer wins.
    pub fn key_for(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string())
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}{BASELINE_SUFFIX}"))
    }

    pub fn load(&self, key: &str) -> Result<Option<Baseline>, StoreError> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_reader(GzDecoder::new(BufReader::new(file)))
            .map(Some)
            .map_err(|e| StoreError::malformed(&path, e))
    }

    pub fn save(&self, key: &str, baseline: &Baseline) -> Result<(), StoreError> {
        let target = self.path_for(key);
        let json = serde_json::to_vec(baseline).map_err(|e| StoreError::verify(&target, e))?;

        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        let mut encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?;

        // Verify the written bytes parse back before touching the target.
        // Any failure here drops the temp file and leaves the prior
        // baseline observable.
        let reread = File::open(tmp.path())?;
        let parsed: Baseline = serde_json::from_reader(GzDecoder::new(BufReader::new(reread)))
            .map_err(|e| StoreError::verify(&target, e))?;
        if parsed.content_hash != baseline.content_hash {
            return Err(StoreError::verify(&target, "content hash mismatch on reread"));
        }

        tmp.persist(&target).map_err(|e| StoreError::Io(e.error))?;
        tracing::debug!(key, path = %target.display(), "baseline saved");
        Ok(())
    }
}
