//! Per-bucket JSON artifacts.
//!
//! Each bucket's result set is written once, to `{dir}/{bucket id}.json`,
//! via a temporary file that is renamed into place so a crash never leaves
//! a truncated artifact behind.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::bucket::TraversalBucket;
use crate::config::CrawlConfig;
use crate::crawler::{PositionRecord, ResultSet};
use crate::error::CrawlError;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(config.dataset_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, bucket: &TraversalBucket) -> PathBuf {
        self.dir.join(format!("{}.json", bucket.id()))
    }

    pub fn exists(&self, bucket: &TraversalBucket) -> bool {
        self.path_for(bucket).is_file()
    }

    /// Atomically write `records` as the artifact of `bucket`.
    pub fn write(
        &self,
        bucket: &TraversalBucket,
        records: &[PositionRecord],
    ) -> Result<PathBuf, CrawlError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.path_for(bucket);
        let tmp = path.with_extension("json.tmp");

        let written = write_json(&tmp, records).and_then(|()| {
            fs::rename(&tmp, &path)?;
            Ok(())
        });
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        info!(path = %path.display(), positions = records.len(), "Artifact written");
        Ok(path)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<ResultSet, CrawlError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Every artifact in the directory, keyed by file stem, sorted by name.
    pub fn load_all(&self) -> Result<Vec<(String, ResultSet)>, CrawlError> {
        let dir = glob::Pattern::escape(&self.dir.to_string_lossy());
        let pattern = format!("{dir}/*.json");
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| CrawlError::Config(format!("bad artifact pattern {pattern}: {e}")))?
            .filter_map(|p| p.ok())
            .collect();
        paths.sort();

        paths
            .into_iter()
            .map(|path| {
                let id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Self::load(&path).map(|records| (id, records))
            })
            .collect()
    }
}

fn write_json(path: &Path, records: &[PositionRecord]) -> Result<(), CrawlError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Number of distinct positions across several result sets.
pub fn distinct_positions<'a>(sets: impl IntoIterator<Item = &'a ResultSet>) -> usize {
    sets.into_iter()
        .flatten()
        .map(|record| &record.fen)
        .collect::<HashSet<_>>()
        .len()
}
