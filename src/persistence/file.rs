//! On-disk index files: atomic writes, memory-mapped reads.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::Result;
use crate::forest::ForestIndex;

use super::codec::{self, IndexHeader, HEADER_SIZE};

impl ForestIndex {
    /// Write the index to `path`.
    ///
    /// The blob goes to a sibling temp file which is fsynced and renamed over
    /// `path`, so readers never observe a half-written index.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = codec::encode(self);
        let tmp = temp_path(path);

        {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        tracing::info!(path = %path.display(), bytes = bytes.len(), "index saved");
        Ok(())
    }

    /// Load an index written by [`ForestIndex::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<ForestIndex> {
        let path = path.as_ref();
        let start = Instant::now();
        let file = File::open(path)?;

        // Best-effort mmap; fall back to a plain read if mapping fails.
        let index = match unsafe { memmap2::Mmap::map(&file) } {
            Ok(mmap) => codec::decode(&mmap)?,
            Err(e) => {
                tracing::debug!(error = %e, "mmap unavailable, reading index into memory");
                codec::decode(&fs::read(path)?)?
            }
        };

        tracing::info!(
            path = %path.display(),
            vectors = index.len(),
            trees = index.trees().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "index loaded"
        );
        Ok(index)
    }
}

/// Read only the fixed header of an index file.
pub fn read_header(path: impl AsRef<Path>) -> Result<IndexHeader> {
    use std::io::Read;

    let mut file = File::open(path)?;
    let mut buf = [0u8; HEADER_SIZE];
    file.read_exact(&mut buf)
        .map_err(|_| crate::error::ForestError::corrupt("file too small for header"))?;
    IndexHeader::from_bytes(&buf)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
