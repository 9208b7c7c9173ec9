use super::format::{self, DroppedStep, RecordSpan};
use crate::core::{Item, Result, StreamError};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Read-only random access over a finalized recording.
///
/// Clones share the same mapping and record table.
#[derive(Clone)]
pub struct ReplaySource {
    path: Arc<PathBuf>,
    mmap: Arc<Mmap>,
    spans: Arc<[RecordSpan]>,
    dropped: Arc<[DroppedStep]>,
}

impl ReplaySource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| StreamError::Io {
            path: path.clone(),
            source,
        };

        let file = File::open(&path).map_err(io_err)?;
        let file_len = file.metadata().map_err(io_err)?.len();
        if file_len < format::HEADER_LEN as u64 {
            return Err(StreamError::ReplayCorruption {
                path: path.clone(),
                offset: 0,
                reason: format!("file of {} bytes is shorter than header", file_len),
            });
        }

        // The recording is immutable once finalized, nothing writes it while mapped
        let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;

        let layout = format::scan(&mmap).map_err(|e| StreamError::ReplayCorruption {
            path: path.clone(),
            offset: e.offset,
            reason: e.reason,
        })?;

        info!(
            path = ?path,
            records = layout.records.len(),
            dropped_steps = layout.dropped.len(),
            "opened recording"
        );

        Ok(Self {
            path: Arc::new(path),
            mmap: Arc::new(mmap),
            spans: layout.records.into(),
            dropped: layout.dropped.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Exact number of recorded items
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Steps the live consumer abandoned, in recording order
    pub fn dropped_steps(&self) -> &[DroppedStep] {
        &self.dropped
    }

    /// Item at zero-based recording position `index`
    pub fn read(&self, index: usize) -> Result<Item> {
        let span = self
            .spans
            .get(index)
            .ok_or(StreamError::ReplayIndexOutOfRange {
                index,
                len: self.spans.len(),
            })?;

        format::decode_record(&self.mmap[span.offset..span.end()]).map_err(|reason| {
            StreamError::ReplayCorruption {
                path: self.path.to_path_buf(),
                offset: span.offset as u64,
                reason,
            }
        })
    }

    /// Items in recording order
    pub fn iter(&self) -> impl Iterator<Item = Result<Item>> + '_ {
        (0..self.len()).map(move |i| self.read(i))
    }
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("path", &self.path)
            .field("records", &self.spans.len())
            .field("dropped_steps", &self.dropped.len())
            .finish()
    }
}
