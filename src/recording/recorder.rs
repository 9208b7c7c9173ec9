use super::format;
use crate::core::{Item, Result, StreamError};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Outcome of a finalized recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    pub records: u64,
    pub bytes: u64,
}

/// Append-only single writer for a recording file.
///
/// Every `record` reaches the OS before it returns; the header goes out with the
/// first flush. The first failure poisons the recorder: later calls fail as well
/// and the file is never finalized.
pub struct Recorder {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: u64,
    bytes: u64,
    poisoned: bool,
}

impl Recorder {
    /// Create (or truncate) `path` and write the header
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StreamError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|source| StreamError::Io {
                path: path.clone(),
                source,
            })?;

        let mut recorder = Self {
            path,
            writer: Some(BufWriter::new(file)),
            records: 0,
            bytes: 0,
            poisoned: false,
        };

        let header = format::encode_header();
        recorder.buffer(&header)?;
        info!(path = ?recorder.path, "recording started");
        Ok(recorder)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of items recorded so far
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn record(&mut self, item: &Item) -> Result<()> {
        self.ensure_writable()?;

        let frame = match format::encode_record(item) {
            Ok(frame) => frame,
            Err(source) => return Err(self.fail(source)),
        };
        self.write_bytes(&frame)?;
        self.records += 1;

        debug!(
            producer_id = item.producer_id,
            frame_id = item.frame_id,
            index = self.records - 1,
            "recorded item"
        );
        Ok(())
    }

    /// Mark the last `received` items as a batch step abandoned by the consumer
    pub fn record_dropped_step(&mut self, received: usize, misses: usize) -> Result<()> {
        self.ensure_writable()?;

        let marker = format::encode_dropped_step(
            u32::try_from(received).unwrap_or(u32::MAX),
            u32::try_from(misses).unwrap_or(u32::MAX),
        );
        self.write_bytes(&marker)?;

        debug!(received, misses, after = self.records, "recorded dropped step");
        Ok(())
    }

    /// Write the trailer and sync. The file is immutable afterwards.
    pub fn close(mut self) -> Result<RecordingSummary> {
        self.ensure_writable()?;

        let trailer = format::encode_trailer(self.records);
        self.write_bytes(&trailer)?;

        let writer = self.writer.take().ok_or_else(|| StreamError::RecordingWrite {
            path: self.path.clone(),
            source: io::Error::other("recorder already closed"),
        })?;
        let file = match writer.into_inner() {
            Ok(file) => file,
            Err(e) => return Err(self.fail(e.into_error())),
        };
        if let Err(source) = file.sync_all() {
            return Err(self.fail(source));
        }

        let summary = RecordingSummary {
            path: self.path.clone(),
            records: self.records,
            bytes: self.bytes,
        };
        info!(path = ?summary.path, records = summary.records, bytes = summary.bytes, "recording finalized");
        Ok(summary)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.poisoned || self.writer.is_none() {
            return Err(StreamError::RecordingWrite {
                path: self.path.clone(),
                source: io::Error::other("recorder unusable after an earlier failure"),
            });
        }
        Ok(())
    }

    fn buffer(&mut self, bytes: &[u8]) -> Result<()> {
        self.push(bytes, false)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.push(bytes, true)
    }

    fn push(&mut self, bytes: &[u8], flush: bool) -> Result<()> {
        let result = match self.writer.as_mut() {
            Some(writer) => writer
                .write_all(bytes)
                .and_then(|_| if flush { writer.flush() } else { Ok(()) }),
            None => Err(io::Error::other("recorder already closed")),
        };
        match result {
            Ok(()) => {
                self.bytes += bytes.len() as u64;
                Ok(())
            }
            Err(source) => Err(self.fail(source)),
        }
    }

    fn fail(&mut self, source: io::Error) -> StreamError {
        self.poisoned = true;
        StreamError::RecordingWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.writer.is_some() && !self.poisoned {
            warn!(
                path = ?self.path,
                records = self.records,
                "recorder dropped without close; recording left unfinalized"
            );
        }
    }
}
