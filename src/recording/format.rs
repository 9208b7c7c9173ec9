//! On-disk layout of a recording.
//!
//! ```text
//! header   "FRAMETAB" | version: u32 | reserved: u32
//! record   body_len: u32 | body: bincode(Item)        (repeated)
//! dropped  0xFFFF_FFFE: u32 | received: u32 | misses: u32
//! trailer  0xFFFF_FFFF: u32 | record_count: u64
//! ```
//!
//! All integers are little-endian. Records are appended without touching earlier
//! bytes; the trailer is written once, on close. A dropped marker follows the
//! items of a batch step that was abandoned live: its `received` records are the
//! ones right before it.

use crate::core::Item;
use bincode::Options;
use std::io;

pub const MAGIC: &[u8; 8] = b"FRAMETAB";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_LEN: usize = 16;

/// Length prefix value reserved for the trailer
pub const TRAILER_MARKER: u32 = u32::MAX;
pub const TRAILER_LEN: usize = 4 + 8;

/// Length prefix value reserved for the dropped step marker
pub const DROPPED_STEP_MARKER: u32 = u32::MAX - 1;
pub const DROPPED_STEP_LEN: usize = 4 + 4 + 4;

const LEN_PREFIX: usize = 4;

/// Location of one encoded item body inside a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpan {
    pub offset: usize,
    pub len: usize,
}

impl RecordSpan {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Batch step abandoned while recording; `received` records from `start` on
/// belong to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedStep {
    pub start: usize,
    pub received: usize,
    pub misses: usize,
}

/// Record table of a scanned recording
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    pub records: Vec<RecordSpan>,
    pub dropped: Vec<DroppedStep>,
}

/// Position and reason of a malformed region found while scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatError {
    pub offset: u64,
    pub reason: String,
}

impl FormatError {
    fn at(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset: offset as u64,
            reason: reason.into(),
        }
    }
}

pub fn encode_header() -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..8].copy_from_slice(MAGIC);
    header[8..12].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

/// Fixed-width little-endian bincode; a body must hold exactly one item
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

/// Length-prefixed record ready to be appended
pub fn encode_record(item: &Item) -> io::Result<Vec<u8>> {
    let body = codec()
        .serialize(item)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    if body.len() >= DROPPED_STEP_MARKER as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("record body of {} bytes exceeds format limit", body.len()),
        ));
    }

    let mut frame = Vec::with_capacity(LEN_PREFIX + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_record(body: &[u8]) -> Result<Item, String> {
    codec().deserialize(body).map_err(|e| e.to_string())
}

pub fn encode_dropped_step(received: u32, misses: u32) -> [u8; DROPPED_STEP_LEN] {
    let mut marker = [0u8; DROPPED_STEP_LEN];
    marker[0..4].copy_from_slice(&DROPPED_STEP_MARKER.to_le_bytes());
    marker[4..8].copy_from_slice(&received.to_le_bytes());
    marker[8..12].copy_from_slice(&misses.to_le_bytes());
    marker
}

pub fn encode_trailer(record_count: u64) -> [u8; TRAILER_LEN] {
    let mut trailer = [0u8; TRAILER_LEN];
    trailer[0..4].copy_from_slice(&TRAILER_MARKER.to_le_bytes());
    trailer[4..12].copy_from_slice(&record_count.to_le_bytes());
    trailer
}

/// Walk a complete recording and return the span of every record along with
/// the dropped steps.
///
/// The recording must be finalized: a missing or mismatched trailer, a truncated
/// record, or bytes after the trailer are all reported as errors. So is a dropped
/// marker claiming records that are not there or already claimed.
pub fn scan(bytes: &[u8]) -> Result<Layout, FormatError> {
    if bytes.len() < HEADER_LEN {
        return Err(FormatError::at(0, "file shorter than header"));
    }
    if &bytes[0..8] != MAGIC {
        return Err(FormatError::at(0, "bad magic"));
    }
    let version = read_u32(bytes, 8);
    if version != FORMAT_VERSION {
        return Err(FormatError::at(
            8,
            format!("unsupported format version {}", version),
        ));
    }

    let mut layout = Layout::default();
    let mut offset = HEADER_LEN;

    loop {
        if offset + LEN_PREFIX > bytes.len() {
            return Err(FormatError::at(offset, "missing trailer (recording not finalized)"));
        }

        let len = read_u32(bytes, offset);
        if len == TRAILER_MARKER {
            if offset + TRAILER_LEN != bytes.len() {
                return Err(FormatError::at(
                    offset,
                    format!(
                        "trailer must end the file ({} bytes follow it)",
                        bytes.len() as i64 - (offset + TRAILER_LEN) as i64
                    ),
                ));
            }
            let count = read_u64(bytes, offset + 4);
            if count != layout.records.len() as u64 {
                return Err(FormatError::at(
                    offset,
                    format!(
                        "trailer declares {} records, found {}",
                        count,
                        layout.records.len()
                    ),
                ));
            }
            return Ok(layout);
        }

        if len == DROPPED_STEP_MARKER {
            if offset + DROPPED_STEP_LEN > bytes.len() {
                return Err(FormatError::at(offset, "dropped step marker runs past end of file"));
            }
            let received = read_u32(bytes, offset + 4) as usize;
            let misses = read_u32(bytes, offset + 8) as usize;

            let recorded = layout.records.len();
            let claimed = layout.dropped.last().map_or(0, |d| d.start + d.received);
            if received > recorded - claimed {
                return Err(FormatError::at(
                    offset,
                    format!(
                        "dropped step claims {} records, only {} unclaimed",
                        received,
                        recorded - claimed
                    ),
                ));
            }

            layout.dropped.push(DroppedStep {
                start: recorded - received,
                received,
                misses,
            });
            offset += DROPPED_STEP_LEN;
            continue;
        }

        let body = offset + LEN_PREFIX;
        let end = body + len as usize;
        if end > bytes.len() {
            return Err(FormatError::at(
                offset,
                format!("record of {} bytes runs past end of file", len),
            ));
        }

        layout.records.push(RecordSpan {
            offset: body,
            len: len as usize,
        });
        offset = end;
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
