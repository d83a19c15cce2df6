//! Merge every cached segment into one WAV file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::cache::SegmentCache;
use super::wav::{self, ContainerError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nothing to export")]
    Empty,

    /// Carries 0-based indices; the message lists 1-based line numbers.
    #[error("Export incomplete: missing audio for line(s) {}", line_list(.missing))]
    Incomplete { missing: Vec<usize> },

    #[error(transparent)]
    Malformed(#[from] ContainerError),

    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

fn line_list(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|index| (index + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Concatenate the PCM of segments `0..segment_count` under a single header.
///
/// The header parameters come from the first segment. Nothing is produced
/// unless every segment is cached.
pub fn merge_all(segment_count: usize, cache: &SegmentCache) -> Result<Vec<u8>, ExportError> {
    if segment_count == 0 {
        return Err(ExportError::Empty);
    }
    let buffers = cache
        .collect(segment_count)
        .map_err(|missing| ExportError::Incomplete { missing })?;

    let (format, _) = wav::decode_header(&buffers[0])?;

    let mut payloads = Vec::with_capacity(buffers.len());
    for (index, buffer) in buffers.iter().enumerate() {
        let (segment_format, _) = wav::decode_header(buffer)?;
        if segment_format != format {
            warn!(line = index + 1, ?segment_format, ?format, "Segment format differs from first segment");
        }
        payloads.push(wav::pcm_payload(buffer)?);
    }

    let pcm = payloads.concat();
    info!(
        segments = segment_count,
        pcm_bytes = pcm.len(),
        duration_ms = format.duration_of(pcm.len()).as_millis() as u64,
        "Merged segments"
    );
    Ok(wav::encode(&pcm, &format))
}

/// Default export file name: `tts-audio-<unix millis>.wav`.
pub fn export_filename() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("tts-audio-{millis}.wav")
}

/// Write a merged export into `dir` and return the file's path.
pub fn write_export(dir: &Path, wav: &[u8]) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename());
    std::fs::write(&path, wav)?;
    info!(path = %path.display(), bytes = wav.len(), "Export written");
    Ok(path)
}
