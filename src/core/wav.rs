//! WAV container codec.
//!
//! The synthesis service returns raw PCM plus a MIME-like format descriptor
//! (for example `audio/L16;codec=pcm;rate=24000`). This module parses that
//! descriptor, wraps PCM in the canonical 44-byte RIFF/WAVE header, and reads
//! the header back when segments are merged for export.
//!
//! All multi-byte numeric fields are little-endian; the four-character tags
//! are written as ASCII.

use std::time::Duration;

use thiserror::Error;

/// Size of the canonical PCM WAV header.
pub const HEADER_SIZE: usize = 44;

/// Default channel count (the service only produces mono).
pub const DEFAULT_NUM_CHANNELS: u16 = 1;
/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;
/// Default bit depth.
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

const RIFF_TAG: &[u8; 4] = b"RIFF";
const WAVE_TAG: &[u8; 4] = b"WAVE";
const FMT_TAG: &[u8; 4] = b"fmt ";
const DATA_TAG: &[u8; 4] = b"data";

// =============================================================================
// Errors
// =============================================================================

/// Malformed container errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// Buffer cannot hold a full header
    #[error("Malformed container: expected at least {HEADER_SIZE} bytes, got {0}")]
    TooShort(usize),

    /// A four-character tag is not where the canonical layout puts it
    #[error("Malformed container: expected '{expected}' tag at offset {offset}")]
    BadTag {
        expected: &'static str,
        offset: usize,
    },

    /// The data chunk length field points past the end of the buffer
    #[error("Malformed container: data length {declared} exceeds payload of {available} bytes")]
    LengthMismatch { declared: usize, available: usize },
}

// =============================================================================
// PCM Format
// =============================================================================

/// PCM parameters recovered from a format descriptor or a WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PcmFormat {
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            num_channels: DEFAULT_NUM_CHANNELS,
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
        }
    }
}

impl PcmFormat {
    /// Bytes per second of audio, or `None` if it does not fit the 32-bit
    /// header field.
    pub fn checked_byte_rate(&self) -> Option<u32> {
        let bits = u64::from(self.sample_rate)
            * u64::from(self.num_channels)
            * u64::from(self.bits_per_sample);
        u32::try_from(bits / 8).ok()
    }

    /// Bytes per sample frame (all channels), or `None` if it does not fit
    /// the 16-bit header field.
    pub fn checked_block_align(&self) -> Option<u16> {
        let bits = u32::from(self.num_channels) * u32::from(self.bits_per_sample);
        u16::try_from(bits / 8).ok()
    }

    /// Whether every derived header field is representable.
    pub fn is_representable(&self) -> bool {
        self.checked_byte_rate().is_some() && self.checked_block_align().is_some()
    }

    /// Bytes per second of audio, saturating at `u32::MAX`.
    #[inline]
    pub fn byte_rate(&self) -> u32 {
        self.checked_byte_rate().unwrap_or(u32::MAX)
    }

    /// Bytes per sample frame (all channels), saturating at `u16::MAX`.
    #[inline]
    pub fn block_align(&self) -> u16 {
        self.checked_block_align().unwrap_or(u16::MAX)
    }

    /// Duration of `pcm_len` bytes of audio in this format.
    pub fn duration_of(&self, pcm_len: usize) -> Duration {
        let byte_rate = self.byte_rate();
        if byte_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(pcm_len as f64 / f64::from(byte_rate))
    }
}

/// Parse a descriptor of the shape `type/subtype;param=value;...`.
///
/// - subtype `L<digits>` sets `bits_per_sample`
/// - parameter `rate` sets `sample_rate`
/// - `num_channels` is always 1
///
/// Unknown parameters are ignored. Malformed or zero numbers keep the
/// defaults, as does any combination whose byte rate or block alignment
/// would not fit the header fields.
///
/// # Example
///
/// ```rust
/// use linecast::core::wav::{parse_format, PcmFormat};
///
/// let fmt = parse_format("audio/L16;rate=24000");
/// assert_eq!(fmt, PcmFormat { num_channels: 1, sample_rate: 24000, bits_per_sample: 16 });
/// assert_eq!(parse_format("audio/ogg"), PcmFormat::default());
/// ```
pub fn parse_format(descriptor: &str) -> PcmFormat {
    let mut format = PcmFormat::default();
    let mut tokens = descriptor.split(';').map(str::trim);

    if let Some(mime) = tokens.next() {
        let subtype = mime.split_once('/').map(|(_, sub)| sub.trim()).unwrap_or("");
        if let Some(bits) = subtype
            .strip_prefix('L')
            .and_then(|digits| digits.parse::<u16>().ok())
            .filter(|bits| *bits > 0)
        {
            let candidate = PcmFormat {
                bits_per_sample: bits,
                ..format
            };
            if candidate.is_representable() {
                format = candidate;
            } else {
                tracing::debug!(descriptor, "Ignoring out-of-range bit depth");
            }
        }
    }

    for param in tokens {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        if key.trim().eq_ignore_ascii_case("rate") {
            let candidate = value
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|rate| *rate > 0)
                .map(|rate| PcmFormat {
                    sample_rate: rate,
                    ..format
                })
                .filter(PcmFormat::is_representable);
            match candidate {
                Some(candidate) => format = candidate,
                None => tracing::debug!(descriptor, "Ignoring malformed rate parameter"),
            }
        }
    }

    format
}

// =============================================================================
// Encoding / Decoding
// =============================================================================

/// Wrap raw PCM bytes in a 44-byte WAV header.
pub fn encode(pcm: &[u8], format: &PcmFormat) -> Vec<u8> {
    let data_size = u32::try_from(pcm.len()).unwrap_or(u32::MAX);

    let mut wav = Vec::with_capacity(HEADER_SIZE + pcm.len());

    // RIFF header
    wav.extend_from_slice(RIFF_TAG);
    wav.extend_from_slice(&data_size.saturating_add(36).to_le_bytes());
    wav.extend_from_slice(WAVE_TAG);

    // fmt subchunk
    wav.extend_from_slice(FMT_TAG);
    wav.extend_from_slice(&16u32.to_le_bytes()); // Subchunk1Size (16 for PCM)
    wav.extend_from_slice(&1u16.to_le_bytes()); // AudioFormat (1 = PCM)
    wav.extend_from_slice(&format.num_channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&format.byte_rate().to_le_bytes());
    wav.extend_from_slice(&format.block_align().to_le_bytes());
    wav.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    // data subchunk
    wav.extend_from_slice(DATA_TAG);
    wav.extend_from_slice(&data_size.to_le_bytes());
    wav.extend_from_slice(pcm);

    wav
}

/// Read the PCM parameters from a canonical WAV header.
///
/// Returns the format and the offset at which PCM data begins (always 44).
pub fn decode_header(buffer: &[u8]) -> Result<(PcmFormat, usize), ContainerError> {
    if buffer.len() < HEADER_SIZE {
        return Err(ContainerError::TooShort(buffer.len()));
    }
    expect_tag(buffer, 0, RIFF_TAG, "RIFF")?;
    expect_tag(buffer, 8, WAVE_TAG, "WAVE")?;
    expect_tag(buffer, 36, DATA_TAG, "data")?;

    let format = PcmFormat {
        num_channels: read_u16(buffer, 22),
        sample_rate: read_u32(buffer, 24),
        bits_per_sample: read_u16(buffer, 34),
    };
    Ok((format, HEADER_SIZE))
}

/// The PCM payload following the header, bounded by the data length field.
pub fn pcm_payload(buffer: &[u8]) -> Result<&[u8], ContainerError> {
    let (_, offset) = decode_header(buffer)?;
    let declared = read_u32(buffer, 40) as usize;
    let available = buffer.len() - offset;
    if declared > available {
        return Err(ContainerError::LengthMismatch {
            declared,
            available,
        });
    }
    Ok(&buffer[offset..offset + declared])
}

/// Playback duration of an encoded container.
pub fn duration(buffer: &[u8]) -> Result<Duration, ContainerError> {
    let (format, _) = decode_header(buffer)?;
    let payload = pcm_payload(buffer)?;
    Ok(format.duration_of(payload.len()))
}

fn expect_tag(
    buffer: &[u8],
    offset: usize,
    tag: &[u8; 4],
    expected: &'static str,
) -> Result<(), ContainerError> {
    if &buffer[offset..offset + 4] == tag {
        Ok(())
    } else {
        Err(ContainerError::BadTag { expected, offset })
    }
}

#[inline]
fn read_u16(buffer: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buffer[offset], buffer[offset + 1]])
}

#[inline]
fn read_u32(buffer: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buffer[offset],
        buffer[offset + 1],
        buffer[offset + 2],
        buffer[offset + 3],
    ])
}
