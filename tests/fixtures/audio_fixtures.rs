//! Audio Test Fixtures
//!
//! Generated audio keeps tests reproducible with no external files.
//!
//! Audio formats match the synthesis service output:
//! - Sample rate: 24kHz
//! - Bit depth: 16-bit signed PCM
//! - Channels: Mono

use std::f32::consts::PI;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

/// Service sample rate (24kHz)
pub const SAMPLE_RATE: u32 = 24000;

/// Duration constants (in samples at 24kHz)
pub const MS_10: usize = 240;
pub const MS_100: usize = 2400;

/// Format descriptor the service returns for its default output
pub const PCM_MIME: &str = "audio/L16;codec=pcm;rate=24000";

/// Generate silence (zeros)
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate a sine wave at the specified frequency
pub fn generate_sine_wave(duration_samples: usize, frequency: f32, amplitude: f32) -> Vec<i16> {
    let max_amplitude = amplitude * i16::MAX as f32;
    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            ((2.0 * PI * frequency * t).sin() * max_amplitude) as i16
        })
        .collect()
}

/// Convert i16 samples to little-endian bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// A440 tone as raw PCM bytes
pub fn a440_bytes(duration_samples: usize) -> Vec<u8> {
    samples_to_bytes(&generate_sine_wave(duration_samples, 440.0, 0.5))
}

/// `generateContent` success body carrying `pcm` as inline audio
pub fn speech_response(pcm: &[u8], mime_type: &str) -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{
                    "inlineData": {
                        "mimeType": mime_type,
                        "data": BASE64.encode(pcm),
                    }
                }]
            },
            "finishReason": "STOP"
        }],
        "modelVersion": "gemini-2.5-flash-preview-tts"
    })
}

/// `generateContent` body with a text part and no audio
pub fn text_only_response() -> Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{ "text": "I cannot speak that." }]
            },
            "finishReason": "STOP"
        }]
    })
}

/// Service error envelope
pub fn error_response(code: u16, message: &str, status: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
            "status": status,
        }
    })
}
