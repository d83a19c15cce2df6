//! Test Fixtures Module
//!
//! Programmatically generated PCM and synthesis-service payloads.

// Allow dead code in test fixtures - not every suite uses every helper
#![allow(dead_code)]

pub mod audio_fixtures;

pub use audio_fixtures::*;
