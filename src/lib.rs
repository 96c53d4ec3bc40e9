extern crate apodize;
extern crate rustfft;

#[cfg(test)]
#[macro_use]
extern crate approx;

#[cfg(all(target_arch = "wasm32", target_os = "unknown"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

pub mod analyzer;
pub mod keyfinder;

pub use keyfinder::{
    AudioData, Key, KeyDetectionResult, KeyDetectionSegment, KeyFinder, Parameters,
};

use analyzer::KeyDetector;
use wasm_bindgen::prelude::{wasm_bindgen, JsError};

/// Estimate the key of a mono f32 sample buffer, as a Camelot wheel code.
#[wasm_bindgen]
pub fn detect_key(samples: &[f32], sample_rate: u32) -> Result<String, JsError> {
    let detector = KeyDetector::new(sample_rate);
    let result = detector.detect(samples)?;
    Ok(result.global_key_estimate().camelot().to_string())
}
