/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

mod audio;
mod chromagram;
mod classifier;
mod error;
mod finder;
mod params;
mod profiles;
mod segmentation;
mod spectrum;

pub use audio::AudioData;
pub use chromagram::Chromagram;
pub use classifier::KeyClassifier;
pub use error::{Error, Result};
pub use finder::{KeyDetectionResult, KeyDetectionSegment, KeyFinder};
pub use params::{
    Key, Parameters, Segmentation, SimilarityMeasure, TemporalWindow, ToneProfilePreset,
    TuningMethod,
};
pub use profiles::ToneProfile;
pub use segmentation::Segmenter;
pub use spectrum::{AnalyzerCache, SpectrumAnalyzer};
