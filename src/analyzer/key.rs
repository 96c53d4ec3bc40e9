use crate::keyfinder::{AudioData, KeyDetectionResult, KeyFinder, Parameters, Result};

/// High-level key detection over mono f32 sample buffers.
///
/// Wraps a [`KeyFinder`] with a fixed sample rate and parameter set, so a
/// detector can be reused across tracks without rebuilding spectral kernels.
pub struct KeyDetector {
    sample_rate: u32,
    params: Parameters,
    finder: KeyFinder,
}

impl KeyDetector {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_parameters(sample_rate, Parameters::default())
    }

    pub fn with_parameters(sample_rate: u32, params: Parameters) -> Self {
        KeyDetector {
            sample_rate,
            params,
            finder: KeyFinder::new(),
        }
    }

    pub fn detect(&self, samples: &[f32]) -> Result<KeyDetectionResult> {
        let samples = samples.iter().map(|&x| x as f64).collect();
        let audio = AudioData::from_samples(1, self.sample_rate, samples)?;
        self.finder.find_key(audio, &self.params)
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }
}
