/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use num_traits::FromPrimitive;

use crate::keyfinder::audio::AudioData;
use crate::keyfinder::chromagram::Chromagram;
use crate::keyfinder::classifier::KeyClassifier;
use crate::keyfinder::error::Result;
use crate::keyfinder::params::{Key, Parameters};
use crate::keyfinder::segmentation::Segmenter;
use crate::keyfinder::spectrum::AnalyzerCache;

/// One contiguous run of hops sharing a key estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeyDetectionSegment {
    pub first_hop: usize,
    pub last_hop: usize,
    pub energy: f32,
    pub key: Key,
}

/// Everything learned about a track: intermediate chromagrams, the
/// harmonic change signal, per-segment estimates and the global key.
#[derive(Clone, Debug)]
pub struct KeyDetectionResult {
    full_chromagram: Chromagram,
    one_octave_chromagram: Chromagram,
    harmonic_change_signal: Vec<f32>,
    segments: Vec<KeyDetectionSegment>,
    global_key_estimate: Key,
}

impl KeyDetectionResult {
    /// Tuning-corrected chromagram, before octave folding.
    pub fn full_chromagram(&self) -> &Chromagram {
        &self.full_chromagram
    }

    pub fn one_octave_chromagram(&self) -> &Chromagram {
        &self.one_octave_chromagram
    }

    /// One value per hop; all zeros unless cosine segmentation is enabled.
    pub fn harmonic_change_signal(&self) -> &[f32] {
        &self.harmonic_change_signal
    }

    /// Ordered segments partitioning the track's hops.
    pub fn segments(&self) -> &[KeyDetectionSegment] {
        &self.segments
    }

    pub fn global_key_estimate(&self) -> Key {
        self.global_key_estimate
    }
}

/// End-to-end key estimation over whole audio buffers.
///
/// Holds the analyser cache, so reusing one finder across tracks with the
/// same frame rate and parameters skips the spectral kernel rebuild.
pub struct KeyFinder {
    analyzer_cache: AnalyzerCache,
}

impl KeyFinder {
    pub fn new() -> Self {
        KeyFinder {
            analyzer_cache: AnalyzerCache::new(),
        }
    }

    pub fn find_key(
        &self,
        mut audio: AudioData,
        params: &Parameters,
    ) -> Result<KeyDetectionResult> {
        audio.reduce_to_mono();

        let analyzer = self.analyzer_cache.analyzer(audio.frame_rate(), params)?;
        let mut chromagram = analyzer.chromagram(&audio)?;
        log::debug!(
            "analysed {} samples into {} hops",
            audio.sample_count(),
            chromagram.hops()
        );

        chromagram.reduce_tuning_bins(params);
        let full_chromagram = chromagram.clone();
        chromagram.reduce_to_one_octave(params);
        let one_octave_chromagram = chromagram.clone();

        let segmenter = Segmenter::new(params);
        let harmonic_change_signal = segmenter.rate_of_change(&chromagram, params);
        let mut boundaries = segmenter.segment_boundaries(&harmonic_change_signal, params);
        boundaries.push(chromagram.hops()); // sentinel, so each boundary pair below is a segment

        let classifier = KeyClassifier::new(params);
        let (segments, key_weights) = collect_segments(&chromagram, &boundaries, &classifier);

        // the global estimate is the key holding the most energy; a track
        // of nothing but silent segments stays silent
        let mut global_key_estimate = Key::Silence;
        let mut strongest_weight = 0.0;
        for (index, &weight) in key_weights.iter().enumerate() {
            if weight > strongest_weight {
                strongest_weight = weight;
                global_key_estimate = Key::from_usize(index).unwrap();
            }
        }
        log::debug!(
            "classified {} segments, global estimate {}",
            segments.len(),
            global_key_estimate
        );

        Ok(KeyDetectionResult {
            full_chromagram,
            one_octave_chromagram,
            harmonic_change_signal,
            segments,
            global_key_estimate,
        })
    }
}

impl Default for KeyFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse each boundary pair into one summed chroma vector, classify it,
/// and accumulate segment energy per non-silence key.
fn collect_segments(
    chromagram: &Chromagram,
    boundaries: &[usize],
    classifier: &KeyClassifier,
) -> (Vec<KeyDetectionSegment>, [f32; 24]) {
    let mut segments = Vec::with_capacity(boundaries.len().saturating_sub(1));
    let mut key_weights = [0.0f32; 24];

    for pair in boundaries.windows(2) {
        let first_hop = pair[0];
        let last_hop = pair[1] - 1;

        let mut chroma = vec![0.0f32; chromagram.bins()];
        let mut energy = 0.0;
        for hop in first_hop..=last_hop {
            for (bin, &value) in chromagram.row(hop).iter().enumerate() {
                chroma[bin] += value;
                energy += value;
            }
        }

        let key = classifier.classify(&chroma);
        if key != Key::Silence {
            key_weights[key as usize] += energy;
        }
        segments.push(KeyDetectionSegment {
            first_hop,
            last_hop,
            energy,
            key,
        });
    }

    (segments, key_weights)
}
