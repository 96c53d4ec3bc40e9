/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use std::fmt;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use wasm_bindgen::prelude::wasm_bindgen;

use crate::keyfinder::error::{Error, Result};

/// Keys in chromatic order (not circle-of-fifths order), major and minor
/// interleaved, since that is the order the classifier scores slots in.
/// `Silence` sorts last so the 24 real keys map straight onto score indices.
#[wasm_bindgen]
#[derive(FromPrimitive, Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Key {
    AMajor = 0,
    AMinor = 1,
    BFlatMajor = 2,
    BFlatMinor = 3,
    BMajor = 4,
    BMinor = 5,
    CMajor = 6,
    CMinor = 7,
    DFlatMajor = 8,
    DFlatMinor = 9,
    DMajor = 10,
    DMinor = 11,
    EFlatMajor = 12,
    EFlatMinor = 13,
    EMajor = 14,
    EMinor = 15,
    FMajor = 16,
    FMinor = 17,
    GFlatMajor = 18,
    GFlatMinor = 19,
    GMajor = 20,
    GMinor = 21,
    AFlatMajor = 22,
    AFlatMinor = 23,
    Silence = 24,
}

/// Camelot wheel codes, indexed by key ordinal.
const CAMELOT_KEYS: [&str; 25] = [
    "11B", "8A", "6B", "3A", "1B", "10A", "8B", "5A", "3B", "12A", "10B", "7A", "5B", "2A", "12B",
    "9A", "7B", "4A", "2B", "11A", "9B", "6A", "4B", "1A", "SILENCE",
];

const KEY_NAMES: [&str; 12] = [
    "A", "Bb", "B", "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab",
];

impl Key {
    /// The Camelot wheel notation for this key, as used by DJ software.
    pub fn camelot(self) -> &'static str {
        CAMELOT_KEYS[self as usize]
    }

    pub fn from_camelot(code: &str) -> Option<Key> {
        CAMELOT_KEYS
            .iter()
            .position(|c| *c == code)
            .and_then(Key::from_usize)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Key::Silence {
            return write!(f, "silence");
        }
        let ordinal = *self as usize;
        let scale = if ordinal % 2 == 0 { "major" } else { "minor" };
        write!(f, "{} {}", KEY_NAMES[ordinal / 2], scale)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemporalWindow {
    Blackman,
    Hann,
    Hamming,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segmentation {
    None,
    Cosine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimilarityMeasure {
    Cosine,
    Correlation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToneProfilePreset {
    Silent,
    Krumhansl,
    Temperley,
    Gomez,
    Shaath,
    Custom,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TuningMethod {
    Harte,
    BinAdaptive,
}

/// Everything configurable about an analysis run. Setters validate and, where
/// the spectral layout is affected, regenerate the chroma bin frequency table.
#[derive(Clone, Debug)]
pub struct Parameters {
    offset_to_c: bool,
    hop_size: usize,
    fft_frame_size: usize,
    octaves: usize,
    bands_per_semitone: usize,
    hcdf_peak_picking_neighbours: usize,
    hcdf_gaussian_size: usize,
    hcdf_gaussian_sigma: f32,
    starting_freq: f32,
    direct_sk_stretch: f32,
    detuned_band_weight: f32,
    temporal_window: TemporalWindow,
    segmentation: Segmentation,
    similarity_measure: SimilarityMeasure,
    tone_profile: ToneProfilePreset,
    tuning_method: TuningMethod,
    custom_tone_profile: [f32; 24],
    bin_freqs: Vec<f32>,
}

impl Default for Parameters {
    fn default() -> Self {
        let mut params = Parameters {
            offset_to_c: true,
            hop_size: 16384 / 4,
            fft_frame_size: 16384,
            octaves: 6,
            bands_per_semitone: 1,
            hcdf_peak_picking_neighbours: 4,
            hcdf_gaussian_size: 35,
            hcdf_gaussian_sigma: 8.0,
            starting_freq: 27.5,
            direct_sk_stretch: 0.8,
            detuned_band_weight: 0.2,
            temporal_window: TemporalWindow::Blackman,
            segmentation: Segmentation::None,
            similarity_measure: SimilarityMeasure::Cosine,
            tone_profile: ToneProfilePreset::Shaath,
            tuning_method: TuningMethod::Harte,
            custom_tone_profile: [
                1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, // major
                1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, // minor
            ],
            bin_freqs: Vec::new(),
        };
        params.generate_bin_freqs();
        params
    }
}

impl Parameters {
    pub fn offset_to_c(&self) -> bool {
        self.offset_to_c
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn fft_frame_size(&self) -> usize {
        self.fft_frame_size
    }

    pub fn octaves(&self) -> usize {
        self.octaves
    }

    pub fn bands_per_semitone(&self) -> usize {
        self.bands_per_semitone
    }

    pub fn bands_per_octave(&self) -> usize {
        self.bands_per_semitone * 12
    }

    pub fn hcdf_peak_picking_neighbours(&self) -> usize {
        self.hcdf_peak_picking_neighbours
    }

    pub fn hcdf_gaussian_size(&self) -> usize {
        self.hcdf_gaussian_size
    }

    pub fn hcdf_gaussian_sigma(&self) -> f32 {
        self.hcdf_gaussian_sigma
    }

    pub fn starting_freq_a(&self) -> f32 {
        self.starting_freq
    }

    pub fn direct_sk_stretch(&self) -> f32 {
        self.direct_sk_stretch
    }

    pub fn detuned_band_weight(&self) -> f32 {
        self.detuned_band_weight
    }

    pub fn temporal_window(&self) -> TemporalWindow {
        self.temporal_window
    }

    pub fn segmentation(&self) -> Segmentation {
        self.segmentation
    }

    pub fn similarity_measure(&self) -> SimilarityMeasure {
        self.similarity_measure
    }

    pub fn tone_profile(&self) -> ToneProfilePreset {
        self.tone_profile
    }

    pub fn tuning_method(&self) -> TuningMethod {
        self.tuning_method
    }

    pub fn custom_tone_profile(&self) -> &[f32; 24] {
        &self.custom_tone_profile
    }

    /// Centre frequency of chroma bin `n`, in Hz.
    pub fn bin_freq(&self, n: usize) -> Result<f32> {
        if n >= self.bin_freqs.len() {
            return Err(Error::OutOfBounds {
                what: "bin frequency",
                index: n,
                len: self.bin_freqs.len(),
            });
        }
        Ok(self.bin_freqs[n])
    }

    pub fn last_freq(&self) -> f32 {
        self.bin_freqs[self.bin_freqs.len() - 1]
    }

    pub fn set_offset_to_c(&mut self, offset_to_c: bool) {
        self.offset_to_c = offset_to_c;
        self.generate_bin_freqs();
    }

    pub fn set_hop_size(&mut self, hop_size: usize) -> Result<()> {
        if hop_size == 0 {
            return Err(Error::InvalidParameter {
                name: "hop size",
                reason: "must be > 0",
            });
        }
        self.hop_size = hop_size;
        Ok(())
    }

    pub fn set_fft_frame_size(&mut self, frame_size: usize) -> Result<()> {
        if frame_size == 0 {
            return Err(Error::InvalidParameter {
                name: "FFT frame size",
                reason: "must be > 0",
            });
        }
        self.fft_frame_size = frame_size;
        Ok(())
    }

    pub fn set_octaves(&mut self, octaves: usize) -> Result<()> {
        if octaves == 0 {
            return Err(Error::InvalidParameter {
                name: "octaves",
                reason: "must be > 0",
            });
        }
        self.octaves = octaves;
        self.generate_bin_freqs();
        Ok(())
    }

    pub fn set_bands_per_semitone(&mut self, bands: usize) -> Result<()> {
        if bands == 0 {
            return Err(Error::InvalidParameter {
                name: "bands per semitone",
                reason: "must be > 0",
            });
        }
        self.bands_per_semitone = bands;
        self.generate_bin_freqs();
        Ok(())
    }

    pub fn set_hcdf_peak_picking_neighbours(&mut self, neighbours: usize) {
        self.hcdf_peak_picking_neighbours = neighbours;
    }

    pub fn set_hcdf_gaussian_size(&mut self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(Error::InvalidParameter {
                name: "Gaussian size",
                reason: "must be > 0",
            });
        }
        self.hcdf_gaussian_size = size;
        Ok(())
    }

    pub fn set_hcdf_gaussian_sigma(&mut self, sigma: f32) -> Result<()> {
        if sigma < 1.0 {
            return Err(Error::InvalidParameter {
                name: "Gaussian sigma",
                reason: "must be > 0",
            });
        }
        self.hcdf_gaussian_sigma = sigma;
        Ok(())
    }

    pub fn set_starting_freq_a(&mut self, freq: f32) -> Result<()> {
        if freq < 27.5 {
            return Err(Error::InvalidParameter {
                name: "starting frequency",
                reason: "must be >= 27.5 Hz",
            });
        }
        const CONCERT_PITCH_FREQS: [f32; 8] =
            [27.5, 55.0, 110.0, 220.0, 440.0, 880.0, 1760.0, 3520.0];
        if !CONCERT_PITCH_FREQS.contains(&freq) {
            return Err(Error::InvalidParameter {
                name: "starting frequency",
                reason: "must be an A (2^n * 27.5 Hz)",
            });
        }
        self.starting_freq = freq;
        self.generate_bin_freqs();
        Ok(())
    }

    pub fn set_direct_sk_stretch(&mut self, stretch: f32) -> Result<()> {
        if stretch <= 0.0 {
            return Err(Error::InvalidParameter {
                name: "spectral kernel stretch",
                reason: "must be > 0",
            });
        }
        self.direct_sk_stretch = stretch;
        Ok(())
    }

    pub fn set_detuned_band_weight(&mut self, weight: f32) -> Result<()> {
        if weight < 0.0 {
            return Err(Error::InvalidParameter {
                name: "detuned band weight",
                reason: "must be >= 0",
            });
        }
        self.detuned_band_weight = weight;
        Ok(())
    }

    pub fn set_temporal_window(&mut self, window: TemporalWindow) {
        self.temporal_window = window;
    }

    pub fn set_segmentation(&mut self, segmentation: Segmentation) {
        self.segmentation = segmentation;
    }

    pub fn set_similarity_measure(&mut self, measure: SimilarityMeasure) {
        self.similarity_measure = measure;
    }

    pub fn set_tone_profile(&mut self, profile: ToneProfilePreset) {
        self.tone_profile = profile;
    }

    pub fn set_tuning_method(&mut self, method: TuningMethod) {
        self.tuning_method = method;
    }

    pub fn set_custom_tone_profile(&mut self, profile: &[f32]) -> Result<()> {
        if profile.len() != 24 {
            return Err(Error::InvalidParameter {
                name: "custom tone profile",
                reason: "must have 24 elements",
            });
        }
        if profile.iter().any(|w| *w < 0.0) {
            return Err(Error::InvalidParameter {
                name: "custom tone profile",
                reason: "elements must be >= 0",
            });
        }
        self.custom_tone_profile.copy_from_slice(profile);
        Ok(())
    }

    /// True when `other` would produce the same spectral kernel, window and
    /// FFT plan. Hop size is deliberately absent: it moves frame starts but
    /// never changes spectral state, so analyzers can be shared across it.
    pub fn equivalent_for_spectral_analysis(&self, other: &Parameters) -> bool {
        self.temporal_window == other.temporal_window
            && self.bands_per_semitone == other.bands_per_semitone
            && self.starting_freq == other.starting_freq
            && self.octaves == other.octaves
            && self.offset_to_c == other.offset_to_c
            && self.fft_frame_size == other.fft_frame_size
            && self.direct_sk_stretch == other.direct_sk_stretch
    }

    fn generate_bin_freqs(&mut self) {
        let bpo = self.bands_per_octave();
        let freq_ratio = 2f32.powf(1.0 / bpo as f32);
        let concert_pitch_bin = self.bands_per_semitone / 2;
        self.bin_freqs = Vec::with_capacity(self.octaves * bpo);
        let mut oct_freq = self.starting_freq;
        for _ in 0..self.octaves {
            let mut bin_freq = oct_freq;
            // start each octave three semitones up when rooting at C
            if self.offset_to_c {
                bin_freq *= freq_ratio.powi(3);
            }
            // detuned bands below the octave's first concert pitch
            for j in 0..concert_pitch_bin {
                self.bin_freqs
                    .push(bin_freq / freq_ratio.powi((concert_pitch_bin - j) as i32));
            }
            // then step up band by band from concert pitch
            for _ in concert_pitch_bin..bpo {
                self.bin_freqs.push(bin_freq);
                bin_freq *= freq_ratio;
            }
            oct_freq *= 2.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn bin_freqs_track_equal_temperament() {
        let params = Parameters::default();
        // A440 sits three octaves and nine semitones above the 32.7 Hz start
        assert_relative_eq!(params.bin_freq(45).unwrap(), 440.0, epsilon = 1e-2);
        for i in 0..60 {
            assert_relative_eq!(
                params.bin_freq(i + 12).unwrap(),
                2.0 * params.bin_freq(i).unwrap(),
                max_relative = 1e-6
            );
        }
        for i in 1..72 {
            assert!(params.bin_freq(i).unwrap() > params.bin_freq(i - 1).unwrap());
        }
    }

    #[test]
    fn bin_freqs_start_at_c_when_offset() {
        let params = Parameters::default();
        assert_relative_eq!(params.bin_freq(0).unwrap(), 32.7032, epsilon = 1e-3);

        let mut plain = Parameters::default();
        plain.set_offset_to_c(false);
        assert_relative_eq!(plain.bin_freq(0).unwrap(), 27.5, epsilon = 1e-6);
    }

    #[test]
    fn concert_pitch_sits_at_the_middle_band() {
        let mut params = Parameters::default();
        params.set_offset_to_c(false);
        params.set_bands_per_semitone(3).unwrap();
        // the middle band of the first semitone is the in-tune reference pitch
        assert_relative_eq!(params.bin_freq(1).unwrap(), 27.5, epsilon = 1e-4);
        assert!(params.bin_freq(0).unwrap() < 27.5);
        assert_eq!(params.bands_per_octave(), 36);
    }

    #[test]
    fn frequency_lookup_is_bounds_checked() {
        let params = Parameters::default();
        assert!(params.bin_freq(71).is_ok());
        assert_eq!(
            params.bin_freq(72),
            Err(Error::OutOfBounds {
                what: "bin frequency",
                index: 72,
                len: 72
            })
        );
    }

    #[test]
    fn setters_reject_degenerate_values() {
        let mut params = Parameters::default();
        assert!(params.set_hop_size(0).is_err());
        assert!(params.set_fft_frame_size(0).is_err());
        assert!(params.set_octaves(0).is_err());
        assert!(params.set_bands_per_semitone(0).is_err());
        assert!(params.set_hcdf_gaussian_size(0).is_err());
        assert!(params.set_hcdf_gaussian_sigma(0.0).is_err());
        assert!(params.set_hcdf_gaussian_sigma(0.5).is_err());
        assert!(params.set_hcdf_gaussian_sigma(1.0).is_ok());
        assert!(params.set_starting_freq_a(26.0).is_err());
        assert!(params.set_starting_freq_a(100.0).is_err());
        assert!(params.set_direct_sk_stretch(0.0).is_err());
        assert!(params.set_detuned_band_weight(-0.1).is_err());
        assert!(params.set_custom_tone_profile(&[1.0; 23]).is_err());
        let mut negative = [1.0f32; 24];
        negative[7] = -1.0;
        assert!(params.set_custom_tone_profile(&negative).is_err());

        // rejected values leave the previous configuration in place
        assert_eq!(params.hop_size(), 4096);
        assert_eq!(params.octaves(), 6);

        params.set_starting_freq_a(55.0).unwrap();
        assert_relative_eq!(params.bin_freq(0).unwrap(), 65.4064, epsilon = 1e-2);
    }

    #[test]
    fn camelot_codes_are_unique_and_round_trip() {
        let mut seen = HashSet::new();
        for k in 0..=24 {
            let key = Key::from_usize(k).unwrap();
            let code = key.camelot();
            assert!(seen.insert(code));
            assert_eq!(Key::from_camelot(code), Some(key));
        }
        assert_eq!(Key::AMinor.camelot(), "8A");
        assert_eq!(Key::CMajor.camelot(), "8B");
        assert_eq!(Key::from_camelot("7A"), Some(Key::DMinor));
        assert_eq!(Key::from_camelot("13A"), None);
    }

    #[test]
    fn spectral_equivalence_ignores_non_spectral_fields() {
        let params = Parameters::default();

        let mut same = params.clone();
        same.set_hop_size(8192).unwrap();
        same.set_segmentation(Segmentation::Cosine);
        same.set_tone_profile(ToneProfilePreset::Temperley);
        assert!(params.equivalent_for_spectral_analysis(&same));

        let mut different = params.clone();
        different.set_fft_frame_size(8192).unwrap();
        assert!(!params.equivalent_for_spectral_analysis(&different));

        let mut unshifted = params.clone();
        unshifted.set_offset_to_c(false);
        assert!(!params.equivalent_for_spectral_analysis(&unshifted));
    }

    #[test]
    fn key_names() {
        assert_eq!(Key::AMajor.to_string(), "A major");
        assert_eq!(Key::BFlatMinor.to_string(), "Bb minor");
        assert_eq!(Key::Silence.to_string(), "silence");
    }
}
