/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use crate::keyfinder::params::{Parameters, ToneProfilePreset};

const KRUMHANSL_MAJOR: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const KRUMHANSL_MINOR: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];
const TEMPERLEY_MAJOR: [f32; 12] = [
    5.0, 2.0, 23.5, 22.0, 24.5, 24.0, 22.0, 24.5, 22.0, 23.5, 21.5, 24.0,
];
const TEMPERLEY_MINOR: [f32; 12] = [
    25.0, 22.0, 23.5, 24.5, 22.0, 24.0, 22.0, 24.5, 23.5, 22.0, 21.5, 24.0,
];
const GOMEZ_MAJOR: [f32; 12] = [
    0.82, 0.00, 0.55, 0.00, 0.53, 0.30, 0.08, 1.00, 0.00, 0.38, 0.00, 0.47,
];
const GOMEZ_MINOR: [f32; 12] = [
    0.81, 0.00, 0.53, 0.54, 0.00, 0.27, 0.07, 1.00, 0.27, 0.07, 0.10, 0.36,
];
const SHAATH_MAJOR: [f32; 12] = [
    6.6, 2.0, 3.5, 2.3, 4.6, 4.0, 2.5, 5.2, 2.4, 3.7, 2.3, 3.4,
];
const SHAATH_MINOR: [f32; 12] = [
    6.5, 2.7, 3.5, 5.4, 2.6, 3.5, 2.5, 5.2, 4.0, 2.7, 4.3, 3.2,
];

/// One major or minor scale profile, with the tonic slid to C when the
/// chromagram is C-aligned. Rotation happens at lookup time so a single
/// profile serves all twelve roots.
pub struct ToneProfile {
    weights: [f32; 12],
    tonic: usize,
    mean: f32,
}

impl ToneProfile {
    pub fn new(preset: ToneProfilePreset, major_scale: bool, params: &Parameters) -> Self {
        let weights: [f32; 12] = match (preset, major_scale) {
            (ToneProfilePreset::Silent, _) => [0.0; 12],
            (ToneProfilePreset::Krumhansl, true) => KRUMHANSL_MAJOR,
            (ToneProfilePreset::Krumhansl, false) => KRUMHANSL_MINOR,
            (ToneProfilePreset::Temperley, true) => TEMPERLEY_MAJOR,
            (ToneProfilePreset::Temperley, false) => TEMPERLEY_MINOR,
            (ToneProfilePreset::Gomez, true) => GOMEZ_MAJOR,
            (ToneProfilePreset::Gomez, false) => GOMEZ_MINOR,
            (ToneProfilePreset::Shaath, true) => SHAATH_MAJOR,
            (ToneProfilePreset::Shaath, false) => SHAATH_MINOR,
            (ToneProfilePreset::Custom, major) => {
                let table = params.custom_tone_profile();
                let start = if major { 0 } else { 12 };
                let mut weights = [0.0f32; 12];
                weights.copy_from_slice(&table[start..start + 12]);
                weights
            }
        };

        // offset from A to C (3 semitones) if the chromagram is C-aligned
        let tonic = if params.offset_to_c() { 3 } else { 0 };
        let mean = weights.iter().map(|w| w / 12.0).sum();

        ToneProfile {
            weights,
            tonic,
            mean,
        }
    }

    /// Profile weight heard at chroma position `i` when the scale under test
    /// is rooted `offset` semitones above A (0 = A, 1 = Bb, 2 = B, 3 = C...).
    fn weight_at(&self, i: usize, offset: usize) -> f32 {
        self.weights[(self.tonic + 12 + i - offset) % 12]
    }

    /// Cosine similarity between the input vector and this scale rooted at
    /// `offset`. Input is 12 values for an octave starting at A natural.
    pub fn cosine(&self, input: &[f32], offset: usize) -> f32 {
        let mut intersection = 0.0;
        let mut profile_norm = 0.0;
        let mut input_norm = 0.0;

        #[allow(clippy::needless_range_loop)]
        for i in 0..12 {
            let w = self.weight_at(i, offset);
            intersection += input[i] * w;
            profile_norm += w * w;
            input_norm += input[i] * input[i];
        }

        if profile_norm > 0.0 && input_norm > 0.0 {
            intersection / (profile_norm.sqrt() * input_norm.sqrt())
        } else {
            0.0
        }
    }

    /// Krumhansl's correlation between the input vector and this scale rooted
    /// at `offset`. The caller supplies the input mean so it is computed once
    /// per classification rather than once per rotation.
    pub fn correlation(&self, input: &[f32], input_mean: f32, offset: usize) -> f32 {
        let mut sum_top = 0.0;
        let mut sum_bottom_left = 0.0;
        let mut sum_bottom_right = 0.0;

        #[allow(clippy::needless_range_loop)]
        for i in 0..12 {
            let x_minus_x_bar = self.weight_at(i, offset) - self.mean;
            let y_minus_y_bar = input[i] - input_mean;
            sum_top += x_minus_x_bar * y_minus_y_bar;
            sum_bottom_left += x_minus_x_bar * x_minus_x_bar;
            sum_bottom_right += y_minus_y_bar * y_minus_y_bar;
        }

        if sum_bottom_left > 0.0 && sum_bottom_right > 0.0 {
            sum_top / (sum_bottom_left * sum_bottom_right).sqrt()
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_aligns_tonic_with_root() {
        let params = Parameters::default();
        let major = ToneProfile::new(ToneProfilePreset::Shaath, true, &params);

        // a pure A should project onto the tonic weight of the A major scale
        let mut input = [0.0f32; 12];
        input[9] = 1.0;
        let norm = SHAATH_MAJOR.iter().map(|w| w * w).sum::<f32>().sqrt();
        assert_relative_eq!(major.cosine(&input, 0), 6.6 / norm, epsilon = 1e-6);

        // and score its own root above any other, inside the cosine bound
        let tonic = major.cosine(&input, 0);
        for offset in 0..12 {
            let c = major.cosine(&input, offset);
            assert!((0.0..=1.0).contains(&c));
            if offset != 0 {
                assert!(tonic > c);
            }
        }
    }

    #[test]
    fn degenerate_inputs_score_zero() {
        let params = Parameters::default();
        let silence = ToneProfile::new(ToneProfilePreset::Silent, true, &params);
        let major = ToneProfile::new(ToneProfilePreset::Shaath, true, &params);

        assert_eq!(silence.cosine(&[1.0; 12], 0), 0.0);
        assert_eq!(silence.correlation(&[1.0; 12], 1.0, 0), 0.0);
        assert_eq!(major.cosine(&[0.0; 12], 0), 0.0);
        // flat input has no variance, so correlation degenerates too
        assert_eq!(major.correlation(&[1.0; 12], 1.0, 0), 0.0);
    }

    #[test]
    fn correlation_is_perfect_for_rotated_profile() {
        let params = Parameters::default();
        let major = ToneProfile::new(ToneProfilePreset::Krumhansl, true, &params);

        // lay the profile out as heard from a root 5 semitones above A
        let mut input = [0.0f32; 12];
        for (i, slot) in input.iter_mut().enumerate() {
            *slot = KRUMHANSL_MAJOR[(3 + 12 + i - 5) % 12];
        }
        let mean = input.iter().sum::<f32>() / 12.0;

        assert_relative_eq!(major.correlation(&input, mean, 5), 1.0, epsilon = 1e-5);
        for offset in 0..12 {
            let r = major.correlation(&input, mean, offset);
            assert!((-1.0 - 1e-6..=1.0 + 1e-6).contains(&r));
            if offset != 5 {
                assert!(r < 1.0 - 1e-4);
            }
        }
    }

    #[test]
    fn custom_profile_reads_parameters() {
        let mut params = Parameters::default();
        params.set_offset_to_c(false);
        let mut table = [0.0f32; 24];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = i as f32 + 1.0;
        }
        params.set_custom_tone_profile(&table).unwrap();

        let major = ToneProfile::new(ToneProfilePreset::Custom, true, &params);
        let minor = ToneProfile::new(ToneProfilePreset::Custom, false, &params);

        assert_relative_eq!(major.cosine(&table[..12], 0), 1.0, epsilon = 1e-6);
        assert!(minor.cosine(&table[..12], 0) < 0.99);
    }
}
