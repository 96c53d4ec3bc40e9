/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use num_traits::FromPrimitive;

use crate::keyfinder::params::{Key, Parameters, SimilarityMeasure, ToneProfilePreset};
use crate::keyfinder::profiles::ToneProfile;

/// Scores a single chroma vector against all 24 keys, plus silence.
pub struct KeyClassifier {
    major: ToneProfile,
    minor: ToneProfile,
    silence: ToneProfile,
    similarity_measure: SimilarityMeasure,
}

impl KeyClassifier {
    pub fn new(params: &Parameters) -> Self {
        KeyClassifier {
            major: ToneProfile::new(params.tone_profile(), true, params),
            minor: ToneProfile::new(params.tone_profile(), false, params),
            silence: ToneProfile::new(ToneProfilePreset::Silent, true, params),
            similarity_measure: params.similarity_measure(),
        }
    }

    /// Pick the key whose tone profile best matches a 12-bin chroma vector.
    ///
    /// Scores are laid out as major/minor pairs per root, matching the [`Key`]
    /// discriminants. The silence profile's score seeds the scan, and ties
    /// keep the incumbent, so an all-zero vector comes back as silence.
    pub fn classify(&self, chroma: &[f32]) -> Key {
        let mut scores = [0.0f32; 24];
        let mut best_score = match self.similarity_measure {
            SimilarityMeasure::Correlation => {
                let chroma_mean = chroma.iter().sum::<f32>() / chroma.len() as f32;
                for root in 0..12 {
                    scores[root * 2] = self.major.correlation(chroma, chroma_mean, root);
                    scores[root * 2 + 1] = self.minor.correlation(chroma, chroma_mean, root);
                }
                self.silence.correlation(chroma, chroma_mean, 0)
            }
            SimilarityMeasure::Cosine => {
                for root in 0..12 {
                    scores[root * 2] = self.major.cosine(chroma, root);
                    scores[root * 2 + 1] = self.minor.cosine(chroma, root);
                }
                self.silence.cosine(chroma, 0)
            }
        };

        let mut best_match = Key::Silence;
        for (index, &score) in scores.iter().enumerate() {
            if score > best_score {
                best_score = score;
                best_match = Key::from_usize(index).unwrap();
            }
        }
        best_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_chroma_classifies_as_silence() {
        let mut params = Parameters::default();
        for measure in [SimilarityMeasure::Cosine, SimilarityMeasure::Correlation] {
            params.set_similarity_measure(measure);
            let classifier = KeyClassifier::new(&params);
            assert_eq!(Key::Silence, classifier.classify(&[0.0; 12]));
        }
    }

    #[test]
    fn major_scale_classifies_as_its_major_key() {
        let params = Parameters::default();
        let classifier = KeyClassifier::new(&params);

        // C major scale over C-rooted chroma bins
        let mut chroma = [0.0; 12];
        for pitch_class in [0, 2, 4, 5, 7, 9, 11] {
            chroma[pitch_class] = 1.0;
        }
        assert_eq!(Key::CMajor, classifier.classify(&chroma));

        // the same scale pattern rooted a fourth up
        let mut chroma = [0.0; 12];
        for pitch_class in [0, 2, 4, 5, 7, 9, 11] {
            chroma[(pitch_class + 5) % 12] = 1.0;
        }
        assert_eq!(Key::FMajor, classifier.classify(&chroma));
    }

    #[test]
    fn flat_chroma_prefers_the_first_minor() {
        // every rotation of a profile scores the same against a flat vector,
        // and the minor profiles edge out the majors, so the scan settles on
        // the first minor slot
        let params = Parameters::default();
        let classifier = KeyClassifier::new(&params);
        assert_eq!(Key::AMinor, classifier.classify(&[1.0; 12]));
    }

    #[test]
    fn correlation_matches_a_rotated_profile() {
        const KRUMHANSL_MAJOR: [f32; 12] = [
            6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
        ];

        let mut params = Parameters::default();
        params.set_tone_profile(ToneProfilePreset::Krumhansl);
        params.set_similarity_measure(SimilarityMeasure::Correlation);
        let classifier = KeyClassifier::new(&params);

        // the major profile laid out for a root of D correlates perfectly
        // with DMajor and strictly worse with everything else
        let mut chroma = [0.0; 12];
        for (i, value) in chroma.iter_mut().enumerate() {
            *value = KRUMHANSL_MAJOR[(3 + 12 + i - 5) % 12];
        }
        assert_eq!(Key::DMajor, classifier.classify(&chroma));
    }
}
