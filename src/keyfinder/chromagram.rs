/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use crate::keyfinder::error::{Error, Result};
use crate::keyfinder::params::{Parameters, TuningMethod};

/// A hops-by-bins matrix of spectral magnitudes, one row per analysis hop.
/// Tuning correction and octave folding rewrite the bin dimension in place.
#[derive(Clone, Debug)]
pub struct Chromagram {
    hops: usize,
    bins: usize,
    data: Vec<f32>,
}

/// Histogram slot for a fractional peak location, on a circular scale of ten
/// slots per band with the centre slot at concert tuning.
fn tuning_slot(location: f32, bands_per_semitone: usize) -> usize {
    let slots = bands_per_semitone * 10;
    let sub_location = (location % bands_per_semitone as f32) * 10.0;
    ((sub_location + 0.5) as usize + 5) % slots
}

impl Chromagram {
    pub fn new(hops: usize, bins: usize) -> Self {
        Chromagram {
            hops,
            bins,
            data: vec![0.0; hops * bins],
        }
    }

    pub fn hops(&self) -> usize {
        self.hops
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn magnitude(&self, hop: usize, bin: usize) -> Result<f32> {
        self.check_bounds(hop, bin)?;
        Ok(self.data[hop * self.bins + bin])
    }

    pub fn set_magnitude(&mut self, hop: usize, bin: usize, value: f32) -> Result<()> {
        self.check_bounds(hop, bin)?;
        self.data[hop * self.bins + bin] = value;
        Ok(())
    }

    pub(crate) fn row(&self, hop: usize) -> &[f32] {
        &self.data[hop * self.bins..(hop + 1) * self.bins]
    }

    fn check_bounds(&self, hop: usize, bin: usize) -> Result<()> {
        if hop >= self.hops {
            return Err(Error::OutOfBounds {
                what: "hop",
                index: hop,
                len: self.hops,
            });
        }
        if bin >= self.bins {
            return Err(Error::OutOfBounds {
                what: "bin",
                index: bin,
                len: self.bins,
            });
        }
        Ok(())
    }

    /// Collapse a bands-per-semitone grid down to 12 bins per octave using
    /// the configured tuning method. No-op if already at semitone resolution.
    pub fn reduce_tuning_bins(&mut self, params: &Parameters) {
        let octaves = params.octaves();
        if self.bins == 12 * octaves {
            return;
        }
        match params.tuning_method() {
            TuningMethod::BinAdaptive => self.tuning_bin_adaptive(params),
            TuningMethod::Harte => self.tuning_harte(params),
        }
    }

    fn tuning_harte(&mut self, params: &Parameters) {
        // Only an approximation of Harte's method, based on his thesis rather
        // than his code, but it holds up on the recordings he cites as
        // difficult from a tuning perspective.
        let octaves = params.octaves();
        let bands_per_semitone = (self.bins / octaves) / 12;
        let slots = bands_per_semitone * 10;

        // find peaks: anything higher energy than the hop mean and both
        // neighbours. Taking all peaks regardless of the mean lowers accuracy.
        let mut peak_locations: Vec<Vec<f32>> = Vec::with_capacity(self.hops);
        let mut peak_magnitudes: Vec<Vec<f32>> = Vec::with_capacity(self.hops);
        for hop in 0..self.hops {
            let row = &self.data[hop * self.bins..(hop + 1) * self.bins];
            let mean = row.iter().sum::<f32>() / self.bins as f32;
            let mut locations = Vec::new();
            let mut magnitudes = Vec::new();
            for bin in 1..self.bins - 1 {
                let alpha = row[bin - 1];
                let beta = row[bin];
                let gamma = row[bin + 1];
                if beta > mean && beta > alpha && beta > gamma {
                    // quadratic interpolation refines the location; the
                    // magnitude interpolation's quarter weight truncates to
                    // zero upstream, leaving the raw peak height
                    let offset = ((alpha - gamma) / (alpha - 2.0 * beta + gamma)) / 2.0;
                    locations.push(bin as f32 + offset);
                    magnitudes.push(beta);
                }
            }
            peak_locations.push(locations);
            peak_magnitudes.push(magnitudes);
        }

        // distribution of peaks over one semitone's subdivisions
        let mut distribution = vec![0.0f32; slots];
        for hop in 0..self.hops {
            for (&location, &magnitude) in peak_locations[hop].iter().zip(&peak_magnitudes[hop]) {
                distribution[tuning_slot(location, bands_per_semitone)] += magnitude / 1000.0;
            }
        }

        // the subdivision most of the track is tuned to
        let mut tuning_max = 0.0f32;
        let mut tuning_peak: i32 = -1;
        for (slot, value) in distribution.iter().enumerate() {
            if *value > tuning_max {
                tuning_max = *value;
                tuning_peak = slot as i32;
            }
        }

        // discard any peak sitting 0.2 semitones or more from the tuning
        // peak, circularly (e.g. 6 slots away for 3 bands per semitone)
        let mut keep = vec![false; slots];
        for i in (1 - 2 * (bands_per_semitone as i32))..(2 * (bands_per_semitone as i32)) {
            keep[((tuning_peak + i + slots as i32) % slots as i32) as usize] = true;
        }

        let bins = 12 * octaves;
        let mut twelve_bpo = vec![0.0f32; self.hops * bins];
        for hop in 0..self.hops {
            for (&location, &magnitude) in peak_locations[hop].iter().zip(&peak_magnitudes[hop]) {
                if keep[tuning_slot(location, bands_per_semitone)] {
                    let tuned_location = location as usize / bands_per_semitone;
                    twelve_bpo[hop * bins + tuned_location] += magnitude;
                }
            }
        }
        self.data = twelve_bpo;
        self.bins = bins;
    }

    fn tuning_bin_adaptive(&mut self, params: &Parameters) {
        // Tunes each semitone bin separately rather than the whole recording;
        // aimed at dance music with individually detuned elements rather than
        // tracks that are internally consistent but off concert pitch.
        let octaves = params.octaves();
        let bands_per_semitone = (self.bins / octaves) / 12;
        let bins = 12 * octaves;
        let mut twelve_bpo = vec![0.0f32; self.hops * bins];
        for semitone in 0..bins {
            let mut band_totals = vec![0.0f32; bands_per_semitone];
            for hop in 0..self.hops {
                for (band, total) in band_totals.iter_mut().enumerate() {
                    *total += self.data[hop * self.bins + semitone * bands_per_semitone + band];
                }
            }
            // the highest energy band keeps full weight for this semitone
            let mut in_tune_band = 0;
            let mut max = band_totals[0];
            for (band, total) in band_totals.iter().enumerate().skip(1) {
                if *total > max {
                    max = *total;
                    in_tune_band = band;
                }
            }
            for hop in 0..self.hops {
                let mut weighted = 0.0f32;
                for band in 0..bands_per_semitone {
                    let weight = if band == in_tune_band {
                        1.0
                    } else {
                        params.detuned_band_weight()
                    };
                    weighted +=
                        self.data[hop * self.bins + semitone * bands_per_semitone + band] * weight;
                }
                twelve_bpo[hop * bins + semitone] = weighted;
            }
        }
        self.data = twelve_bpo;
        self.bins = bins;
    }

    /// Average each pitch class across all octaves, leaving one octave's
    /// worth of bins per hop. No-op for single-octave analysis.
    pub fn reduce_to_one_octave(&mut self, params: &Parameters) {
        let octaves = params.octaves();
        let bands_per_octave = self.bins / octaves;
        if bands_per_octave == self.bins {
            return;
        }
        let mut one_octave = vec![0.0f32; self.hops * bands_per_octave];
        for hop in 0..self.hops {
            for bin in 0..bands_per_octave {
                let mut single_bin = 0.0f32;
                for octave in 0..octaves {
                    single_bin += self.data[hop * self.bins + octave * bands_per_octave + bin];
                }
                one_octave[hop * bands_per_octave + bin] = single_bin / octaves as f32;
            }
        }
        self.data = one_octave;
        self.bins = bands_per_octave;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_access_is_bounds_checked() {
        let mut ch = Chromagram::new(2, 12);
        ch.set_magnitude(1, 11, 3.0).unwrap();
        assert_ulps_eq!(ch.magnitude(1, 11).unwrap(), 3.0);
        assert_eq!(
            ch.magnitude(2, 0),
            Err(Error::OutOfBounds {
                what: "hop",
                index: 2,
                len: 2
            })
        );
        assert_eq!(
            ch.magnitude(0, 12),
            Err(Error::OutOfBounds {
                what: "bin",
                index: 12,
                len: 12
            })
        );
        assert!(ch.set_magnitude(0, 12, 1.0).is_err());
    }

    #[test]
    fn octave_fold_averages_pitch_classes() {
        let mut params = Parameters::default();
        params.set_octaves(2).unwrap();
        let mut ch = Chromagram::new(1, 24);
        for bin in 0..24 {
            ch.set_magnitude(0, bin, bin as f32).unwrap();
        }
        ch.reduce_to_one_octave(&params);
        assert_eq!(ch.bins(), 12);
        assert_eq!(ch.hops(), 1);
        for bin in 0..12 {
            assert_ulps_eq!(ch.magnitude(0, bin).unwrap(), bin as f32 + 6.0);
        }
    }

    #[test]
    fn octave_fold_is_noop_for_single_octave() {
        let mut params = Parameters::default();
        params.set_octaves(1).unwrap();
        let mut ch = Chromagram::new(1, 12);
        ch.set_magnitude(0, 7, 2.5).unwrap();
        ch.reduce_to_one_octave(&params);
        assert_eq!(ch.bins(), 12);
        assert_ulps_eq!(ch.magnitude(0, 7).unwrap(), 2.5);
    }

    #[test]
    fn tuning_is_noop_at_semitone_resolution() {
        let params = Parameters::default();
        let mut ch = Chromagram::new(2, 72);
        ch.set_magnitude(1, 45, 1.5).unwrap();
        ch.reduce_tuning_bins(&params);
        assert_eq!(ch.bins(), 72);
        assert_ulps_eq!(ch.magnitude(1, 45).unwrap(), 1.5);
    }

    #[test]
    fn harte_tuning_keeps_the_dominant_tuning() {
        let mut params = Parameters::default();
        params.set_octaves(1).unwrap();
        params.set_bands_per_semitone(3).unwrap();

        let mut ch = Chromagram::new(2, 36);
        // hop 0: a strong in-tune peak on the middle band of semitone 5
        ch.set_magnitude(0, 16, 10.0).unwrap();
        // hop 1: a weak peak a third of a semitone sharp
        ch.set_magnitude(1, 17, 1.0).unwrap();

        ch.reduce_tuning_bins(&params);
        assert_eq!(ch.bins(), 12);
        assert_eq!(ch.hops(), 2);
        assert_ulps_eq!(ch.magnitude(0, 5).unwrap(), 10.0);
        for bin in 0..12 {
            if bin != 5 {
                assert_ulps_eq!(ch.magnitude(0, bin).unwrap(), 0.0);
            }
            // the detuned peak is dropped entirely
            assert_ulps_eq!(ch.magnitude(1, bin).unwrap(), 0.0);
        }
    }

    #[test]
    fn bin_adaptive_tuning_weights_detuned_bands() {
        let mut params = Parameters::default();
        params.set_octaves(1).unwrap();
        params.set_bands_per_semitone(3).unwrap();
        params.set_tuning_method(TuningMethod::BinAdaptive);

        let mut ch = Chromagram::new(1, 36);
        ch.set_magnitude(0, 0, 0.5).unwrap();
        ch.set_magnitude(0, 1, 1.0).unwrap();
        ch.set_magnitude(0, 2, 0.25).unwrap();

        ch.reduce_tuning_bins(&params);
        assert_eq!(ch.bins(), 12);
        // winning band at full weight, the rest at the detuned weight of 0.2
        assert_relative_eq!(ch.magnitude(0, 0).unwrap(), 1.15, epsilon = 1e-6);
        for bin in 1..12 {
            assert_ulps_eq!(ch.magnitude(0, bin).unwrap(), 0.0);
        }
    }
}
