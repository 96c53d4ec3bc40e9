/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use std::f64::consts::PI;
use std::sync::Arc;

use parking_lot::Mutex;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use crate::keyfinder::audio::AudioData;
use crate::keyfinder::chromagram::Chromagram;
use crate::keyfinder::error::{Error, Result};
use crate::keyfinder::params::{Parameters, TemporalWindow};

/// Temporal window coefficients for one analysis frame.
fn temporal_window(shape: TemporalWindow, frame_size: usize) -> Vec<f64> {
    match shape {
        // apodize's blackman is the four-term Blackman-Harris variant, not
        // the classic three-term window used here
        TemporalWindow::Blackman => {
            let n = (frame_size - 1) as f64;
            (0..frame_size)
                .map(|i| {
                    0.42 - 0.5 * f64::cos((2.0 * PI * i as f64) / n)
                        + 0.08 * f64::cos((4.0 * PI * i as f64) / n)
                })
                .collect()
        }
        TemporalWindow::Hann => apodize::hanning_iter(frame_size).collect(),
        TemporalWindow::Hamming => apodize::hamming_iter(frame_size).collect(),
    }
}

// An unscaled Hann lobe; the missing 0.5 factor washes out in normalisation.
fn kernel_window(n: f32, width: f32) -> f32 {
    1.0 - f32::cos((2.0 * std::f32::consts::PI * n) / width)
}

/// Sparse projection from an FFT spectrum onto frequency-domain chroma bins.
///
/// Each chroma bin reads a short contiguous run of FFT bins centred on its
/// frequency; `offsets[b]` is the first FFT bin of that run and `weights[b]`
/// holds the coefficients from there. The run width scales with the centre
/// frequency, so the response closely models a constant-Q transform.
struct SpectralKernel {
    offsets: Vec<usize>,
    weights: Vec<Vec<f32>>,
}

impl SpectralKernel {
    fn build(frame_rate: u32, params: &Parameters) -> Result<Self> {
        let bins = params.octaves() * params.bands_per_octave();
        let frame_size = params.fft_frame_size();
        let q_factor = params.direct_sk_stretch()
            * (2f32.powf(1.0 / params.bands_per_octave() as f32) - 1.0);

        let mut offsets = vec![0usize; bins];
        let mut weights = vec![Vec::new(); bins];
        for (bin, bin_weights) in weights.iter_mut().enumerate() {
            let centre = params.bin_freq(bin)? * frame_size as f32 / frame_rate as f32;
            let width = centre * q_factor;
            let begin = centre - (width / 2.0);
            let end = begin + width;
            let mut sum = 0.0;
            for fft_bin in 0..frame_size {
                if (fft_bin as f32) < begin {
                    continue;
                }
                if fft_bin as f32 > end {
                    break;
                }
                if offsets[bin] == 0 {
                    // 0 doubles as the unset sentinel; DC never falls in a run
                    offsets[bin] = fft_bin;
                }
                let coefficient = kernel_window(fft_bin as f32 - begin, width);
                sum += coefficient;
                bin_weights.push(coefficient);
            }
            // normalise by the coefficient sum, scaled back up by the bin
            // frequency to counter the 1/f energy rolloff of musical signals
            let bin_freq = params.bin_freq(bin)?;
            for weight in bin_weights.iter_mut() {
                *weight = *weight / sum * bin_freq;
            }
        }
        Ok(SpectralKernel { offsets, weights })
    }
}

struct FftScratch {
    frame: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

/// Windowed FFT analysis of overlapping frames, projected through a
/// [`SpectralKernel`] into one chroma vector per hop.
///
/// Construction is expensive (kernel weights plus FFT planning), so analysers
/// are meant to be built once per frame rate and shared; see [`AnalyzerCache`].
pub struct SpectrumAnalyzer {
    bins: usize,
    hop_size: usize,
    window: Vec<f64>,
    kernel: SpectralKernel,
    fft: Arc<dyn Fft<f64>>,
    scratch: Mutex<FftScratch>,
}

impl SpectrumAnalyzer {
    pub fn new(frame_rate: u32, params: &Parameters) -> Result<Self> {
        if frame_rate == 0 {
            return Err(Error::InvalidParameter {
                name: "frame rate",
                reason: "must be positive",
            });
        }
        let frame_size = params.fft_frame_size();
        let nyquist = frame_rate as f32 / 2.0;
        if params.last_freq() > nyquist {
            log::warn!(
                "highest chroma bin ({} Hz) is above the Nyquist frequency ({} Hz)",
                params.last_freq(),
                nyquist
            );
        }

        let kernel = SpectralKernel::build(frame_rate, params)?;
        let starved = kernel.weights.iter().filter(|w| w.is_empty()).count();
        if starved > 0 {
            log::warn!(
                "{} chroma bins cover no FFT bins at frame rate {} and will stay silent",
                starved,
                frame_rate
            );
        }

        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(frame_size);
        let scratch = FftScratch {
            frame: vec![Complex64::default(); frame_size],
            scratch: vec![Complex64::default(); fft.get_inplace_scratch_len()],
        };

        Ok(SpectrumAnalyzer {
            bins: params.octaves() * params.bands_per_octave(),
            hop_size: params.hop_size(),
            window: temporal_window(params.temporal_window(), frame_size),
            kernel,
            fft,
            scratch: Mutex::new(scratch),
        })
    }

    /// Analyse mono PCM into a chromagram of one row per hop.
    ///
    /// The hop count is `sample_count / hop_size + 1`; frames that run past
    /// the end of the audio are zero padded.
    pub fn chromagram(&self, audio: &AudioData) -> Result<Chromagram> {
        let samples = audio.samples();
        let hops = samples.len() / self.hop_size + 1;
        let mut chromagram = Chromagram::new(hops, self.bins);

        let mut state = self.scratch.lock();
        let FftScratch { frame, scratch } = &mut *state;
        for (hop, start) in (0..samples.len()).step_by(self.hop_size).enumerate() {
            for (j, value) in frame.iter_mut().enumerate() {
                let amplitude = match samples.get(start + j) {
                    Some(&sample) => sample * self.window[j],
                    None => 0.0, // zero pad past the end of the PCM data
                };
                *value = Complex64::new(amplitude, 0.0);
            }
            self.fft.process_with_scratch(frame, scratch);

            for bin in 0..self.bins {
                let offset = self.kernel.offsets[bin];
                let mut sum = 0.0;
                for (j, weight) in self.kernel.weights[bin].iter().enumerate() {
                    sum += frame[offset + j].norm() as f32 * weight;
                }
                chromagram.set_magnitude(hop, bin, sum)?;
            }
        }
        Ok(chromagram)
    }
}

/// Process-wide pool of spectrum analysers keyed by frame rate and the
/// spectral subset of the parameters that built them.
///
/// Hop size deliberately plays no part in the match: it shapes how often
/// frames are taken, not the transform itself, so the first analyser built
/// for a given transform also fixes the hop size used with it.
pub struct AnalyzerCache {
    analyzers: Mutex<Vec<CacheEntry>>,
}

struct CacheEntry {
    frame_rate: u32,
    params: Parameters,
    analyzer: Arc<SpectrumAnalyzer>,
}

impl AnalyzerCache {
    pub fn new() -> Self {
        AnalyzerCache {
            analyzers: Mutex::new(Vec::new()),
        }
    }

    /// Fetch the analyser for this frame rate and parameter set, building
    /// one on first use.
    pub fn analyzer(
        &self,
        frame_rate: u32,
        params: &Parameters,
    ) -> Result<Arc<SpectrumAnalyzer>> {
        let mut analyzers = self.analyzers.lock();
        for entry in analyzers.iter() {
            if entry.frame_rate == frame_rate
                && entry.params.equivalent_for_spectral_analysis(params)
            {
                return Ok(Arc::clone(&entry.analyzer));
            }
        }

        log::debug!("building a spectrum analyser for frame rate {}", frame_rate);
        let analyzer = Arc::new(SpectrumAnalyzer::new(frame_rate, params)?);
        analyzers.push(CacheEntry {
            frame_rate,
            params: params.clone(),
            analyzer: Arc::clone(&analyzer),
        });
        Ok(analyzer)
    }
}

impl Default for AnalyzerCache {
    fn default() -> Self {
        Self::new()
    }
}
