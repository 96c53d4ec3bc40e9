/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use crate::keyfinder::chromagram::Chromagram;
use crate::keyfinder::params::{Parameters, Segmentation};

/// Splits a track into harmonically stable stretches. The no-op variant
/// treats the whole track as one segment.
pub enum Segmenter {
    NoSegmentation,
    CosineHcdf,
}

impl Segmenter {
    pub fn new(params: &Parameters) -> Self {
        match params.segmentation() {
            Segmentation::Cosine => Segmenter::CosineHcdf,
            Segmentation::None => Segmenter::NoSegmentation,
        }
    }

    /// Harmonic change signal: one value per hop, higher where the chroma
    /// content is shifting.
    pub fn rate_of_change(&self, ch: &Chromagram, params: &Parameters) -> Vec<f32> {
        match self {
            Segmenter::NoSegmentation => vec![0.0; ch.hops()],
            Segmenter::CosineHcdf => cosine_rate_of_change(ch, params),
        }
    }

    /// Segment-opening hop indices. Always begins with hop 0 so at least one
    /// segment exists; the caller appends the sentinel end boundary.
    pub fn segment_boundaries(&self, rate_of_change: &[f32], params: &Parameters) -> Vec<usize> {
        match self {
            Segmenter::NoSegmentation => vec![0],
            Segmenter::CosineHcdf => {
                pick_peaks(rate_of_change, params.hcdf_peak_picking_neighbours())
            }
        }
    }
}

fn cosine_rate_of_change(ch: &Chromagram, params: &Parameters) -> Vec<f32> {
    let hops = ch.hops();
    let bins = ch.bins();
    let gaussian_size = params.hcdf_gaussian_size();
    let gaussian_sigma = params.hcdf_gaussian_sigma();

    // per-hop concentration measure; flat hops score high, single-bin hops
    // low, so it moves when the harmonic content spreads or narrows
    let mut cosine = Vec::with_capacity(hops);
    for hop in 0..hops {
        let mut top = 0.0f32;
        let mut bottom = 0.0f32;
        for &magnitude in ch.row(hop) {
            top += magnitude;
            bottom += magnitude * magnitude;
        }
        let cos = if bottom > 0.0 {
            top / (bottom.sqrt() * (bins as f32 * 2.0f32.sqrt()).sqrt())
        } else {
            0.0
        };
        cosine.push(cos);
    }

    let half = (gaussian_size / 2) as i32;
    let gaussian: Vec<f32> = (0..gaussian_size)
        .map(|k| {
            let x = (k as i32 - half) as f32;
            f32::exp(-(x * x) / (2.0 * gaussian_sigma * gaussian_sigma))
        })
        .collect();

    // smooth, truncating the kernel at the signal edges
    let mut smoothed = vec![0.0f32; hops];
    for (hop, value) in smoothed.iter_mut().enumerate() {
        let mut conv = 0.0f32;
        for (k, g) in gaussian.iter().enumerate() {
            let frame = hop as i32 - half + k as i32;
            if frame >= 0 && (frame as usize) < hops {
                conv += cosine[frame as usize] * g;
            }
        }
        *value = conv;
    }

    // rate of change of the smoothed signal; the scale constants keep the
    // output range compatible with other KeyFinder frontends
    let mut rate_of_change = vec![0.0f32; hops];
    for hop in 1..hops {
        let change = ((smoothed[hop] - smoothed[hop - 1]) / 90.0).abs();
        rate_of_change[hop] = change / 0.16;
    }
    // hop 0 has no predecessor; mirror the second value
    if hops > 1 {
        rate_of_change[0] = rate_of_change[1];
    }
    rate_of_change
}

fn pick_peaks(rate_of_change: &[f32], neighbours: usize) -> Vec<usize> {
    // hop 0 always opens a segment
    let mut changes = vec![0];
    let neighbours = neighbours as i32;
    for hop in 0..rate_of_change.len() {
        let mut peak = true;
        for i in -neighbours..=neighbours {
            let neighbour = hop as i32 + i;
            if i == 0 || neighbour < 0 || neighbour as usize >= rate_of_change.len() {
                continue;
            }
            // equal neighbours count against, so plateaus never peak
            if rate_of_change[neighbour as usize] >= rate_of_change[hop] {
                peak = false;
            }
        }
        if peak && changes.last() != Some(&hop) {
            changes.push(hop);
        }
    }
    changes
}
