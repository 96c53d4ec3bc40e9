/*
This code is based on LibKeyFinder, ported to WebAssembly-suitable Rust.

The original code can be found at:
    - https://github.com/ibsh/libKeyFinder
*/

use crate::keyfinder::error::{Error, Result};

/// A buffer of PCM samples plus the layout needed to interpret it. Channels
/// are interleaved until [`reduce_to_mono`](AudioData::reduce_to_mono) runs.
#[derive(Clone, Debug)]
pub struct AudioData {
    channels: u32,
    frame_rate: u32,
    samples: Vec<f64>,
}

impl AudioData {
    pub fn from_samples(channels: u32, frame_rate: u32, samples: Vec<f64>) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidParameter {
                name: "channels",
                reason: "must be > 0",
            });
        }
        if frame_rate == 0 {
            return Err(Error::InvalidParameter {
                name: "frame rate",
                reason: "must be > 0",
            });
        }
        Ok(AudioData {
            channels,
            frame_rate,
            samples,
        })
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    pub fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample(&self, n: usize) -> Result<f64> {
        if n >= self.samples.len() {
            return Err(Error::OutOfBounds {
                what: "sample",
                index: n,
                len: self.samples.len(),
            });
        }
        Ok(self.samples[n])
    }

    pub fn set_sample(&mut self, n: usize, value: f64) -> Result<()> {
        if n >= self.samples.len() {
            return Err(Error::OutOfBounds {
                what: "sample",
                index: n,
                len: self.samples.len(),
            });
        }
        self.samples[n] = value;
        Ok(())
    }

    /// Average interleaved channels down to a single one, in place.
    pub fn reduce_to_mono(&mut self) {
        if self.channels == 1 {
            return;
        }
        let channels = self.channels as usize;
        self.samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect();
        self.channels = 1;
    }
}
