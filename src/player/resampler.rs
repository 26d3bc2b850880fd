//! Sample rate conversion with rubato.
//!
//! Clips come at whatever rate they were encoded with (preview MP3s are
//! mostly 44.1kHz); the output device runs at its own rate. Without this,
//! a 44.1kHz clip on a 48kHz device plays fast and sharp.

use rubato::{FftFixedIn, Resampler as _};

use super::PlayerError;

/// Frames per resampler call.
const CHUNK_FRAMES: usize = 1024;

/// Interleaved-in, interleaved-out resampler. Passthrough when rates match.
pub struct Resampler {
    inner: Option<FftFixedIn<f32>>,
    ratio: f64,
    channels: usize,
    /// Per-channel input awaiting a full chunk
    pending: Vec<Vec<f32>>,
}

impl Resampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self, PlayerError> {
        let channels = channels.max(1) as usize;
        let inner = if input_rate == output_rate {
            None
        } else {
            tracing::debug!("Resampling {}Hz -> {}Hz", input_rate, output_rate);
            let fft = FftFixedIn::<f32>::new(
                input_rate as usize,
                output_rate as usize,
                CHUNK_FRAMES,
                2,
                channels,
            )
            .map_err(|e| PlayerError::Decode(format!("resampler: {}", e)))?;
            Some(fft)
        };

        Ok(Self {
            inner,
            ratio: output_rate as f64 / input_rate.max(1) as f64,
            channels,
            pending: vec![Vec::new(); channels],
        })
    }

    pub fn needs_resampling(&self) -> bool {
        self.inner.is_some()
    }

    /// Feed interleaved samples; returns whatever full chunks produced.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.inner.is_none() {
            return input.to_vec();
        }

        for (i, sample) in input.iter().enumerate() {
            self.pending[i % self.channels].push(*sample);
        }

        let mut output = Vec::new();
        while self.pending[0].len() >= CHUNK_FRAMES {
            let chunk: Vec<Vec<f32>> = self
                .pending
                .iter_mut()
                .map(|ch| ch.drain(..CHUNK_FRAMES).collect())
                .collect();
            self.run(&chunk, usize::MAX, &mut output);
        }
        output
    }

    /// Pad and convert the tail. Call once at end of stream.
    pub fn flush(&mut self) -> Vec<f32> {
        let remaining = self.pending[0].len();
        if self.inner.is_none() || remaining == 0 {
            return Vec::new();
        }

        let chunk: Vec<Vec<f32>> = self
            .pending
            .iter_mut()
            .map(|ch| {
                let mut padded = std::mem::take(ch);
                padded.resize(CHUNK_FRAMES, 0.0);
                padded
            })
            .collect();

        let keep = (remaining as f64 * self.ratio).ceil() as usize;
        let mut output = Vec::new();
        self.run(&chunk, keep, &mut output);
        output
    }

    fn run(&mut self, chunk: &[Vec<f32>], max_frames: usize, output: &mut Vec<f32>) {
        let Some(inner) = self.inner.as_mut() else {
            return;
        };
        match inner.process(chunk, None) {
            Ok(resampled) => {
                let frames = resampled.first().map_or(0, Vec::len).min(max_frames);
                for frame in 0..frames {
                    for ch in &resampled {
                        output.push(ch[frame]);
                    }
                }
            }
            Err(e) => tracing::warn!("Resampling error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough_when_rates_match() {
        let mut resampler = Resampler::new(48_000, 48_000, 2).unwrap();
        assert!(!resampler.needs_resampling());
        let input = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(resampler.process(&input), input);
        assert!(resampler.flush().is_empty());
    }

    #[test]
    fn test_upsampling_grows_sample_count() {
        let mut resampler = Resampler::new(24_000, 48_000, 1).unwrap();
        assert!(resampler.needs_resampling());

        let input = vec![0.25f32; 24_000];
        let mut output = resampler.process(&input);
        output.extend(resampler.flush());

        // Roughly twice as many frames, allowing for filter delay
        assert!(output.len() > 44_000, "got {}", output.len());
        assert!(output.len() < 52_000, "got {}", output.len());
    }
}
