//! Framing helpers over a mono waveform.
//!
//! Frames are centred: the signal is zero-padded by `frame_length / 2` on both
//! sides so that frame `i` is centred on sample `i * hop_length`, which keeps
//! energy and spectra on the same time axis as the pitch estimator's output.

use rustfft::{FftPlanner, num_complex::Complex};

/// Number of centred frames for a signal of `len` samples.
pub fn frame_count(len: usize, hop_length: usize) -> usize {
    if len == 0 || hop_length == 0 {
        0
    } else {
        1 + len / hop_length
    }
}

/// Time in seconds of frame `index`.
pub fn frame_time(index: usize, hop_length: usize, sample_rate: u32) -> f64 {
    index as f64 * hop_length as f64 / sample_rate as f64
}

/// Iterate centred frames; samples outside the signal read as zero.
fn centered_frame(samples: &[f32], index: usize, frame_length: usize, hop_length: usize) -> Vec<f32> {
    let pad = frame_length / 2;
    let start = (index * hop_length) as isize - pad as isize;
    (0..frame_length)
        .map(|k| {
            let pos = start + k as isize;
            if pos < 0 || pos as usize >= samples.len() {
                0.0
            } else {
                samples[pos as usize]
            }
        })
        .collect()
}

/// Root-mean-square energy per centred frame.
pub fn frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    let n = frame_count(samples.len(), hop_length);
    if frame_length == 0 {
        return vec![0.0; n];
    }
    (0..n)
        .map(|i| {
            let frame = centered_frame(samples, i, frame_length, hop_length);
            let power = frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>()
                / frame_length as f64;
            power.sqrt()
        })
        .collect()
}

/// Periodic Hann window of length `n`.
fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos())
        .collect()
}

/// Magnitude spectrogram: one `frame_length / 2 + 1` bin vector per centred frame.
pub fn stft_magnitudes(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<Vec<f64>> {
    let n = frame_count(samples.len(), hop_length);
    if frame_length == 0 || n == 0 {
        return Vec::new();
    }

    let window = hann(frame_length);
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(frame_length);
    let bins = frame_length / 2 + 1;

    (0..n)
        .map(|i| {
            let frame = centered_frame(samples, i, frame_length, hop_length);
            let mut buffer: Vec<Complex<f32>> = frame
                .iter()
                .zip(window.iter())
                .map(|(&s, &w)| Complex { re: s * w, im: 0.0 })
                .collect();
            fft.process(&mut buffer);
            buffer.iter().take(bins).map(|c| c.norm() as f64).collect()
        })
        .collect()
}

/// Centre frequency of FFT bin `bin`.
pub fn bin_frequency(bin: usize, frame_length: usize, sample_rate: u32) -> f64 {
    bin as f64 * sample_rate as f64 / frame_length as f64
}
