//! FFT magnitude analysis with Web Audio `AnalyserNode` semantics.
//!
//! Per frame: the most recent `fft_size` samples are Blackman windowed and
//! transformed, magnitudes are scaled by `1/N`, smoothed over time, converted
//! to dB and mapped linearly from `[min_db, max_db]` onto `0..=255`.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::GraphError;
use crate::graph::FrequencyAnalyser;

pub const DEFAULT_FFT_SIZE: usize = 256;
pub const DEFAULT_SMOOTHING: f32 = 0.8;
pub const DEFAULT_MIN_DB: f32 = -100.0;
pub const DEFAULT_MAX_DB: f32 = -30.0;

pub struct SpectrumAnalyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Last `fft_size` samples, oldest first.
    time: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl SpectrumAnalyser {
    pub fn new(fft_size: usize) -> Result<Self, GraphError> {
        if !fft_size.is_power_of_two() || !(32..=32768).contains(&fft_size) {
            return Err(GraphError::InvalidFftSize(fft_size));
        }

        let mut planner = FftPlanner::new();
        Ok(Self {
            fft: planner.plan_fft_forward(fft_size),
            window: (0..fft_size).map(|i| blackman_window(i, fft_size)).collect(),
            time: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            smoothing: DEFAULT_SMOOTHING,
            min_db: DEFAULT_MIN_DB,
            max_db: DEFAULT_MAX_DB,
        })
    }

    /// Override the smoothing time constant, clamped to `0.0..=1.0`.
    pub fn with_smoothing(mut self, smoothing: f32) -> Self {
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    pub fn fft_size(&self) -> usize {
        self.time.len()
    }

    /// Append samples to the analysis window, dropping the oldest.
    pub fn write_time_domain(&mut self, samples: &[f32]) {
        let n = self.time.len();
        if samples.len() >= n {
            self.time.copy_from_slice(&samples[samples.len() - n..]);
        } else {
            self.time.rotate_left(samples.len());
            self.time[n - samples.len()..].copy_from_slice(samples);
        }
    }

    /// Run one analysis step and return the smoothed linear magnitudes.
    pub fn float_magnitudes(&mut self) -> &[f32] {
        let n = self.time.len();
        for (slot, (&sample, &w)) in self
            .scratch
            .iter_mut()
            .zip(self.time.iter().zip(self.window.iter()))
        {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.smoothing;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.scratch[k].norm() / n as f32;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
        &self.smoothed
    }

    fn to_byte(&self, magnitude: f32) -> u8 {
        if magnitude <= 0.0 {
            return 0;
        }
        let db = 20.0 * magnitude.log10();
        let scaled = 255.0 / (self.max_db - self.min_db) * (db - self.min_db);
        scaled.floor().clamp(0.0, 255.0) as u8
    }
}

impl FrequencyAnalyser for SpectrumAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.smoothed.len()
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.float_magnitudes();
        for (slot, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *slot = self.to_byte(magnitude);
        }
    }
}

/// Blackman window, periodic form (`a0 = 0.42`, `a1 = 0.5`, `a2 = 0.08`).
pub fn blackman_window(index: usize, size: usize) -> f32 {
    let x = 2.0 * PI * index as f32 / size as f32;
    0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
}
