//! Procedural bar animation that does not look at the audio at all.
//!
//! Each bar swings low → high → low with cubic ease-in-out over its own
//! period. Ranges and periods are drawn once at construction.

use rand::Rng;

pub const DEFAULT_BARS: usize = 40;
/// Height of every bar while paused, as a fraction of the canvas.
pub const REST_LEVEL: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct BarMotion {
    low: f32,
    high: f32,
    period: f32,
}

#[derive(Debug, Clone)]
pub struct Shimmer {
    bars: Vec<BarMotion>,
}

impl Shimmer {
    pub fn new(count: usize) -> Self {
        Self::with_rng(count, &mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Self {
        let bars = (0..count)
            .map(|_| BarMotion {
                low: rng.gen_range(0.2..0.5),
                high: rng.gen_range(0.5..1.0),
                period: rng.gen_range(0.8..1.3),
            })
            .collect();
        Self { bars }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar heights at `time` seconds, each in `0.0..=1.0`.
    pub fn levels(&self, time: f64, playing: bool) -> Vec<f32> {
        if !playing {
            return vec![REST_LEVEL; self.bars.len()];
        }
        self.bars
            .iter()
            .map(|bar| {
                let phase = (time / bar.period as f64).rem_euclid(1.0) as f32;
                let t = if phase < 0.5 {
                    ease_in_out(phase * 2.0)
                } else {
                    ease_in_out((1.0 - phase) * 2.0)
                };
                bar.low + (bar.high - bar.low) * t
            })
            .collect()
    }
}

fn ease_in_out(x: f32) -> f32 {
    if x < 0.5 {
        4.0 * x * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn seeded() -> Shimmer {
        Shimmer::with_rng(DEFAULT_BARS, &mut StdRng::seed_from_u64(7))
    }

    #[test]
    fn test_paused_rests_at_twenty_percent() {
        let levels = seeded().levels(12.3, false);
        assert_eq!(levels.len(), 40);
        assert!(levels.iter().all(|&l| l == REST_LEVEL));
    }

    #[test]
    fn test_ranges() {
        let shimmer = seeded();
        for bar in &shimmer.bars {
            assert!((0.2..0.5).contains(&bar.low));
            assert!((0.5..1.0).contains(&bar.high));
            assert!((0.8..1.3).contains(&bar.period));
        }
    }

    #[test]
    fn test_cycle_low_high_low() {
        let shimmer = seeded();
        let bar = shimmer.bars[0];
        let at = |t: f64| shimmer.levels(t, true)[0];

        assert_abs_diff_eq!(at(0.0), bar.low, epsilon = 1e-5);
        assert_abs_diff_eq!(at(bar.period as f64 / 2.0), bar.high, epsilon = 1e-4);
        assert_abs_diff_eq!(at(bar.period as f64), bar.low, epsilon = 1e-4);
    }

    #[test]
    fn test_levels_stay_in_range() {
        let shimmer = seeded();
        for step in 0..200 {
            for level in shimmer.levels(step as f64 * 0.037, true) {
                assert!((0.2..=1.0).contains(&level));
            }
        }
    }

    #[test]
    fn test_ease_endpoints() {
        assert_abs_diff_eq!(ease_in_out(0.0), 0.0);
        assert_abs_diff_eq!(ease_in_out(0.5), 0.5);
        assert_abs_diff_eq!(ease_in_out(1.0), 1.0);
    }
}
