//! Audio visualizer: spectrum bars from an FFT analyser, or a procedural
//! shimmer, drawn frame by frame while a media element plays.
//!
//! The visualizer only talks to host traits ([`graph`], [`render::Canvas`],
//! [`visualizer::FrameScheduler`]); [`native`] implements them over WAV files
//! and PNG frames.

pub mod analyser;
pub mod error;
pub mod graph;
pub mod native;
pub mod render;
pub mod shimmer;
pub mod visualizer;

pub use analyser::SpectrumAnalyser;
pub use error::{GraphError, PlaybackError, ScopeError};
pub use graph::{AnalyzerSession, AudioContext, AudioPlatform, FrequencyAnalyser, MediaElement};
pub use render::{Canvas, Color};
pub use shimmer::Shimmer;
pub use visualizer::{FrameHandle, FrameScheduler, Style, Visualizer, VisualizerState};
