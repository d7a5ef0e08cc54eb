//! Host abstractions for the audio side of the visualizer.
//!
//! These mirror what a browser offers: a media element that plays a source
//! URL, an audio context that can tap an element into an analyser, and the
//! analyser itself. [`crate::native`] implements them over WAV files.

use crate::error::{GraphError, PlaybackError};

pub type ElementId = u64;

/// Something that plays audio from a source URL.
pub trait MediaElement {
    fn id(&self) -> ElementId;

    /// Assign a new source. Like the browser load algorithm, this pauses.
    fn set_src(&mut self, src: &str);

    fn src(&self) -> String;

    /// Request playback. Loading or decoding problems surface here.
    fn play(&mut self) -> Result<(), PlaybackError>;

    fn pause(&mut self);

    fn is_paused(&self) -> bool;
}

/// Byte frequency data in the Web Audio sense: one value per bin, 0..=255.
pub trait FrequencyAnalyser {
    fn frequency_bin_count(&self) -> usize;

    /// Fill `out` with the current spectrum. Extra slots are left untouched.
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

pub trait AudioContext {
    /// Route `element` through a new analyser of `fft_size` and on to the
    /// output.
    fn attach(
        &mut self,
        element: &dyn MediaElement,
        fft_size: usize,
    ) -> Result<Box<dyn FrequencyAnalyser>, GraphError>;

    fn close(&mut self) {}
}

pub trait AudioPlatform {
    fn create_context(&mut self) -> Result<Box<dyn AudioContext>, GraphError>;

    fn create_element(&mut self) -> Box<dyn MediaElement>;
}

/// A bound analysis graph: context, analyser and the buffer frames are
/// sampled into. Built once per visualizer and closed explicitly.
pub struct AnalyzerSession {
    context: Box<dyn AudioContext>,
    analyser: Box<dyn FrequencyAnalyser>,
    bins: Vec<u8>,
}

impl AnalyzerSession {
    pub fn open<P: AudioPlatform + ?Sized>(
        platform: &mut P,
        element: &dyn MediaElement,
        fft_size: usize,
    ) -> Result<Self, GraphError> {
        let mut context = platform.create_context()?;
        let analyser = context.attach(element, fft_size)?;
        let bins = vec![0; analyser.frequency_bin_count()];
        tracing::debug!(element = element.id(), fft_size, "Analyser attached");
        Ok(Self {
            context,
            analyser,
            bins,
        })
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Pull the current spectrum.
    pub fn sample(&mut self) -> &[u8] {
        self.analyser.byte_frequency_data(&mut self.bins);
        &self.bins
    }

    pub fn close(mut self) {
        self.context.close();
    }
}
