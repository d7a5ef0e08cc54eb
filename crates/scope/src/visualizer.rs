//! Play/pause driven visualizer.
//!
//! States: `Idle` until the analysis graph is first needed, `Bound` once it
//! exists, then `Playing`/`Paused`. A graph that cannot be built puts the
//! visualizer in `Disabled` for good. Frames are requested from a
//! [`FrameScheduler`]; a callback for any handle other than the one currently
//! outstanding is ignored.

use crate::analyser::DEFAULT_FFT_SIZE;
use crate::error::ScopeError;
use crate::graph::{AnalyzerSession, AudioPlatform, MediaElement};
use crate::render::{draw_bars, draw_levels, Canvas};
use crate::shimmer::Shimmer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// `requestAnimationFrame` in the abstract.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualizerState {
    Idle,
    Bound,
    Playing,
    Paused,
    Disabled,
}

pub enum Style {
    /// Bars from the analyser; needs the audio graph.
    Spectrum,
    /// Procedural bars; plays audio but never builds a graph.
    Shimmer(Shimmer),
}

pub struct Visualizer<P: AudioPlatform, S: FrameScheduler> {
    platform: P,
    scheduler: S,
    element: Box<dyn MediaElement>,
    session: Option<AnalyzerSession>,
    style: Style,
    state: VisualizerState,
    frame: Option<FrameHandle>,
    last_error: Option<ScopeError>,
}

impl<P: AudioPlatform, S: FrameScheduler> Visualizer<P, S> {
    pub fn new(mut platform: P, scheduler: S, style: Style) -> Self {
        let element = platform.create_element();
        Self {
            platform,
            scheduler,
            element,
            session: None,
            style,
            state: VisualizerState::Idle,
            frame: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> VisualizerState {
        self.state
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn element(&self) -> &dyn MediaElement {
        self.element.as_ref()
    }

    /// The most recent graph or playback failure, if any.
    pub fn take_error(&mut self) -> Option<ScopeError> {
        self.last_error.take()
    }

    /// Point the element at `url`. An existing graph is kept; if playing, the
    /// new source is started on the same frame loop.
    pub fn set_source(&mut self, url: &str) {
        if self.state == VisualizerState::Disabled {
            return;
        }
        self.element.set_src(url);
        if self.state == VisualizerState::Playing {
            self.start_playback();
        }
    }

    pub fn set_playing(&mut self, playing: bool) {
        if playing {
            self.play();
        } else {
            self.pause();
        }
    }

    pub fn play(&mut self) {
        match self.state {
            VisualizerState::Disabled | VisualizerState::Playing => return,
            _ => {}
        }
        if !self.ensure_bound() {
            return;
        }
        if self.start_playback() && self.frame.is_none() {
            self.frame = Some(self.scheduler.request_frame());
        }
    }

    pub fn pause(&mut self) {
        if self.state != VisualizerState::Playing {
            return;
        }
        self.cancel_frame();
        self.element.pause();
        self.state = VisualizerState::Paused;
    }

    /// Frame callback. Returns whether a live frame was drawn. A source that
    /// ended on its own moves the visualizer to `Paused` and stops the loop.
    pub fn on_frame(&mut self, handle: FrameHandle, time: f64, canvas: &mut dyn Canvas) -> bool {
        if self.frame != Some(handle) {
            tracing::trace!(?handle, "Ignoring stale frame");
            return false;
        }
        self.frame = None;
        if self.state != VisualizerState::Playing {
            return false;
        }
        if self.element.is_paused() {
            tracing::debug!(src = %self.element.src(), "Source ended, visualizer paused");
            self.state = VisualizerState::Paused;
            self.render_still(canvas);
            return false;
        }

        match &self.style {
            Style::Spectrum => match self.session.as_mut() {
                Some(session) => draw_bars(canvas, session.sample()),
                None => return false,
            },
            Style::Shimmer(shimmer) => draw_levels(canvas, &shimmer.levels(time, true)),
        }

        self.frame = Some(self.scheduler.request_frame());
        true
    }

    /// Draw the resting picture: flat bars for shimmer, an empty canvas for
    /// the spectrum.
    pub fn render_still(&self, canvas: &mut dyn Canvas) {
        match &self.style {
            Style::Spectrum => canvas.clear(),
            Style::Shimmer(shimmer) => draw_levels(canvas, &shimmer.levels(0.0, false)),
        }
    }

    /// Stop drawing and release the element's source. The graph survives.
    pub fn dispose(&mut self) {
        self.cancel_frame();
        self.element.pause();
        self.element.set_src("");
        if matches!(
            self.state,
            VisualizerState::Playing | VisualizerState::Paused
        ) {
            self.state = if self.session.is_some() {
                VisualizerState::Bound
            } else {
                VisualizerState::Idle
            };
        }
    }

    fn cancel_frame(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel_frame(handle);
        }
    }

    fn ensure_bound(&mut self) -> bool {
        if self.session.is_some() || matches!(self.style, Style::Shimmer(_)) {
            return true;
        }
        match AnalyzerSession::open(&mut self.platform, self.element.as_ref(), DEFAULT_FFT_SIZE) {
            Ok(session) => {
                self.session = Some(session);
                self.state = VisualizerState::Bound;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Audio graph unavailable, visualizer disabled");
                self.state = VisualizerState::Disabled;
                self.last_error = Some(e.into());
                false
            }
        }
    }

    fn start_playback(&mut self) -> bool {
        match self.element.play() {
            Ok(()) => {
                self.state = VisualizerState::Playing;
                true
            }
            Err(e) => {
                tracing::error!(error = %e, src = %self.element.src(), "Playback failed");
                self.cancel_frame();
                self.state = VisualizerState::Paused;
                self.last_error = Some(e.into());
                false
            }
        }
    }
}

impl<P: AudioPlatform, S: FrameScheduler> Drop for Visualizer<P, S> {
    fn drop(&mut self) {
        self.dispose();
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}
