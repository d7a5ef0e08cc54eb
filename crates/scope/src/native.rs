//! Native host for the visualizer: WAV files instead of a browser.
//!
//! Elements decode their source with hound on first `play` and advance a
//! playback clock when the host calls [`NativePlatform::advance`]. Analysers
//! read whatever the clock moved past since their last frame.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{Rgba, RgbaImage};

use crate::analyser::SpectrumAnalyser;
use crate::error::{GraphError, PlaybackError, Result};
use crate::graph::{AudioContext, AudioPlatform, ElementId, FrequencyAnalyser, MediaElement};
use crate::render::{Canvas, Color};
use crate::shimmer::{Shimmer, DEFAULT_BARS};
use crate::visualizer::{FrameHandle, FrameScheduler, Style, Visualizer, VisualizerState};

/// Decode a WAV file to mono `f32` samples.
pub fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    let mono = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();
    Ok((mono, spec.sample_rate))
}

#[derive(Debug, Default)]
struct Playback {
    src: String,
    samples: Vec<f32>,
    sample_rate: u32,
    loaded: bool,
    position: usize,
    paused: bool,
}

type SharedPlayback = Rc<RefCell<Playback>>;

#[derive(Default)]
struct Registry {
    elements: HashMap<ElementId, SharedPlayback>,
    bound: HashSet<ElementId>,
    next_id: ElementId,
    contexts_created: usize,
}

/// Creates [`WavElement`]s and [`NativeGraph`]s that share one registry.
#[derive(Clone, Default)]
pub struct NativePlatform {
    registry: Rc<RefCell<Registry>>,
    refuse_contexts: Option<String>,
}

impl NativePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform whose audio contexts always fail to start.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            refuse_contexts: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Move every playing element forward by `seconds`. Elements that reach
    /// the end pause themselves.
    pub fn advance(&self, seconds: f64) {
        let registry = self.registry.borrow();
        for playback in registry.elements.values() {
            let mut pb = playback.borrow_mut();
            if pb.paused || !pb.loaded {
                continue;
            }
            let step = (seconds * pb.sample_rate as f64).round() as usize;
            let len = pb.samples.len();
            pb.position = (pb.position + step).min(len);
            if pb.position == len {
                tracing::debug!(src = %pb.src, "Playback ended");
                pb.paused = true;
            }
        }
    }

    pub fn contexts_created(&self) -> usize {
        self.registry.borrow().contexts_created
    }
}

impl AudioPlatform for NativePlatform {
    fn create_context(&mut self) -> std::result::Result<Box<dyn AudioContext>, GraphError> {
        if let Some(reason) = &self.refuse_contexts {
            return Err(GraphError::ContextUnavailable(reason.clone()));
        }
        self.registry.borrow_mut().contexts_created += 1;
        Ok(Box::new(NativeGraph {
            registry: Rc::clone(&self.registry),
            closed: false,
        }))
    }

    fn create_element(&mut self) -> Box<dyn MediaElement> {
        let mut registry = self.registry.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        let playback = Rc::new(RefCell::new(Playback {
            paused: true,
            ..Playback::default()
        }));
        registry.elements.insert(id, Rc::clone(&playback));
        Box::new(WavElement { id, playback })
    }
}

/// Media element playing a WAV file named by its `src` (a path, optionally
/// with a `file://` prefix).
pub struct WavElement {
    id: ElementId,
    playback: SharedPlayback,
}

impl MediaElement for WavElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn set_src(&mut self, src: &str) {
        let mut pb = self.playback.borrow_mut();
        *pb = Playback {
            src: src.to_string(),
            paused: true,
            ..Playback::default()
        };
    }

    fn src(&self) -> String {
        self.playback.borrow().src.clone()
    }

    fn play(&mut self) -> std::result::Result<(), PlaybackError> {
        let mut pb = self.playback.borrow_mut();
        if pb.src.is_empty() {
            return Err(PlaybackError::NoSource);
        }
        if !pb.loaded {
            let path = pb.src.strip_prefix("file://").unwrap_or(&pb.src).to_string();
            let (samples, sample_rate) =
                decode_wav(Path::new(&path)).map_err(|e| PlaybackError::Decode {
                    src: pb.src.clone(),
                    message: e.to_string(),
                })?;
            pb.samples = samples;
            pb.sample_rate = sample_rate;
            pb.loaded = true;
        }
        if pb.position >= pb.samples.len() {
            pb.position = 0;
        }
        pb.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.playback.borrow_mut().paused = true;
    }

    fn is_paused(&self) -> bool {
        self.playback.borrow().paused
    }
}

/// Audio context over the native registry.
pub struct NativeGraph {
    registry: Rc<RefCell<Registry>>,
    closed: bool,
}

impl AudioContext for NativeGraph {
    fn attach(
        &mut self,
        element: &dyn MediaElement,
        fft_size: usize,
    ) -> std::result::Result<Box<dyn FrequencyAnalyser>, GraphError> {
        if self.closed {
            return Err(GraphError::ContextUnavailable("context is closed".to_string()));
        }
        let mut registry = self.registry.borrow_mut();
        let id = element.id();
        if registry.bound.contains(&id) {
            return Err(GraphError::AlreadyBound(id));
        }
        let playback = registry.elements.get(&id).cloned().ok_or_else(|| {
            GraphError::ContextUnavailable(format!("element {} belongs to another host", id))
        })?;
        let analyser = SpectrumAnalyser::new(fft_size)?;
        registry.bound.insert(id);

        Ok(Box::new(NativeAnalyser {
            analyser,
            playback,
            cursor: 0,
            src: String::new(),
        }))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

struct NativeAnalyser {
    analyser: SpectrumAnalyser,
    playback: SharedPlayback,
    /// Sample position consumed so far.
    cursor: usize,
    /// Source the cursor refers to.
    src: String,
}

impl FrequencyAnalyser for NativeAnalyser {
    fn frequency_bin_count(&self) -> usize {
        self.analyser.frequency_bin_count()
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        {
            let pb = self.playback.borrow();
            if pb.src != self.src || pb.position < self.cursor {
                self.src = pb.src.clone();
                self.cursor = 0;
            }
            let end = pb.position.min(pb.samples.len());
            let start = self.cursor.max(end.saturating_sub(self.analyser.fft_size()));
            if end > start {
                self.analyser.write_time_domain(&pb.samples[start..end]);
            }
            self.cursor = end;
        }
        self.analyser.byte_frequency_data(out);
    }
}

/// Frame scheduler the host drains once per tick.
#[derive(Debug, Default)]
pub struct TickScheduler {
    next: u64,
    pending: Vec<FrameHandle>,
}

impl TickScheduler {
    /// Handles requested since the last tick, oldest first.
    pub fn take_due(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for TickScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        self.next += 1;
        let handle = FrameHandle(self.next);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending.retain(|h| *h != handle);
    }
}

/// RGBA pixel buffer implementing [`Canvas`].
pub struct PixelCanvas {
    image: RgbaImage,
    background: Rgba<u8>,
}

impl PixelCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        let background = Rgba([0, 0, 0, 255]);
        Self {
            image: RgbaImage::from_pixel(width, height, background),
            background,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        Color(self.image.get_pixel(x, y).0)
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image.save(path)?;
        Ok(())
    }
}

impl Canvas for PixelCanvas {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self) {
        let background = self.background;
        for pixel in self.image.pixels_mut() {
            *pixel = background;
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color) {
        let clamp_x = |v: f32| v.round().clamp(0.0, self.image.width() as f32) as u32;
        let clamp_y = |v: f32| v.round().clamp(0.0, self.image.height() as f32) as u32;
        let (x0, x1) = (clamp_x(x), clamp_x(x + width));
        let (y0, y1) = (clamp_y(y), clamp_y(y + height));
        for py in y0..y1 {
            for px in x0..x1 {
                self.image.put_pixel(px, py, Rgba(color.0));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Spectrum,
    Shimmer,
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub wav: PathBuf,
    pub out_dir: PathBuf,
    pub frames: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    pub mode: RenderMode,
}

/// Play `options.wav` through a visualizer and write one PNG per frame as
/// `frame_NNNNN.png`. Stops early when playback ends. Returns frames written.
pub fn render_wav(options: &RenderOptions) -> Result<usize> {
    std::fs::create_dir_all(&options.out_dir)?;

    let style = match options.mode {
        RenderMode::Spectrum => Style::Spectrum,
        RenderMode::Shimmer => Style::Shimmer(Shimmer::new(DEFAULT_BARS)),
    };
    let mut visualizer = Visualizer::new(NativePlatform::new(), TickScheduler::default(), style);
    visualizer.set_source(&options.wav.to_string_lossy());
    visualizer.play();
    if let Some(err) = visualizer.take_error() {
        return Err(err);
    }

    let dt = 1.0 / options.fps.max(1.0);
    let mut canvas = PixelCanvas::new(options.width, options.height);
    let mut written = 0;

    for index in 0..options.frames {
        visualizer.platform().advance(dt);
        let time = index as f64 * dt;
        for handle in visualizer.scheduler_mut().take_due() {
            visualizer.on_frame(handle, time, &mut canvas);
        }

        canvas.save_png(&options.out_dir.join(format!("frame_{:05}.png", index)))?;
        written += 1;

        if visualizer.state() != VisualizerState::Playing {
            tracing::debug!(frames = written, "Source finished");
            break;
        }
    }

    visualizer.pause();
    Ok(written)
}
