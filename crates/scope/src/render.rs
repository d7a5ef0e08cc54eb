//! Bar layouts and drawing onto a 2D canvas.

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color([r, g, b, 255])
    }
}

pub const BAR_COLOR: Color = Color::rgb(0x00, 0x60, 0xdf);
pub const SHIMMER_COLOR: Color = Color::rgb(0x4f, 0x46, 0xe5);

/// Spectrum bars are wider than `width / bins` so the audible low end fills
/// the canvas; the rest runs off the right edge.
pub const BAR_WIDTH_FACTOR: f32 = 2.5;
pub const BAR_GAP: f32 = 1.0;
pub const SHIMMER_BAR_WIDTH: f32 = 6.0;

/// Minimal 2D drawing surface, origin top left.
pub trait Canvas {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn spectrum_bar_width(canvas_width: f32, bins: usize) -> f32 {
    if bins == 0 {
        return 0.0;
    }
    canvas_width / bins as f32 * BAR_WIDTH_FACTOR
}

/// One bottom-anchored bar per bin, `value / 255` of the canvas height.
pub fn spectrum_bars(data: &[u8], canvas_width: f32, canvas_height: f32) -> Vec<Bar> {
    let width = spectrum_bar_width(canvas_width, data.len());
    let mut x = 0.0;
    data.iter()
        .map(|&value| {
            let height = value as f32 / 255.0 * canvas_height;
            let bar = Bar {
                x,
                y: canvas_height - height,
                width,
                height,
            };
            x += width + BAR_GAP;
            bar
        })
        .collect()
}

/// Fixed-width, vertically centered bars spread edge to edge.
pub fn level_bars(levels: &[f32], canvas_width: f32, canvas_height: f32) -> Vec<Bar> {
    let count = levels.len();
    let spacing = if count > 1 {
        (canvas_width - SHIMMER_BAR_WIDTH * count as f32) / (count - 1) as f32
    } else {
        0.0
    };
    levels
        .iter()
        .enumerate()
        .map(|(i, &level)| {
            let height = level.clamp(0.0, 1.0) * canvas_height;
            Bar {
                x: i as f32 * (SHIMMER_BAR_WIDTH + spacing),
                y: (canvas_height - height) / 2.0,
                width: SHIMMER_BAR_WIDTH,
                height,
            }
        })
        .collect()
}

fn paint(canvas: &mut dyn Canvas, bars: &[Bar], color: Color) {
    canvas.clear();
    for bar in bars {
        canvas.fill_rect(bar.x, bar.y, bar.width, bar.height, color);
    }
}

pub fn draw_bars(canvas: &mut dyn Canvas, data: &[u8]) {
    let bars = spectrum_bars(data, canvas.width() as f32, canvas.height() as f32);
    paint(canvas, &bars, BAR_COLOR);
}

pub fn draw_levels(canvas: &mut dyn Canvas, levels: &[f32]) {
    let bars = level_bars(levels, canvas.width() as f32, canvas.height() as f32);
    paint(canvas, &bars, SHIMMER_COLOR);
}
