//! Canvas that records every call
//!
//! Handy for inspecting what a metafile does without rendering it, and the
//! backbone of the replay tests.

use crate::canvas::{
    BackOpacity, Brush, Canvas, Color, FigureMode, FillMode, Font, ImageRect, IndexedImage, PaletteMode, Pen,
    PictureSize, RgbImage, TextAlignment, WriteMode,
};

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasCall {
    Size(PictureSize),
    Begin(FigureMode),
    Vertex(i32, i32),
    End,
    Pixel(i32, i32, Color),
    Line(i32, i32, i32, i32),
    Box(i32, i32, i32, i32),
    Arc(i32, i32, i32, i32, f64, f64),
    Sector(i32, i32, i32, i32, f64, f64),
    Chord(i32, i32, i32, i32, f64, f64),
    Text(i32, i32, String),
    Pen(Pen),
    Brush(Brush),
    Stipple(IndexedImage),
    Pattern(RgbImage),
    Font(Font),
    TextColor(Color),
    TextAlignment(TextAlignment),
    FillMode(FillMode),
    Background(Color),
    BackOpacity(BackOpacity),
    WriteMode(WriteMode),
    ImageRgb(RgbImage, ImageRect),
    ImageMap(IndexedImage, ImageRect),
    Palette(Vec<Color>, PaletteMode),
    Transform(Option<[f64; 6]>),
    MultiplyTransform([f64; 6]),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub calls: Vec<CanvasCall>,
    write_mode: WriteMode,
    /// Refuse the picture size, aborting playback
    pub reject_size: bool,
    /// Ask to stop once this many calls were recorded
    pub stop_after: Option<usize>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder that refuses the picture size
    pub fn rejecting_size() -> Self {
        Self {
            reject_size: true,
            ..Self::default()
        }
    }

    /// Recorder that asks to stop once `limit` calls were recorded
    pub fn stopping_after(limit: usize) -> Self {
        Self {
            stop_after: Some(limit),
            ..Self::default()
        }
    }

    /// Calls recorded after the size notification
    pub fn drawing_calls(&self) -> &[CanvasCall] {
        match self.calls.first() {
            Some(CanvasCall::Size(_)) => &self.calls[1..],
            _ => &self.calls,
        }
    }

    fn push(&mut self, call: CanvasCall) {
        self.calls.push(call);
    }
}

impl Canvas for Recorder {
    fn on_size(&mut self, size: &PictureSize) -> bool {
        self.push(CanvasCall::Size(*size));
        !self.reject_size
    }

    fn should_stop(&self) -> bool {
        self.stop_after.map_or(false, |limit| self.calls.len() >= limit)
    }

    fn begin(&mut self, mode: FigureMode) {
        self.push(CanvasCall::Begin(mode));
    }

    fn vertex(&mut self, x: i32, y: i32) {
        self.push(CanvasCall::Vertex(x, y));
    }

    fn end(&mut self) {
        self.push(CanvasCall::End);
    }

    fn pixel(&mut self, x: i32, y: i32, color: Color) {
        self.push(CanvasCall::Pixel(x, y, color));
    }

    fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        self.push(CanvasCall::Line(x1, y1, x2, y2));
    }

    fn draw_box(&mut self, xmin: i32, xmax: i32, ymin: i32, ymax: i32) {
        self.push(CanvasCall::Box(xmin, xmax, ymin, ymax));
    }

    fn arc(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) {
        self.push(CanvasCall::Arc(xc, yc, w, h, angle1, angle2));
    }

    fn sector(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) {
        self.push(CanvasCall::Sector(xc, yc, w, h, angle1, angle2));
    }

    fn chord(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) {
        self.push(CanvasCall::Chord(xc, yc, w, h, angle1, angle2));
    }

    fn text(&mut self, x: i32, y: i32, text: &str) {
        self.push(CanvasCall::Text(x, y, text.to_string()));
    }

    fn set_pen(&mut self, pen: &Pen) {
        self.push(CanvasCall::Pen(pen.clone()));
    }

    fn set_brush(&mut self, brush: &Brush) {
        self.push(CanvasCall::Brush(*brush));
    }

    fn set_stipple(&mut self, stipple: &IndexedImage) {
        self.push(CanvasCall::Stipple(stipple.clone()));
    }

    fn set_pattern(&mut self, pattern: &RgbImage) {
        self.push(CanvasCall::Pattern(pattern.clone()));
    }

    fn set_font(&mut self, font: &Font) {
        self.push(CanvasCall::Font(font.clone()));
    }

    fn set_text_color(&mut self, color: Color) {
        self.push(CanvasCall::TextColor(color));
    }

    fn set_text_alignment(&mut self, alignment: TextAlignment) {
        self.push(CanvasCall::TextAlignment(alignment));
    }

    fn set_fill_mode(&mut self, mode: FillMode) {
        self.push(CanvasCall::FillMode(mode));
    }

    fn set_background(&mut self, color: Color) {
        self.push(CanvasCall::Background(color));
    }

    fn set_back_opacity(&mut self, opacity: BackOpacity) {
        self.push(CanvasCall::BackOpacity(opacity));
    }

    fn set_write_mode(&mut self, mode: WriteMode) -> WriteMode {
        self.push(CanvasCall::WriteMode(mode));
        std::mem::replace(&mut self.write_mode, mode)
    }

    fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    fn put_image_rgb(&mut self, image: &RgbImage, dest: ImageRect) {
        self.push(CanvasCall::ImageRgb(image.clone(), dest));
    }

    fn put_image_map(&mut self, image: &IndexedImage, dest: ImageRect) {
        self.push(CanvasCall::ImageMap(image.clone(), dest));
    }

    fn set_palette(&mut self, colors: &[Color], mode: PaletteMode) {
        self.push(CanvasCall::Palette(colors.to_vec(), mode));
    }

    fn set_transform(&mut self, matrix: Option<[f64; 6]>) {
        self.push(CanvasCall::Transform(matrix));
    }

    fn multiply_transform(&mut self, matrix: [f64; 6]) {
        self.push(CanvasCall::MultiplyTransform(matrix));
    }
}
