//! Drawing target abstraction
//!
//! The player never rasterizes anything itself. Every record is turned into
//! calls on a [`Canvas`]; coordinates handed to the canvas are integer device
//! units with y growing upwards (bottom-up), angles are degrees
//! counter-clockwise from the positive x axis.

pub use crate::dib::{IndexedImage, RgbImage};

/// RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Decode a GDI COLORREF (0x00BBGGRR)
    pub fn from_colorref(colorref: u32) -> Self {
        Self {
            r: (colorref & 0xFF) as u8,
            g: ((colorref >> 8) & 0xFF) as u8,
            b: ((colorref >> 16) & 0xFF) as u8,
        }
    }

    /// Encode back to a COLORREF
    pub fn to_colorref(self) -> u32 {
        (self.r as u32) | ((self.g as u32) << 8) | ((self.b as u32) << 16)
    }

    /// CSS hex notation (`#rrggbb`)
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// How the vertices between `begin` and `end` are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureMode {
    /// Closed, filled polygon
    Fill,
    /// Open polyline
    OpenLines,
    /// Cubic bezier chain: start point, then triples of control/control/end
    Bezier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Continuous,
    Dashed,
    Dotted,
    DashDot,
    DashDotDot,
    /// Dash pattern given by [`Pen::dashes`]
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Flat,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Miter,
    Bevel,
    Round,
}

/// Stroke attributes, applied as one unit
#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub style: LineStyle,
    pub width: i32,
    pub color: Color,
    /// Only set by extended pens
    pub cap: Option<LineCap>,
    /// Only set by extended pens
    pub join: Option<LineJoin>,
    /// Dash/gap lengths for [`LineStyle::Custom`]
    pub dashes: Vec<i32>,
}

impl Pen {
    pub fn solid(width: i32, color: Color) -> Self {
        Self {
            style: LineStyle::Continuous,
            width,
            color,
            cap: None,
            join: None,
            dashes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hatch {
    Horizontal,
    Vertical,
    FDiagonal,
    BDiagonal,
    Cross,
    DiagCross,
}

/// Fill interior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteriorStyle {
    Solid,
    Hollow,
    Hatched(Hatch),
    /// Last stipple passed to [`Canvas::set_stipple`]
    Stipple,
    /// Last pattern passed to [`Canvas::set_pattern`]
    Pattern,
}

/// Fill attributes
///
/// `interior` is `None` when the brush only changes the colour and leaves
/// the current interior style alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brush {
    pub color: Color,
    pub interior: Option<InteriorStyle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub face_name: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikeout: bool,
    /// Character height in device units
    pub size: i32,
    /// Baseline angle in degrees, `None` keeps the current orientation
    pub orientation: Option<f64>,
}

/// Text anchor point relative to the reference position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    North,
    NorthEast,
    NorthWest,
    South,
    SouthEast,
    SouthWest,
    BaseLeft,
    BaseCenter,
    BaseRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    EvenOdd,
    Winding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackOpacity {
    Opaque,
    Transparent,
}

/// Pixel compositing rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    #[default]
    Replace,
    Xor,
    NotXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteMode {
    /// Merge with the current palette
    Polite,
    /// Replace the current palette
    Force,
}

/// Picture size reported to [`Canvas::on_size`] before drawing starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PictureSize {
    /// Width in metafile units
    pub width: i32,
    /// Height in metafile units
    pub height: i32,
    pub width_mm: f64,
    pub height_mm: f64,
}

/// Destination rectangle of an image paint, lower-left corner plus extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Capability surface the player draws on
///
/// Images are always painted from their full source extent.
pub trait Canvas {
    /// Called once before the first drawing call; returning `false` aborts playback.
    fn on_size(&mut self, _size: &PictureSize) -> bool {
        true
    }

    /// Polled between records; returning `true` ends playback early.
    fn should_stop(&self) -> bool {
        false
    }

    fn begin(&mut self, mode: FigureMode);
    fn vertex(&mut self, x: i32, y: i32);
    fn end(&mut self);

    fn pixel(&mut self, x: i32, y: i32, color: Color);
    fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32);
    /// Filled box with inclusive corners
    fn draw_box(&mut self, xmin: i32, xmax: i32, ymin: i32, ymax: i32);
    fn arc(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64);
    fn sector(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64);
    fn chord(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64);
    fn text(&mut self, x: i32, y: i32, text: &str);

    fn set_pen(&mut self, pen: &Pen);
    fn set_brush(&mut self, brush: &Brush);
    /// Two-colour fill pattern; index 0 paints the background colour, 1 the foreground
    fn set_stipple(&mut self, stipple: &IndexedImage);
    fn set_pattern(&mut self, pattern: &RgbImage);
    fn set_font(&mut self, font: &Font);
    fn set_text_color(&mut self, color: Color);
    fn set_text_alignment(&mut self, alignment: TextAlignment);
    fn set_fill_mode(&mut self, mode: FillMode);
    fn set_background(&mut self, color: Color);
    fn set_back_opacity(&mut self, opacity: BackOpacity);

    /// Change the write mode, returning the previous one
    fn set_write_mode(&mut self, mode: WriteMode) -> WriteMode;
    fn write_mode(&self) -> WriteMode;

    fn put_image_rgb(&mut self, image: &RgbImage, dest: ImageRect);
    fn put_image_map(&mut self, image: &IndexedImage, dest: ImageRect);
    fn set_palette(&mut self, colors: &[Color], mode: PaletteMode);

    /// Replace the world transform; `None` resets to identity
    fn set_transform(&mut self, matrix: Option<[f64; 6]>);
    /// Left-multiply the current world transform
    fn multiply_transform(&mut self, matrix: [f64; 6]);
}
