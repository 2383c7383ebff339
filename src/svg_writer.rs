//! SVG canvas
//!
//! Builds an SVG document from canvas calls. The canvas is bottom-up, SVG is
//! top-down, so every y coordinate is flipped around `height - 1`. Fill
//! patterns (hatches, stipples, colour patterns) become `<pattern>` entries
//! in `<defs>`; bitmaps are embedded as base64 PNG data URIs.

use std::collections::HashMap;
use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};
use log::{trace, warn};
use svg::node::element::{
    Definitions, Element, Group, Image, Line, Path, Pattern, Polygon, Polyline, Rectangle, Text,
};
use svg::node::Text as TextNode;
use svg::Document;

use crate::canvas::{
    BackOpacity, Brush, Canvas, Color, FigureMode, FillMode, Font, Hatch, ImageRect, IndexedImage, InteriorStyle,
    LineCap, LineJoin, LineStyle, PaletteMode, Pen, PictureSize, RgbImage, TextAlignment, WriteMode,
};
use crate::record::XForm;
use crate::replay::IDENTITY;
use crate::state::multiply;

/// Side of the square tile hatches are drawn in
const HATCH_TILE: i32 = 8;

const DEFAULT_FONT_SIZE: i32 = 12;

/// Canvas writing SVG markup
pub struct SvgCanvas {
    width: i32,
    height: i32,
    /// Take the document size from the picture size notification
    fit_to_picture: bool,
    elements: Vec<Element>,
    defs: Vec<Element>,
    next_def: usize,
    hatch_ids: HashMap<(Hatch, Color, Option<Color>), String>,

    figure: Option<(FigureMode, Vec<(i32, i32)>)>,
    pen: Pen,
    brush_color: Color,
    interior: InteriorStyle,
    fill: String,
    stipple: Option<IndexedImage>,
    pattern: Option<RgbImage>,
    font: Font,
    text_color: Color,
    alignment: TextAlignment,
    fill_mode: FillMode,
    background: Color,
    back_opacity: BackOpacity,
    write_mode: WriteMode,
    transform: Option<XForm>,
}

impl SvgCanvas {
    /// Canvas with a fixed `width` x `height` document size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.min(i32::MAX as u32) as i32,
            height: height.min(i32::MAX as u32) as i32,
            fit_to_picture: false,
            elements: Vec::new(),
            defs: Vec::new(),
            next_def: 0,
            hatch_ids: HashMap::new(),
            figure: None,
            pen: Pen::solid(1, Color::BLACK),
            brush_color: Color::WHITE,
            interior: InteriorStyle::Solid,
            fill: Color::WHITE.to_hex(),
            stipple: None,
            pattern: None,
            font: Font {
                face_name: "Arial".to_string(),
                bold: false,
                italic: false,
                underline: false,
                strikeout: false,
                size: DEFAULT_FONT_SIZE,
                orientation: None,
            },
            text_color: Color::BLACK,
            alignment: TextAlignment::NorthWest,
            fill_mode: FillMode::EvenOdd,
            background: Color::WHITE,
            back_opacity: BackOpacity::Opaque,
            write_mode: WriteMode::Replace,
            transform: None,
        }
    }

    /// Canvas sized by the picture it is asked to draw
    pub fn fit_to_picture() -> Self {
        Self {
            fit_to_picture: true,
            ..Self::new(1, 1)
        }
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    /// Finish and generate SVG string
    pub fn finish(self) -> String {
        let mut document = Document::new()
            .set("width", self.width)
            .set("height", self.height)
            .set("viewBox", format!("0 0 {} {}", self.width, self.height));

        if !self.defs.is_empty() {
            let mut defs = Definitions::new();
            for def in self.defs {
                defs = defs.add(def);
            }
            document = document.add(defs);
        }
        for element in self.elements {
            document = document.add(element);
        }
        document.to_string()
    }

    fn flip(&self, y: i32) -> i32 {
        self.height - 1 - y
    }

    fn flip_f(&self, y: f64) -> f64 {
        (self.height - 1) as f64 - y
    }

    /// World transform expressed in SVG space: flip, transform, flip back
    fn svg_matrix(&self, m: &XForm) -> String {
        let c = (self.height - 1) as f64;
        format!(
            "matrix({} {} {} {} {} {})",
            num(m[0]),
            num(-m[1]),
            num(-m[2]),
            num(m[3]),
            num(m[2] * c + m[4]),
            num(c - m[3] * c - m[5])
        )
    }

    /// Append an element, wrapped in a group when a transform or XOR mode applies
    fn emit<T: Into<Element>>(&mut self, element: T) {
        let element = element.into();
        let matrix = self.transform.as_ref().map(|m| self.svg_matrix(m));
        let blend = self.write_mode != WriteMode::Replace;
        if matrix.is_none() && !blend {
            self.elements.push(element);
            return;
        }

        let mut group = Group::new();
        if let Some(matrix) = matrix {
            group = group.set("transform", matrix);
        }
        if blend {
            group = group.set("style", "mix-blend-mode:difference");
        }
        self.elements.push(group.add(element).into());
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_def += 1;
        format!("{}{}", prefix, self.next_def)
    }

    fn stroke_attrs<T: Stylable>(&self, element: T) -> T {
        let pen = &self.pen;
        let mut element = element
            .with("stroke", pen.color.to_hex())
            .with("stroke-width", pen.width.max(1));
        if let Some(dashes) = dash_array(pen) {
            element = element.with("stroke-dasharray", dashes);
        }
        if let Some(cap) = pen.cap {
            element = element.with(
                "stroke-linecap",
                match cap {
                    LineCap::Flat => "butt",
                    LineCap::Round => "round",
                    LineCap::Square => "square",
                },
            );
        }
        if let Some(join) = pen.join {
            element = element.with(
                "stroke-linejoin",
                match join {
                    LineJoin::Miter => "miter",
                    LineJoin::Bevel => "bevel",
                    LineJoin::Round => "round",
                },
            );
        }
        element
    }

    fn fill_attrs<T: Stylable>(&self, element: T) -> T {
        let rule = match self.fill_mode {
            FillMode::EvenOdd => "evenodd",
            FillMode::Winding => "nonzero",
        };
        element.with("fill", self.fill.clone()).with("fill-rule", rule)
    }

    /// Recompute the fill paint after a brush change
    fn update_fill(&mut self) {
        let interior = self.interior;
        self.fill = match interior {
            InteriorStyle::Solid => self.brush_color.to_hex(),
            InteriorStyle::Hollow => "none".to_string(),
            InteriorStyle::Hatched(hatch) => format!("url(#{})", self.hatch_pattern(hatch)),
            InteriorStyle::Stipple => match self.stipple.take() {
                Some(stipple) => {
                    let colors = [self.background, self.brush_color];
                    let pixels = |x: usize, y: usize| colors[(stipple.index[y * stipple.width + x] & 1) as usize];
                    let id = self.image_pattern(stipple.width, stipple.height, pixels);
                    self.stipple = Some(stipple);
                    format!("url(#{})", id)
                }
                None => self.brush_color.to_hex(),
            },
            InteriorStyle::Pattern => match self.pattern.take() {
                Some(pattern) => {
                    let id = self.image_pattern(pattern.width, pattern.height, |x, y| pattern.pixel(x, y));
                    self.pattern = Some(pattern);
                    format!("url(#{})", id)
                }
                None => self.brush_color.to_hex(),
            },
        };
    }

    fn hatch_pattern(&mut self, hatch: Hatch) -> String {
        let back = match self.back_opacity {
            BackOpacity::Opaque => Some(self.background),
            BackOpacity::Transparent => None,
        };
        let key = (hatch, self.brush_color, back);
        if let Some(id) = self.hatch_ids.get(&key) {
            return id.clone();
        }

        let id = self.next_id("hatch");
        let n = HATCH_TILE;
        let mut d = String::new();
        if matches!(hatch, Hatch::Horizontal | Hatch::Cross) {
            d.push_str(&format!("M 0 {h} L {n} {h} ", h = n / 2, n = n));
        }
        if matches!(hatch, Hatch::Vertical | Hatch::Cross) {
            d.push_str(&format!("M {h} 0 L {h} {n} ", h = n / 2, n = n));
        }
        if matches!(hatch, Hatch::FDiagonal | Hatch::DiagCross) {
            d.push_str(&format!("M 0 0 L {n} {n} ", n = n));
        }
        if matches!(hatch, Hatch::BDiagonal | Hatch::DiagCross) {
            d.push_str(&format!("M 0 {n} L {n} 0 ", n = n));
        }

        let mut pattern = Pattern::new()
            .set("id", id.clone())
            .set("patternUnits", "userSpaceOnUse")
            .set("width", n)
            .set("height", n);
        if let Some(back) = back {
            pattern = pattern.add(
                Rectangle::new()
                    .set("width", n)
                    .set("height", n)
                    .set("fill", back.to_hex()),
            );
        }
        pattern = pattern.add(
            Path::new()
                .set("d", d.trim_end())
                .set("stroke", self.brush_color.to_hex())
                .set("stroke-width", 1),
        );
        self.defs.push(pattern.into());
        self.hatch_ids.insert(key, id.clone());
        id
    }

    /// Tile pattern holding a bottom-up image
    fn image_pattern<F: Fn(usize, usize) -> Color>(&mut self, width: usize, height: usize, pixel: F) -> String {
        let id = self.next_id("pattern");
        let mut pattern = Pattern::new()
            .set("id", id.clone())
            .set("patternUnits", "userSpaceOnUse")
            .set("width", width as i32)
            .set("height", height as i32);
        if let Some(uri) = png_data_uri(width, height, pixel) {
            pattern = pattern.add(
                Image::new()
                    .set("width", width as i32)
                    .set("height", height as i32)
                    .set("href", uri),
            );
        }
        self.defs.push(pattern.into());
        id
    }

    /// Start point of an arc and the `A` commands drawing it from there
    fn arc_data(&self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) -> ((f64, f64), String) {
        let (rx, ry) = (w as f64 / 2.0, h as f64 / 2.0);
        let span = if angle2 > angle1 {
            (angle2 - angle1).min(360.0)
        } else {
            360.0
        };
        let point = |angle: f64| {
            let r = angle.to_radians();
            (xc as f64 + rx * r.cos(), self.flip_f(yc as f64 + ry * r.sin()))
        };
        let radii = format!("{} {}", num(rx), num(ry));

        let start = point(angle1);
        // counter-clockwise in a y-down space is the negative sweep direction
        let segments = if span >= 360.0 {
            let mid = point(angle1 + 180.0);
            format!(
                " A {r} 0 0 0 {} {} A {r} 0 0 0 {} {}",
                num(mid.0),
                num(mid.1),
                num(start.0),
                num(start.1),
                r = radii
            )
        } else {
            let end = point(angle1 + span);
            let large = if span > 180.0 { 1 } else { 0 };
            format!(" A {} 0 {} 0 {} {}", radii, large, num(end.0), num(end.1))
        };
        (start, segments)
    }

    fn image(&mut self, width: usize, height: usize, dest: ImageRect, pixel: impl Fn(usize, usize) -> Color) {
        let Some(uri) = png_data_uri(width, height, pixel) else {
            return;
        };
        let image = Image::new()
            .set("x", dest.x)
            .set("y", self.flip(dest.y + dest.height - 1))
            .set("width", dest.width)
            .set("height", dest.height)
            .set("preserveAspectRatio", "none")
            .set("href", uri);
        self.emit(image);
    }
}

/// Attribute setter shared by the element builders used here
trait Stylable: Sized {
    fn with(self, name: &str, value: impl Into<svg::node::Value>) -> Self;
}

macro_rules! stylable {
    ($($element:ty),*) => {
        $(impl Stylable for $element {
            fn with(self, name: &str, value: impl Into<svg::node::Value>) -> Self {
                self.set(name, value)
            }
        })*
    };
}

stylable!(Line, Path, Polygon, Polyline, Rectangle);

fn dash_array(pen: &Pen) -> Option<String> {
    let unit = pen.width.max(1);
    let pattern: Vec<i32> = match pen.style {
        LineStyle::Continuous => return None,
        LineStyle::Dashed => vec![6, 2],
        LineStyle::Dotted => vec![1, 2],
        LineStyle::DashDot => vec![6, 2, 1, 2],
        LineStyle::DashDotDot => vec![6, 2, 1, 2, 1, 2],
        LineStyle::Custom if !pen.dashes.is_empty() => {
            return Some(join(pen.dashes.iter().map(|d| d.to_string())));
        }
        LineStyle::Custom => return None,
    };
    Some(join(pattern.iter().map(|d| (d * unit).to_string())))
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join(" ")
}

/// Compact decimal formatting for path data
fn num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{}", rounded)
    }
}

/// PNG-encode a bottom-up image as a data URI
fn png_data_uri(width: usize, height: usize, pixel: impl Fn(usize, usize) -> Color) -> Option<String> {
    if width == 0 || height == 0 {
        return None;
    }
    let mut raw = Vec::with_capacity(width * height * 3);
    for row in (0..height).rev() {
        for x in 0..width {
            let c = pixel(x, row);
            raw.extend_from_slice(&[c.r, c.g, c.b]);
        }
    }

    let Some(buffer) = image::RgbImage::from_raw(width as u32, height as u32, raw) else {
        warn!("Failed to create {}x{} image buffer", width, height);
        return None;
    };
    let mut png = Vec::new();
    if let Err(e) = image::DynamicImage::ImageRgb8(buffer).write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png) {
        warn!("Failed to encode {}x{} image as PNG: {}", width, height, e);
        return None;
    }
    Some(format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(&png)))
}

impl Canvas for SvgCanvas {
    fn on_size(&mut self, size: &PictureSize) -> bool {
        if self.fit_to_picture {
            self.width = size.width.max(1);
            self.height = size.height.max(1);
        }
        true
    }

    fn begin(&mut self, mode: FigureMode) {
        self.figure = Some((mode, Vec::new()));
    }

    fn vertex(&mut self, x: i32, y: i32) {
        let y = self.flip(y);
        if let Some((_, points)) = self.figure.as_mut() {
            points.push((x, y));
        }
    }

    fn end(&mut self) {
        let Some((mode, points)) = self.figure.take() else {
            return;
        };
        if points.is_empty() {
            return;
        }
        let list = join(points.iter().map(|(x, y)| format!("{},{}", x, y)));
        match mode {
            FigureMode::Fill => {
                let polygon = self.stroke_attrs(self.fill_attrs(Polygon::new().set("points", list)));
                self.emit(polygon);
            }
            FigureMode::OpenLines => {
                let polyline = self.stroke_attrs(Polyline::new().set("points", list).set("fill", "none"));
                self.emit(polyline);
            }
            FigureMode::Bezier => {
                let (x0, y0) = points[0];
                let mut d = format!("M {} {}", x0, y0);
                for c in points[1..].chunks_exact(3) {
                    d.push_str(&format!(
                        " C {} {} {} {} {} {}",
                        c[0].0, c[0].1, c[1].0, c[1].1, c[2].0, c[2].1
                    ));
                }
                let path = self.stroke_attrs(Path::new().set("d", d).set("fill", "none"));
                self.emit(path);
            }
        }
    }

    fn pixel(&mut self, x: i32, y: i32, color: Color) {
        let rect = Rectangle::new()
            .set("x", x)
            .set("y", self.flip(y))
            .set("width", 1)
            .set("height", 1)
            .set("fill", color.to_hex());
        self.emit(rect);
    }

    fn line(&mut self, x1: i32, y1: i32, x2: i32, y2: i32) {
        let line = Line::new()
            .set("x1", x1)
            .set("y1", self.flip(y1))
            .set("x2", x2)
            .set("y2", self.flip(y2));
        let line = self.stroke_attrs(line);
        self.emit(line);
    }

    fn draw_box(&mut self, xmin: i32, xmax: i32, ymin: i32, ymax: i32) {
        let rect = Rectangle::new()
            .set("x", xmin.min(xmax))
            .set("y", self.flip(ymin.max(ymax)))
            .set("width", (xmax - xmin).abs())
            .set("height", (ymax - ymin).abs());
        let rect = self.stroke_attrs(self.fill_attrs(rect));
        self.emit(rect);
    }

    fn arc(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) {
        let ((sx, sy), arc) = self.arc_data(xc, yc, w, h, angle1, angle2);
        let d = format!("M {} {}{}", num(sx), num(sy), arc);
        let path = self.stroke_attrs(Path::new().set("d", d).set("fill", "none"));
        self.emit(path);
    }

    fn sector(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) {
        let ((sx, sy), arc) = self.arc_data(xc, yc, w, h, angle1, angle2);
        let d = if angle2 - angle1 >= 360.0 || angle2 <= angle1 {
            format!("M {} {}{} Z", num(sx), num(sy), arc)
        } else {
            format!("M {} {} L {} {}{} Z", xc, self.flip(yc), num(sx), num(sy), arc)
        };
        let path = self.stroke_attrs(self.fill_attrs(Path::new().set("d", d)));
        self.emit(path);
    }

    fn chord(&mut self, xc: i32, yc: i32, w: i32, h: i32, angle1: f64, angle2: f64) {
        let ((sx, sy), arc) = self.arc_data(xc, yc, w, h, angle1, angle2);
        let d = format!("M {} {}{} Z", num(sx), num(sy), arc);
        let path = self.stroke_attrs(self.fill_attrs(Path::new().set("d", d)));
        self.emit(path);
    }

    fn text(&mut self, x: i32, y: i32, text: &str) {
        let y = self.flip(y);
        let (anchor, baseline) = match self.alignment {
            TextAlignment::NorthWest => ("start", Some("hanging")),
            TextAlignment::North => ("middle", Some("hanging")),
            TextAlignment::NorthEast => ("end", Some("hanging")),
            TextAlignment::SouthWest => ("start", Some("text-after-edge")),
            TextAlignment::South => ("middle", Some("text-after-edge")),
            TextAlignment::SouthEast => ("end", Some("text-after-edge")),
            TextAlignment::BaseLeft => ("start", None),
            TextAlignment::BaseCenter => ("middle", None),
            TextAlignment::BaseRight => ("end", None),
        };
        let size = if self.font.size > 0 {
            self.font.size
        } else {
            DEFAULT_FONT_SIZE
        };

        let mut element = Text::new()
            .set("x", x)
            .set("y", y)
            .set("font-family", self.font.face_name.clone())
            .set("font-size", size)
            .set("fill", self.text_color.to_hex())
            .set("text-anchor", anchor);
        if let Some(baseline) = baseline {
            element = element.set("dominant-baseline", baseline);
        }
        if self.font.bold {
            element = element.set("font-weight", "bold");
        }
        if self.font.italic {
            element = element.set("font-style", "italic");
        }
        let decoration = match (self.font.underline, self.font.strikeout) {
            (true, true) => Some("underline line-through"),
            (true, false) => Some("underline"),
            (false, true) => Some("line-through"),
            (false, false) => None,
        };
        if let Some(decoration) = decoration {
            element = element.set("text-decoration", decoration);
        }
        if let Some(angle) = self.font.orientation.filter(|a| *a != 0.0) {
            element = element.set("transform", format!("rotate({} {} {})", num(-angle), x, y));
        }
        self.emit(element.add(TextNode::new(text)));
    }

    fn set_pen(&mut self, pen: &Pen) {
        self.pen = pen.clone();
    }

    fn set_brush(&mut self, brush: &Brush) {
        self.brush_color = brush.color;
        if let Some(interior) = brush.interior {
            self.interior = interior;
        }
        self.update_fill();
    }

    fn set_stipple(&mut self, stipple: &IndexedImage) {
        self.stipple = Some(stipple.clone());
    }

    fn set_pattern(&mut self, pattern: &RgbImage) {
        self.pattern = Some(pattern.clone());
    }

    fn set_font(&mut self, font: &Font) {
        let orientation = font.orientation.or(self.font.orientation);
        self.font = Font {
            orientation,
            ..font.clone()
        };
    }

    fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    fn set_text_alignment(&mut self, alignment: TextAlignment) {
        self.alignment = alignment;
    }

    fn set_fill_mode(&mut self, mode: FillMode) {
        self.fill_mode = mode;
    }

    fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    fn set_back_opacity(&mut self, opacity: BackOpacity) {
        self.back_opacity = opacity;
    }

    fn set_write_mode(&mut self, mode: WriteMode) -> WriteMode {
        std::mem::replace(&mut self.write_mode, mode)
    }

    fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    fn put_image_rgb(&mut self, image: &RgbImage, dest: ImageRect) {
        self.image(image.width, image.height, dest, |x, y| image.pixel(x, y));
    }

    fn put_image_map(&mut self, image: &IndexedImage, dest: ImageRect) {
        self.image(image.width, image.height, dest, |x, y| image.pixel(x, y));
    }

    fn set_palette(&mut self, colors: &[Color], _mode: PaletteMode) {
        // indexed images carry their own colour table
        trace!("Ignoring palette of {} colours", colors.len());
    }

    fn set_transform(&mut self, matrix: Option<[f64; 6]>) {
        self.transform = matrix;
    }

    fn multiply_transform(&mut self, matrix: [f64; 6]) {
        let current = self.transform.unwrap_or(IDENTITY);
        self.transform = Some(multiply(&matrix, &current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> SvgCanvas {
        SvgCanvas::new(100, 50)
    }

    #[test]
    fn test_line_is_flipped() {
        let mut c = canvas();
        c.line(0, 49, 10, 39);
        let svg = c.finish();
        assert!(svg.contains("<line"));
        assert!(svg.contains(r#"y1="0""#));
        assert!(svg.contains(r#"y2="10""#));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
    }

    #[test]
    fn test_fit_to_picture_takes_size() {
        let mut c = SvgCanvas::fit_to_picture();
        assert!(c.on_size(&PictureSize {
            width: 300,
            height: 200,
            width_mm: 10.0,
            height_mm: 5.0,
        }));
        assert_eq!(c.size(), (300, 200));

        let mut fixed = canvas();
        fixed.on_size(&PictureSize {
            width: 300,
            height: 200,
            width_mm: 10.0,
            height_mm: 5.0,
        });
        assert_eq!(fixed.size(), (100, 50));
    }

    #[test]
    fn test_pen_styles() {
        let mut c = canvas();
        c.set_pen(&Pen {
            style: LineStyle::Dashed,
            width: 2,
            color: Color::rgb(255, 0, 0),
            cap: Some(LineCap::Flat),
            join: None,
            dashes: vec![],
        });
        c.line(0, 0, 10, 0);
        let svg = c.finish();
        assert!(svg.contains(r##"stroke="#ff0000""##));
        assert!(svg.contains(r#"stroke-dasharray="12 4""#));
        assert!(svg.contains(r#"stroke-linecap="butt""#));
        assert!(!svg.contains("stroke-linejoin"));
    }

    #[test]
    fn test_custom_dashes() {
        let mut pen = Pen::solid(3, Color::BLACK);
        pen.style = LineStyle::Custom;
        pen.dashes = vec![5, 1];
        assert_eq!(dash_array(&pen).as_deref(), Some("5 1"));
        assert_eq!(dash_array(&Pen::solid(3, Color::BLACK)), None);
    }

    #[test]
    fn test_polygon_fill() {
        let mut c = canvas();
        c.set_brush(&Brush {
            color: Color::rgb(0, 0, 255),
            interior: Some(InteriorStyle::Solid),
        });
        c.set_fill_mode(FillMode::Winding);
        c.begin(FigureMode::Fill);
        c.vertex(0, 0);
        c.vertex(10, 0);
        c.vertex(10, 10);
        c.end();
        let svg = c.finish();
        assert!(svg.contains(r#"points="0,49 10,49 10,39""#));
        assert!(svg.contains(r##"fill="#0000ff""##));
        assert!(svg.contains(r#"fill-rule="nonzero""#));
    }

    #[test]
    fn test_hollow_brush_and_colour_only_brush() {
        let mut c = canvas();
        c.set_brush(&Brush {
            color: Color::BLACK,
            interior: Some(InteriorStyle::Hollow),
        });
        c.set_brush(&Brush {
            color: Color::rgb(1, 2, 3),
            interior: None,
        });
        c.draw_box(0, 10, 0, 10);
        assert!(c.finish().contains(r#"fill="none""#));
    }

    #[test]
    fn test_hatch_pattern_is_shared() {
        let mut c = canvas();
        let hatched = Brush {
            color: Color::rgb(0, 128, 0),
            interior: Some(InteriorStyle::Hatched(Hatch::Cross)),
        };
        c.set_back_opacity(BackOpacity::Transparent);
        c.set_brush(&hatched);
        c.draw_box(0, 10, 0, 10);
        c.set_brush(&hatched);
        c.draw_box(20, 30, 0, 10);
        let svg = c.finish();
        assert_eq!(svg.matches("<pattern").count(), 1);
        assert_eq!(svg.matches("url(#hatch1)").count(), 2);
        assert!(svg.contains("M 0 4 L 8 4 M 4 0 L 4 8"));
    }

    #[test]
    fn test_stipple_becomes_image_pattern() {
        let mut c = canvas();
        let stipple = IndexedImage {
            width: 2,
            height: 2,
            index: vec![0, 1, 1, 0],
            colors: vec![Color::BLACK; 256],
        };
        c.set_stipple(&stipple);
        c.set_brush(&Brush {
            color: Color::rgb(255, 0, 0),
            interior: Some(InteriorStyle::Stipple),
        });
        c.draw_box(0, 10, 0, 10);
        let svg = c.finish();
        assert!(svg.contains("url(#pattern1)"));
        assert!(svg.contains("data:image/png;base64,"));
    }

    #[test]
    fn test_xor_mode_blends() {
        let mut c = canvas();
        assert_eq!(c.set_write_mode(WriteMode::Xor), WriteMode::Replace);
        c.line(0, 0, 1, 1);
        assert_eq!(c.set_write_mode(WriteMode::Replace), WriteMode::Xor);
        c.line(0, 0, 1, 1);
        let svg = c.finish();
        assert_eq!(svg.matches("mix-blend-mode:difference").count(), 1);
    }

    #[test]
    fn test_transform_in_svg_space() {
        let mut c = SvgCanvas::new(10, 11);
        c.set_transform(Some([1.0, 0.0, 0.0, 1.0, 5.0, 2.0]));
        assert_eq!(c.svg_matrix(&[1.0, 0.0, 0.0, 1.0, 5.0, 2.0]), "matrix(1 0 0 1 5 -2)");
        c.line(0, 0, 1, 1);
        c.set_transform(None);
        c.multiply_transform([2.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        c.multiply_transform([1.0, 0.0, 0.0, 1.0, 3.0, 0.0]);
        // the new matrix applies first
        assert_eq!(c.transform, Some([2.0, 0.0, 0.0, 2.0, 6.0, 0.0]));
        assert!(c.finish().contains(r#"transform="matrix(1 0 0 1 5 -2)""#));
    }

    #[test]
    fn test_arcs() {
        let c = SvgCanvas::new(100, 101);
        let (start, arc) = c.arc_data(50, 50, 20, 20, 0.0, 90.0);
        assert_eq!(start, (60.0, 50.0));
        assert_eq!(arc, " A 10 10 0 0 0 50 40");

        let (_, full) = c.arc_data(50, 50, 20, 10, 0.0, 360.0);
        assert_eq!(full.matches(" A ").count(), 2);
    }

    #[test]
    fn test_sector_and_chord() {
        let mut c = SvgCanvas::new(100, 101);
        c.sector(50, 50, 20, 20, 0.0, 90.0);
        c.chord(50, 50, 20, 20, 0.0, 90.0);
        let svg = c.finish();
        assert!(svg.contains("M 50 50 L 60 50 A 10 10 0 0 0 50 40 Z"));
        assert!(svg.contains("M 60 50 A 10 10 0 0 0 50 40 Z"));
    }

    #[test]
    fn test_text_attributes() {
        let mut c = canvas();
        c.set_font(&Font {
            face_name: "Courier New".to_string(),
            bold: true,
            italic: false,
            underline: true,
            strikeout: false,
            size: 20,
            orientation: Some(90.0),
        });
        c.set_text_alignment(TextAlignment::BaseCenter);
        c.set_text_color(Color::rgb(0, 0, 255));
        c.text(10, 49, "Hello");
        let svg = c.finish();
        assert!(svg.contains("Hello"));
        assert!(svg.contains(r#"font-family="Courier New""#));
        assert!(svg.contains(r#"font-weight="bold""#));
        assert!(svg.contains(r#"text-anchor="middle""#));
        assert!(svg.contains(r#"text-decoration="underline""#));
        assert!(svg.contains(r#"transform="rotate(-90 10 0)""#));
        assert!(!svg.contains("dominant-baseline"));
    }

    #[test]
    fn test_image_is_embedded() {
        let mut c = canvas();
        let image = RgbImage {
            width: 1,
            height: 2,
            red: vec![255, 0],
            green: vec![0, 0],
            blue: vec![0, 255],
        };
        c.put_image_rgb(
            &image,
            ImageRect {
                x: 5,
                y: 10,
                width: 4,
                height: 8,
            },
        );
        let svg = c.finish();
        assert!(svg.contains("<image"));
        assert!(svg.contains(r#"y="32""#));
        assert!(svg.contains(r#"preserveAspectRatio="none""#));
        assert!(svg.contains("data:image/png;base64,"));
    }

    #[test]
    fn test_num_formatting() {
        assert_eq!(num(3.0), "3");
        assert_eq!(num(-0.001), "0");
        assert_eq!(num(1.256), "1.26");
    }
}
