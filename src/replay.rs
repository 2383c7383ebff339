//! Replay pass
//!
//! Dispatches decoded records onto a [`Canvas`] in file order. Geometry goes
//! through the mapping fixed before the pass; everything that survives from
//! one record to the next lives in [`ReplayState`].

use log::{debug, trace};

use crate::bounds::{angle_arc_point, record_label};
use crate::canvas::{Brush, Canvas, Color, FigureMode, ImageRect, InteriorStyle, PaletteMode};
use crate::dib::{DecodeMode, DecodedImage, Dib};
use crate::mapper::Mapping;
use crate::record::{ArcKind, Blit, DibSource, DrawOp, DrawOps, MetafileRecord, Point, PointArray, PolyShape, Rect};
use crate::state::{
    back_opacity, blit_write_mode, brush_from_log, fill_mode, font_from_log, multiply, pen_from_log, rop2_write_mode,
    stock_object, text_alignment, BrushObject, GdiObject, ReplayState, MWT_IDENTITY, MWT_LEFTMULTIPLY,
    STOCK_OBJECT_BASE,
};
use crate::text::{decode_ansi, decode_utf16};

pub(crate) const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Start and end angle of an arc-family record
///
/// Angles are measured on the unmapped box so the aspect correction uses
/// metafile proportions; the end always lands strictly after the start.
pub fn arc_angles(rect: Rect, start: Point, end: Point) -> (f64, f64) {
    let xc = (rect.left as f64 + rect.right as f64 - 1.0) / 2.0;
    let yc = (rect.top as f64 + rect.bottom as f64 - 1.0) / 2.0;
    let w = (rect.right as f64 - rect.left as f64 - 1.0).max(1.0);
    let h = (rect.bottom as f64 - rect.top as f64 - 1.0).max(1.0);

    let angle = |p: Point| ((yc - p.y as f64) * w).atan2((p.x as f64 - xc) * h).to_degrees();
    let a1 = angle(start);
    let mut a2 = angle(end);
    if a2 <= a1 {
        a2 += 360.0;
    }
    (a1, a2)
}

fn figure_mode(shape: PolyShape) -> FigureMode {
    match shape {
        PolyShape::Polygon => FigureMode::Fill,
        PolyShape::Polyline | PolyShape::PolylineTo => FigureMode::OpenLines,
        PolyShape::Bezier | PolyShape::BezierTo => FigureMode::Bezier,
    }
}

/// Drives one replay over a canvas
pub struct Replayer<'c, C: Canvas + ?Sized> {
    canvas: &'c mut C,
    state: ReplayState,
    skipped_bitmaps: usize,
}

impl<'c, C: Canvas + ?Sized> Replayer<'c, C> {
    pub fn new(canvas: &'c mut C, mapping: Mapping) -> Self {
        Self {
            canvas,
            state: ReplayState::new(mapping),
            skipped_bitmaps: 0,
        }
    }

    pub fn state(&self) -> &ReplayState {
        &self.state
    }

    /// Blits whose bitmap could not be decoded
    pub fn skipped_bitmaps(&self) -> usize {
        self.skipped_bitmaps
    }

    pub fn canvas(&self) -> &C {
        &*self.canvas
    }

    fn sx(&self, x: i32) -> i32 {
        self.state.mapping.x(x)
    }

    fn sy(&self, y: i32) -> i32 {
        self.state.mapping.y(y)
    }

    /// Dispatch one record
    pub fn play(&mut self, record: &MetafileRecord<'_>) {
        trace!("replay {}", record_label(record));

        match record {
            MetafileRecord::Poly { shape, points } => self.poly(*shape, points),
            MetafileRecord::PolyPoly { shape, counts, points } => {
                let mode = figure_mode(*shape);
                let mut start = 0;
                for count in counts.iter() {
                    let subpath = points.slice(start, count as usize);
                    start += count as usize;
                    self.figure(mode, subpath.iter());
                }
            }
            MetafileRecord::PolyDraw { points, types } => self.poly_draw(*points, types),
            MetafileRecord::SetPixel { point, color } => {
                let (x, y) = (self.sx(point.x), self.sy(point.y));
                self.canvas.pixel(x, y, Color::from_colorref(*color));
            }
            MetafileRecord::MoveTo(p) => self.state.position = *p,
            MetafileRecord::LineTo(p) => self.line_to(*p),
            MetafileRecord::AngleArc { center, radius, start, sweep } => {
                self.angle_arc(*center, *radius, *start as f64, *sweep as f64)
            }
            MetafileRecord::Rectangle(rect) | MetafileRecord::RoundRect { rect, .. } => self.rectangle(*rect),
            MetafileRecord::Ellipse(rect) => {
                let (xc, yc, w, h) = self.ellipse_box(*rect);
                self.canvas.sector(xc, yc, w, h, 0.0, 360.0);
            }
            MetafileRecord::Arc { kind, rect, start, end } => {
                let (a1, a2) = arc_angles(*rect, *start, *end);
                let (xc, yc, w, h) = self.ellipse_box(*rect);
                match kind {
                    ArcKind::Arc => self.canvas.arc(xc, yc, w, h, a1, a2),
                    ArcKind::Chord => self.canvas.chord(xc, yc, w, h, a1, a2),
                    ArcKind::Pie => self.canvas.sector(xc, yc, w, h, a1, a2),
                    ArcKind::ArcTo => {
                        self.canvas.arc(xc, yc, w, h, a1, a2);
                        // the radial end point stands in for the true arc end
                        self.state.position = *end;
                    }
                }
            }

            MetafileRecord::SetBkMode(mode) => self.canvas.set_back_opacity(back_opacity(*mode)),
            MetafileRecord::SetRop2(rop2) => {
                self.canvas.set_write_mode(rop2_write_mode(*rop2));
            }
            MetafileRecord::SetPolyFillMode(mode) => self.canvas.set_fill_mode(fill_mode(*mode)),
            MetafileRecord::SetTextAlign(mode) => {
                let (alignment, update_position) = text_alignment(*mode);
                if let Some(alignment) = alignment {
                    self.canvas.set_text_alignment(alignment);
                }
                self.state.update_position = update_position;
            }
            MetafileRecord::SetTextColor(color) => self.canvas.set_text_color(Color::from_colorref(*color)),
            MetafileRecord::SetBkColor(color) => self.canvas.set_background(Color::from_colorref(*color)),

            MetafileRecord::SetWorldTransform(xform) => {
                self.canvas.set_transform(Some(*xform));
                self.state.transform = Some(*xform);
            }
            MetafileRecord::ModifyWorldTransform { xform, mode } => match *mode {
                MWT_IDENTITY => {
                    self.canvas.set_transform(None);
                    self.state.transform = None;
                }
                MWT_LEFTMULTIPLY => {
                    self.canvas.multiply_transform(*xform);
                    let current = self.state.transform.unwrap_or(IDENTITY);
                    self.state.transform = Some(multiply(xform, &current));
                }
                other => debug!("Ignoring world transform mode {}", other),
            },

            MetafileRecord::CreatePen { handle, pen } => {
                let pen = pen_from_log(pen, &self.state.mapping);
                let object = GdiObject::Pen(pen);
                self.apply(&object);
                self.state.objects.insert(*handle, object);
            }
            MetafileRecord::CreateBrush { handle, brush } => {
                let object = GdiObject::Brush(BrushObject::Plain(brush_from_log(brush)));
                self.apply(&object);
                self.state.objects.insert(*handle, object);
            }
            MetafileRecord::CreatePatternBrush { handle, mono, dib } => match pattern_brush(*mono, *dib) {
                Some(brush) => {
                    let object = GdiObject::Brush(brush);
                    self.apply(&object);
                    self.state.objects.insert(*handle, object);
                }
                None => debug!("Unsupported pattern brush bitmap for handle {}", handle),
            },
            MetafileRecord::CreateFont { handle, font } => {
                let object = GdiObject::Font(font_from_log(font, &self.state.mapping));
                self.apply(&object);
                self.state.objects.insert(*handle, object);
            }
            MetafileRecord::CreatePalette { handle, entries } => {
                let colors = entries.chunks_exact(4).map(|e| Color::rgb(e[0], e[1], e[2])).collect();
                let object = GdiObject::Palette(colors);
                self.apply(&object);
                self.state.objects.insert(*handle, object);
            }
            MetafileRecord::SelectObject(handle) => {
                let object = if *handle >= STOCK_OBJECT_BASE {
                    stock_object(*handle)
                } else {
                    self.state.objects.get(*handle).cloned()
                };
                match object {
                    Some(object) => self.apply(&object),
                    None => debug!("Selecting unknown object {:#x}", handle),
                }
            }
            MetafileRecord::DeleteObject(handle) => self.state.objects.remove(*handle),

            MetafileRecord::Text { wide, runs } => {
                for run in runs {
                    let text = if *wide {
                        decode_utf16(run.bytes, run.chars as usize)
                    } else {
                        decode_ansi(run.bytes)
                    };
                    let (x, y) = (self.sx(run.reference.x), self.sy(run.reference.y));
                    self.canvas.text(x, y, &text);
                    if self.state.update_position {
                        self.state.position = run.reference;
                    }
                }
            }
            MetafileRecord::Blit(blit) => self.blit(blit),

            MetafileRecord::Header | MetafileRecord::Eof | MetafileRecord::Other(_) => {}
        }
    }

    fn figure(&mut self, mode: FigureMode, points: impl Iterator<Item = Point>) {
        self.canvas.begin(mode);
        for p in points {
            let (x, y) = (self.sx(p.x), self.sy(p.y));
            self.canvas.vertex(x, y);
        }
        self.canvas.end();
    }

    fn poly(&mut self, shape: PolyShape, points: &PointArray<'_>) {
        let mode = figure_mode(shape);
        if matches!(shape, PolyShape::PolylineTo | PolyShape::BezierTo) {
            let Some(last) = points.last() else {
                return;
            };
            let start = self.state.position;
            self.figure(mode, std::iter::once(start).chain(points.iter()));
            self.state.position = last;
        } else {
            self.figure(mode, points.iter());
        }
    }

    fn poly_draw(&mut self, points: PointArray<'_>, types: &[u8]) {
        for op in DrawOps::new(points, types) {
            match op {
                DrawOp::MoveTo(p) => self.state.position = p,
                DrawOp::LineTo(p) => self.line_to(p),
                DrawOp::BezierTo(ps) => {
                    let start = self.state.position;
                    self.figure(FigureMode::Bezier, std::iter::once(start).chain(ps));
                    self.state.position = ps[2];
                }
            }
        }
    }

    fn line_to(&mut self, p: Point) {
        let from = self.state.position;
        let (x1, y1) = (self.sx(from.x), self.sy(from.y));
        let (x2, y2) = (self.sx(p.x), self.sy(p.y));
        self.canvas.line(x1, y1, x2, y2);
        self.state.position = p;
    }

    /// Rectangles lose one more unit on the far edges after a null pen
    fn rectangle(&mut self, rect: Rect) {
        let shrink = if self.state.last_pen_null { 1 } else { 0 };
        let xmin = self.sx(rect.left);
        let xmax = self.sx(rect.right - 1 - shrink);
        let ymin = self.sy(rect.bottom - 1 - shrink);
        let ymax = self.sy(rect.top);
        self.canvas.draw_box(xmin, xmax, ymin, ymax);
    }

    /// Mapped centre and extent of an inclusive-exclusive box
    ///
    /// The centre is taken in metafile space before mapping, so odd sums
    /// truncate the same way in both modes.
    fn ellipse_box(&self, rect: Rect) -> (i32, i32, i32, i32) {
        let xc = ((rect.left as i64 + rect.right as i64 - 1) / 2) as i32;
        let yc = ((rect.top as i64 + rect.bottom as i64 - 1) / 2) as i32;
        let w = (rect.right as i64 - rect.left as i64 - 1).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let h = (rect.bottom as i64 - rect.top as i64 - 1).clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        let mapping = &self.state.mapping;
        (self.sx(xc), self.sy(yc), mapping.w(w), mapping.h(h))
    }

    fn angle_arc(&mut self, center: Point, radius: u32, start: f64, sweep: f64) {
        let arc_start = angle_arc_point(center, radius, start);
        self.line_to(arc_start);

        let diameter = radius.saturating_mul(2).min(i32::MAX as u32) as i32;
        let (xc, yc) = (self.sx(center.x), self.sy(center.y));
        let (w, h) = (self.state.mapping.w(diameter), self.state.mapping.h(diameter));
        // the canvas draws counter-clockwise from the first angle
        let (a1, a2) = if sweep >= 0.0 {
            (start, start + sweep)
        } else {
            (start + sweep, start)
        };
        self.canvas.arc(xc, yc, w, h, a1, a2);
        self.state.position = angle_arc_point(center, radius, start + sweep);
    }

    fn apply(&mut self, object: &GdiObject) {
        match object {
            GdiObject::Pen(None) => self.state.last_pen_null = true,
            GdiObject::Pen(Some(pen)) => {
                self.state.last_pen_null = false;
                self.canvas.set_pen(pen);
            }
            GdiObject::Brush(BrushObject::Plain(brush)) => self.canvas.set_brush(brush),
            GdiObject::Brush(BrushObject::Stipple(image)) => {
                self.canvas.set_stipple(image);
                let color = image.colors.get(1).copied().unwrap_or(Color::BLACK);
                self.canvas.set_brush(&Brush {
                    color,
                    interior: Some(InteriorStyle::Stipple),
                });
            }
            GdiObject::Brush(BrushObject::Pattern(image)) => {
                self.canvas.set_pattern(image);
                let color = if image.width > 0 && image.height > 0 {
                    image.pixel(0, 0)
                } else {
                    Color::BLACK
                };
                self.canvas.set_brush(&Brush {
                    color,
                    interior: Some(InteriorStyle::Pattern),
                });
            }
            GdiObject::Font(font) => self.canvas.set_font(font),
            GdiObject::Palette(colors) => self.canvas.set_palette(colors, PaletteMode::Polite),
        }
    }

    fn blit(&mut self, blit: &Blit<'_>) {
        let Some((dib, w, h)) = blit.resolve() else {
            debug!("Skipping {:?} with unsupported bitmap", blit.kind);
            self.skipped_bitmaps += 1;
            return;
        };

        let dest = ImageRect {
            x: self.sx(blit.dest.x),
            y: self.sy(blit.dest.y.saturating_add(h).saturating_sub(1)),
            width: self.state.mapping.w(w),
            height: self.state.mapping.h(h),
        };

        let previous = self.canvas.set_write_mode(blit_write_mode(blit.rop));
        match dib.decode() {
            DecodedImage::Rgb(image) => self.canvas.put_image_rgb(&image, dest),
            DecodedImage::Indexed(image) => self.canvas.put_image_map(&image, dest),
        }
        self.canvas.set_write_mode(previous);
    }
}

fn pattern_brush(mono: bool, source: Option<DibSource<'_>>) -> Option<BrushObject> {
    let source = source?;
    let dib = Dib::reference(source.info, source.bits)?;
    Some(if mono && dib.mode() == DecodeMode::Indexed {
        BrushObject::Stipple(dib.decode_map())
    } else {
        BrushObject::Pattern(dib.decode_rgb())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EmfBuilder;
    use crate::canvas::{LineCap, LineJoin, LineStyle, Pen, WriteMode};
    use crate::emf_records::*;
    use crate::mapper::Viewport;
    use crate::metafile::Metafile;
    use crate::recorder::{CanvasCall, Recorder};
    use crate::state::{PS_NULL, PS_SOLID, SRCINVERT, TA_UPDATECP};

    const RED: Color = Color::rgb(255, 0, 0);

    fn replay(data: &[u8]) -> Vec<CanvasCall> {
        let metafile = Metafile::from_emf(data).unwrap();
        replay_with(&metafile, Mapping::unscaled(metafile.header_box()))
    }

    fn replay_with(metafile: &Metafile<'_>, mapping: Mapping) -> Vec<CanvasCall> {
        let mut recorder = Recorder::new();
        let mut replayer = Replayer::new(&mut recorder, mapping);
        for record in metafile.records() {
            replayer.play(record);
        }
        recorder.calls
    }

    fn builder() -> EmfBuilder {
        EmfBuilder::new(Rect::new(0, 0, 100, 100))
    }

    /// 1x1 24bpp BITMAPINFOHEADER
    fn rgb_pixel_info() -> Vec<u8> {
        let mut info = Vec::new();
        info.extend_from_slice(&40u32.to_le_bytes());
        info.extend_from_slice(&1i32.to_le_bytes());
        info.extend_from_slice(&1i32.to_le_bytes());
        info.extend_from_slice(&1u16.to_le_bytes());
        info.extend_from_slice(&24u16.to_le_bytes());
        info.resize(40, 0);
        info
    }

    #[test]
    fn test_pen_then_line() {
        let mut b = builder();
        b.ext_create_pen(1, PS_SOLID, 3, RED, &[])
            .move_to(Point::new(0, 0))
            .line_to(Point::new(10, 10));
        let calls = replay(&b.finish());
        assert_eq!(
            calls,
            vec![
                CanvasCall::Pen(Pen {
                    style: LineStyle::Continuous,
                    width: 3,
                    color: RED,
                    cap: Some(LineCap::Round),
                    join: Some(LineJoin::Round),
                    dashes: vec![],
                }),
                CanvasCall::Line(0, 99, 10, 89),
            ]
        );
    }

    #[test]
    fn test_null_pen_shrinks_rectangle() {
        let rect = Rect::new(10, 10, 20, 20);

        let mut solid = builder();
        solid.create_pen(1, PS_SOLID, 1, RED).rectangle(rect);
        let mut null = builder();
        null.create_pen(1, PS_NULL, 1, RED).rectangle(rect);

        let solid_calls = replay(&solid.finish());
        let null_calls = replay(&null.finish());
        assert_eq!(solid_calls.last(), Some(&CanvasCall::Box(10, 19, 80, 89)));
        assert_eq!(null_calls, vec![CanvasCall::Box(10, 18, 81, 89)]);
    }

    #[test]
    fn test_equal_arc_angles_wrap_a_full_turn() {
        let rect = Rect::new(0, 0, 21, 21);
        let p = Point::new(20, 10);
        let (a1, a2) = arc_angles(rect, p, p);
        assert_eq!(a1, 0.0);
        assert_eq!(a2, 360.0);

        let mut b = builder();
        b.arc(EMR_PIE, rect, p, p);
        match replay(&b.finish()).as_slice() {
            [CanvasCall::Sector(xc, yc, w, h, s, e)] => {
                assert_eq!((*xc, *yc, *w, *h), (10, 89, 20, 20));
                assert_eq!(*e - *s, 360.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_arc_quarter_counter_clockwise() {
        // from the right-hand point to the top point
        let (a1, a2) = arc_angles(Rect::new(0, 0, 21, 21), Point::new(20, 10), Point::new(10, 0));
        assert!((a1 - 0.0).abs() < 1e-9);
        assert!((a2 - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_ellipse_is_full_sector() {
        let mut b = builder();
        b.ellipse(Rect::new(10, 20, 31, 41));
        assert_eq!(replay(&b.finish()), vec![CanvasCall::Sector(20, 69, 20, 20, 0.0, 360.0)]);
    }

    #[test]
    fn test_ellipse_centre_and_extent_unscaled() {
        let mut b = builder();
        b.ellipse(Rect::new(5, 5, 6, 6)).ellipse(Rect::new(0, 20, 21, 40));
        assert_eq!(
            replay(&b.finish()),
            vec![
                // a one-unit box still gets a one-unit extent
                CanvasCall::Sector(5, 94, 1, 1, 0.0, 360.0),
                // (20 + 40 - 1) / 2 = 29 flips to 70
                CanvasCall::Sector(10, 70, 20, 19, 0.0, 360.0),
            ]
        );
    }

    #[test]
    fn test_ellipse_and_arc_scaled() {
        let mut b = builder();
        b.ellipse(Rect::new(5, 5, 6, 6))
            .ellipse(Rect::new(0, 20, 21, 40))
            .arc(EMR_ARC, Rect::new(0, 0, 21, 21), Point::new(20, 10), Point::new(10, 0));
        let data = b.finish();
        let metafile = Metafile::from_emf(&data).unwrap();
        let mapping = Mapping::new(Rect::new(0, 0, 100, 100), Some(Viewport::new(0, 199, 0, 199)));
        assert!(mapping.is_scaling());

        let calls = replay_with(&metafile, mapping);
        assert_eq!(calls[0], CanvasCall::Sector(10, 188, 1, 1, 0.0, 360.0));
        assert_eq!(calls[1], CanvasCall::Sector(20, 140, 40, 38, 0.0, 360.0));
        match &calls[2] {
            CanvasCall::Arc(xc, yc, w, h, _, _) => assert_eq!((*xc, *yc, *w, *h), (20, 178, 40, 40)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_polyline_to_starts_at_position() {
        let mut b = builder();
        b.move_to(Point::new(5, 5))
            .poly(EMR_POLYLINETO16, &[Point::new(6, 6), Point::new(7, 8)])
            .line_to(Point::new(0, 0));
        assert_eq!(
            replay(&b.finish()),
            vec![
                CanvasCall::Begin(FigureMode::OpenLines),
                CanvasCall::Vertex(5, 94),
                CanvasCall::Vertex(6, 93),
                CanvasCall::Vertex(7, 91),
                CanvasCall::End,
                CanvasCall::Line(7, 91, 0, 99),
            ]
        );
    }

    #[test]
    fn test_polypolygon_one_figure_per_subpath() {
        let a = [Point::new(0, 0), Point::new(1, 0), Point::new(1, 1)];
        let c = [Point::new(5, 5), Point::new(6, 6)];
        let mut b = builder();
        b.poly_poly(EMR_POLYPOLYGON, &[&a, &c]);
        let calls = replay(&b.finish());
        let begins = calls.iter().filter(|c| matches!(c, CanvasCall::Begin(FigureMode::Fill))).count();
        let vertices = calls.iter().filter(|c| matches!(c, CanvasCall::Vertex(..))).count();
        assert_eq!(begins, 2);
        assert_eq!(vertices, 5);
    }

    #[test]
    fn test_poly_draw_steps() {
        use crate::record::{PT_BEZIERTO, PT_CLOSEFIGURE, PT_LINETO, PT_MOVETO};
        let points = [
            Point::new(1, 1),
            Point::new(2, 1),
            Point::new(3, 2),
            Point::new(4, 2),
            Point::new(5, 1),
        ];
        let types = [PT_MOVETO, PT_LINETO | PT_CLOSEFIGURE, PT_BEZIERTO, PT_BEZIERTO, PT_BEZIERTO];
        let mut b = builder();
        b.poly_draw(&points, &types);
        assert_eq!(
            replay(&b.finish()),
            vec![
                CanvasCall::Line(1, 98, 2, 98),
                CanvasCall::Begin(FigureMode::Bezier),
                CanvasCall::Vertex(2, 98),
                CanvasCall::Vertex(3, 97),
                CanvasCall::Vertex(4, 97),
                CanvasCall::Vertex(5, 98),
                CanvasCall::End,
            ]
        );
    }

    #[test]
    fn test_world_transform_modes() {
        let scale = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let shift = [1.0, 0.0, 0.0, 1.0, 3.0, 4.0];
        let metafile_bytes = {
            let mut b = builder();
            b.set_world_transform(scale)
                .modify_world_transform(shift, MWT_LEFTMULTIPLY)
                .modify_world_transform(IDENTITY, 99)
                .modify_world_transform(IDENTITY, MWT_IDENTITY);
            b.finish()
        };
        let metafile = Metafile::from_emf(&metafile_bytes).unwrap();
        let mut recorder = Recorder::new();
        let mut replayer = Replayer::new(&mut recorder, Mapping::unscaled(metafile.header_box()));
        let records = metafile.records();

        replayer.play(&records[0]);
        replayer.play(&records[1]);
        assert_eq!(replayer.state().transform, Some([2.0, 0.0, 0.0, 2.0, 6.0, 8.0]));
        replayer.play(&records[2]);
        replayer.play(&records[3]);
        assert_eq!(replayer.state().transform, None);

        assert_eq!(
            recorder.calls,
            vec![
                CanvasCall::Transform(Some(scale)),
                CanvasCall::MultiplyTransform(shift),
                CanvasCall::Transform(None),
            ]
        );
    }

    #[test]
    fn test_text_updates_position() {
        let mut b = builder();
        b.dword(EMR_SETTEXTALIGN, 24 | TA_UPDATECP)
            .ext_text_out_w(Point::new(30, 40), "Hi")
            .line_to(Point::new(0, 0));
        let calls = replay(&b.finish());
        assert_eq!(
            calls,
            vec![
                CanvasCall::TextAlignment(crate::canvas::TextAlignment::BaseLeft),
                CanvasCall::Text(30, 59, "Hi".to_string()),
                CanvasCall::Line(30, 59, 0, 99),
            ]
        );
    }

    #[test]
    fn test_ansi_text() {
        let mut b = builder();
        b.ext_text_out_a(Point::new(0, 0), b"caf\xe9");
        assert_eq!(replay(&b.finish()), vec![CanvasCall::Text(0, 99, "café".to_string())]);
    }

    #[test]
    fn test_select_reapplies_stored_objects() {
        let mut b = builder();
        b.create_pen(1, PS_SOLID, 2, RED)
            .create_pen(2, PS_NULL, 1, RED)
            .select_object(1)
            .delete_object(1)
            .select_object(1)
            .select_object(STOCK_OBJECT_BASE + 7);
        let calls = replay(&b.finish());
        let pens: Vec<_> = calls.iter().filter(|c| matches!(c, CanvasCall::Pen(_))).collect();
        assert_eq!(pens.len(), 3);
        assert_eq!(pens[1], pens[0]);
        assert_eq!(pens[2], &CanvasCall::Pen(Pen::solid(1, Color::BLACK)));
    }

    #[test]
    fn test_select_clears_null_pen() {
        let rect = Rect::new(10, 10, 20, 20);
        let mut b = builder();
        b.create_pen(1, PS_NULL, 1, RED)
            .select_object(STOCK_OBJECT_BASE + 7)
            .rectangle(rect);
        assert_eq!(replay(&b.finish()).last(), Some(&CanvasCall::Box(10, 19, 80, 89)));
    }

    #[test]
    fn test_blit_restores_write_mode() {
        let info = rgb_pixel_info();
        let bits = [0x10, 0x20, 0x30, 0];
        let mut b = builder();
        b.dword(EMR_SETROP2, 10)
            .bit_blt(EMR_BITBLT, Point::new(4, 6), SRCINVERT, &info, &bits)
            .stretch_dibits(Point::new(0, 0), (10, -20), 0x00CC_0020, &info, &bits);
        let calls = replay(&b.finish());

        assert_eq!(calls[0], CanvasCall::WriteMode(WriteMode::NotXor));
        assert_eq!(calls[1], CanvasCall::WriteMode(WriteMode::Xor));
        match &calls[2] {
            CanvasCall::ImageRgb(image, dest) => {
                assert_eq!(image.pixel(0, 0), Color::rgb(0x30, 0x20, 0x10));
                assert_eq!(*dest, ImageRect { x: 4, y: 93, width: 1, height: 1 });
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(calls[3], CanvasCall::WriteMode(WriteMode::NotXor));

        assert_eq!(calls[4], CanvasCall::WriteMode(WriteMode::Replace));
        assert!(matches!(
            calls[5],
            CanvasCall::ImageRgb(_, ImageRect { x: 0, y: 80, width: 10, height: 20 })
        ));
        assert_eq!(calls[6], CanvasCall::WriteMode(WriteMode::NotXor));
    }

    #[test]
    fn test_unsupported_blit_is_skipped() {
        let mut info = rgb_pixel_info();
        // 12 bits per pixel
        info[14] = 12;
        let metafile_bytes = {
            let mut b = builder();
            b.bit_blt(EMR_BITBLT, Point::new(0, 0), SRCINVERT, &info, &[0; 4]);
            b.finish()
        };
        let metafile = Metafile::from_emf(&metafile_bytes).unwrap();
        let mut recorder = Recorder::new();
        let mut replayer = Replayer::new(&mut recorder, Mapping::unscaled(metafile.header_box()));
        for record in metafile.records() {
            replayer.play(record);
        }
        assert_eq!(replayer.skipped_bitmaps(), 1);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn test_state_records() {
        let mut b = builder();
        b.dword(EMR_SETBKMODE, 1)
            .dword(EMR_SETPOLYFILLMODE, 2)
            .set_text_color(RED)
            .set_bk_color(Color::WHITE)
            .set_pixel(Point::new(3, 3), RED);
        assert_eq!(
            replay(&b.finish()),
            vec![
                CanvasCall::BackOpacity(crate::canvas::BackOpacity::Transparent),
                CanvasCall::FillMode(crate::canvas::FillMode::Winding),
                CanvasCall::TextColor(RED),
                CanvasCall::Background(Color::WHITE),
                CanvasCall::Pixel(3, 96, RED),
            ]
        );
    }

    #[test]
    fn test_palette_and_mono_brush() {
        // 1x1 1bpp with a black/white colour table
        let mut info = rgb_pixel_info();
        info[14] = 1;
        info.extend_from_slice(&[0, 0, 0, 0, 255, 255, 255, 0]);
        let mut b = builder();
        b.create_palette(1, &[RED])
            .create_pattern_brush(2, true, &info, &[0x80, 0, 0, 0]);
        let calls = replay(&b.finish());
        assert_eq!(calls[0], CanvasCall::Palette(vec![RED], PaletteMode::Polite));
        assert!(matches!(&calls[1], CanvasCall::Stipple(image) if image.index == vec![1]));
        assert_eq!(
            calls[2],
            CanvasCall::Brush(Brush {
                color: Color::WHITE,
                interior: Some(InteriorStyle::Stipple),
            })
        );
    }

    #[test]
    fn test_angle_arc() {
        let mut b = builder();
        b.move_to(Point::new(40, 50)).angle_arc(Point::new(50, 50), 10, 0.0, 90.0);
        let metafile_bytes = b.finish();
        let metafile = Metafile::from_emf(&metafile_bytes).unwrap();
        let mut recorder = Recorder::new();
        let mut replayer = Replayer::new(&mut recorder, Mapping::unscaled(metafile.header_box()));
        for record in metafile.records() {
            replayer.play(record);
        }
        assert_eq!(replayer.state().position, Point::new(50, 40));
        assert_eq!(
            recorder.calls,
            vec![CanvasCall::Line(40, 49, 60, 49), CanvasCall::Arc(50, 49, 20, 20, 0.0, 90.0)]
        );
    }
}
