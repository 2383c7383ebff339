//! Bounding-box pre-pass
//!
//! Visits every geometry-bearing record once and accumulates the tight box of
//! everything the replay pass will draw. The box is only used to derive the
//! scale factors; it is discarded afterwards.

use log::trace;

use crate::record::{ArcKind, DrawOp, DrawOps, MetafileRecord, Point, PolyShape, Rect};
use crate::state::text_alignment;

/// Initial extreme for an untouched box side
pub const SENTINEL: i32 = 0xFF_FFFF;

/// Accumulator with exclusive right/bottom edges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            left: SENTINEL,
            top: SENTINEL,
            right: -SENTINEL,
            bottom: -SENTINEL,
        }
    }
}

impl BoundingBox {
    pub fn add_x(&mut self, x: i32) {
        self.left = self.left.min(x);
        self.right = self.right.max(x.saturating_add(1));
    }

    pub fn add_y(&mut self, y: i32) {
        self.top = self.top.min(y);
        self.bottom = self.bottom.max(y.saturating_add(1));
    }

    pub fn add_point(&mut self, p: Point) {
        self.add_x(p.x);
        self.add_y(p.y);
    }

    pub fn add_rect(&mut self, r: Rect) {
        self.add_x(r.left);
        self.add_x(r.right);
        self.add_y(r.top);
        self.add_y(r.bottom);
    }

    /// Final box; an axis that never received a coordinate collapses to zero
    pub fn finish(self) -> Rect {
        let (left, right) = if self.left == SENTINEL || self.right == -SENTINEL {
            (0, 0)
        } else {
            (self.left, self.right)
        };
        let (top, bottom) = if self.top == SENTINEL || self.bottom == -SENTINEL {
            (0, 0)
        } else {
            (self.top, self.bottom)
        };
        Rect::new(left, top, right, bottom)
    }
}

/// Pre-pass state: the box plus the current position, which `...TO`
/// records and line-to draw from
#[derive(Debug, Default)]
pub struct Measure {
    pub bbox: BoundingBox,
    position: Point,
    update_position: bool,
}

impl Measure {
    /// Account for one record
    pub fn measure_record(&mut self, record: &MetafileRecord<'_>) {
        trace!("measure {}", record_label(record));
        let bbox = &mut self.bbox;

        match record {
            MetafileRecord::Poly { shape, points } => {
                if matches!(shape, PolyShape::PolylineTo | PolyShape::BezierTo) && !points.is_empty() {
                    bbox.add_point(self.position);
                }
                for p in points.iter() {
                    bbox.add_point(p);
                }
                if matches!(shape, PolyShape::PolylineTo | PolyShape::BezierTo) {
                    if let Some(last) = points.last() {
                        self.position = last;
                    }
                }
            }
            MetafileRecord::PolyPoly { counts, points, .. } => {
                let mut start = 0;
                for count in counts.iter() {
                    let subpath = points.slice(start, count as usize);
                    for p in subpath.iter() {
                        bbox.add_point(p);
                    }
                    start += count as usize;
                }
            }
            MetafileRecord::PolyDraw { points, types } => {
                for op in DrawOps::new(*points, types) {
                    match op {
                        DrawOp::MoveTo(p) => self.position = p,
                        DrawOp::LineTo(p) => {
                            bbox.add_point(self.position);
                            bbox.add_point(p);
                            self.position = p;
                        }
                        DrawOp::BezierTo(ps) => {
                            bbox.add_point(self.position);
                            for p in ps {
                                bbox.add_point(p);
                            }
                            self.position = ps[2];
                        }
                    }
                }
            }
            MetafileRecord::SetPixel { point, .. } => bbox.add_point(*point),
            MetafileRecord::MoveTo(p) => {
                bbox.add_point(*p);
                self.position = *p;
            }
            MetafileRecord::LineTo(p) => {
                bbox.add_point(self.position);
                bbox.add_point(*p);
                self.position = *p;
            }
            MetafileRecord::AngleArc { center, radius, start, sweep } => {
                let r = (*radius).min(i32::MAX as u32) as i32;
                bbox.add_point(self.position);
                bbox.add_rect(Rect::new(
                    center.x.saturating_sub(r),
                    center.y.saturating_sub(r),
                    center.x.saturating_add(r),
                    center.y.saturating_add(r),
                ));
                self.position = angle_arc_point(*center, *radius, (*start + *sweep) as f64);
            }
            MetafileRecord::Ellipse(r) | MetafileRecord::Rectangle(r) => bbox.add_rect(*r),
            MetafileRecord::RoundRect { rect, .. } => bbox.add_rect(*rect),
            MetafileRecord::Arc { kind, rect, end, .. } => {
                bbox.add_rect(*rect);
                if *kind == ArcKind::ArcTo {
                    self.position = *end;
                }
            }
            MetafileRecord::SetTextAlign(mode) => self.update_position = text_alignment(*mode).1,
            MetafileRecord::Text { runs, .. } => {
                for run in runs {
                    bbox.add_point(run.reference);
                    if self.update_position {
                        self.position = run.reference;
                    }
                }
            }
            MetafileRecord::Blit(blit) => {
                if let Some((_, w, h)) = blit.resolve() {
                    bbox.add_x(blit.dest.x);
                    bbox.add_y(blit.dest.y);
                    bbox.add_x(blit.dest.x.saturating_add(w));
                    bbox.add_y(blit.dest.y.saturating_add(h));
                }
            }
            _ => {}
        }
    }
}

/// Point on an ANGLEARC circle at `angle` degrees, metafile y pointing down
pub fn angle_arc_point(center: Point, radius: u32, angle: f64) -> Point {
    let rad = angle.to_radians();
    Point::new(
        center.x.saturating_add((radius as f64 * rad.cos()).round() as i32),
        center.y.saturating_sub((radius as f64 * rad.sin()).round() as i32),
    )
}

/// Tight box of all drawn geometry, zero-sized when nothing is drawn
pub fn measure(records: &[MetafileRecord<'_>]) -> Rect {
    let mut measure = Measure::default();
    for record in records {
        measure.measure_record(record);
    }
    measure.bbox.finish()
}

pub(crate) fn record_label(record: &MetafileRecord<'_>) -> &'static str {
    use crate::emf_records::*;
    let tag = match record {
        MetafileRecord::Header => EMR_HEADER,
        MetafileRecord::Eof => EMR_EOF,
        MetafileRecord::Poly { shape, .. } => match shape {
            PolyShape::Polygon => EMR_POLYGON,
            PolyShape::Polyline => EMR_POLYLINE,
            PolyShape::Bezier => EMR_POLYBEZIER,
            PolyShape::PolylineTo => EMR_POLYLINETO,
            PolyShape::BezierTo => EMR_POLYBEZIERTO,
        },
        MetafileRecord::PolyPoly { shape, .. } => {
            if *shape == PolyShape::Polygon {
                EMR_POLYPOLYGON
            } else {
                EMR_POLYPOLYLINE
            }
        }
        MetafileRecord::PolyDraw { .. } => EMR_POLYDRAW,
        MetafileRecord::SetPixel { .. } => EMR_SETPIXELV,
        MetafileRecord::MoveTo(_) => EMR_MOVETOEX,
        MetafileRecord::LineTo(_) => EMR_LINETO,
        MetafileRecord::AngleArc { .. } => EMR_ANGLEARC,
        MetafileRecord::Ellipse(_) => EMR_ELLIPSE,
        MetafileRecord::Rectangle(_) => EMR_RECTANGLE,
        MetafileRecord::RoundRect { .. } => EMR_ROUNDRECT,
        MetafileRecord::Arc { kind, .. } => match kind {
            ArcKind::Arc => EMR_ARC,
            ArcKind::Chord => EMR_CHORD,
            ArcKind::Pie => EMR_PIE,
            ArcKind::ArcTo => EMR_ARCTO,
        },
        MetafileRecord::SetBkMode(_) => EMR_SETBKMODE,
        MetafileRecord::SetRop2(_) => EMR_SETROP2,
        MetafileRecord::SetPolyFillMode(_) => EMR_SETPOLYFILLMODE,
        MetafileRecord::SetTextAlign(_) => EMR_SETTEXTALIGN,
        MetafileRecord::SetTextColor(_) => EMR_SETTEXTCOLOR,
        MetafileRecord::SetBkColor(_) => EMR_SETBKCOLOR,
        MetafileRecord::SetWorldTransform(_) => EMR_SETWORLDTRANSFORM,
        MetafileRecord::ModifyWorldTransform { .. } => EMR_MODIFYWORLDTRANSFORM,
        MetafileRecord::SelectObject(_) => EMR_SELECTOBJECT,
        MetafileRecord::DeleteObject(_) => EMR_DELETEOBJECT,
        MetafileRecord::CreatePen { pen, .. } => {
            if pen.extended {
                EMR_EXTCREATEPEN
            } else {
                EMR_CREATEPEN
            }
        }
        MetafileRecord::CreateBrush { .. } => EMR_CREATEBRUSHINDIRECT,
        MetafileRecord::CreatePatternBrush { mono, .. } => {
            if *mono {
                EMR_CREATEMONOBRUSH
            } else {
                EMR_CREATEDIBPATTERNBRUSHPT
            }
        }
        MetafileRecord::CreateFont { .. } => EMR_EXTCREATEFONTINDIRECTW,
        MetafileRecord::CreatePalette { .. } => EMR_CREATEPALETTE,
        MetafileRecord::Text { wide, .. } => {
            if *wide {
                EMR_EXTTEXTOUTW
            } else {
                EMR_EXTTEXTOUTA
            }
        }
        MetafileRecord::Blit(blit) => match blit.kind {
            crate::record::BlitKind::BitBlt => EMR_BITBLT,
            crate::record::BlitKind::StretchBlt => EMR_STRETCHBLT,
            crate::record::BlitKind::MaskBlt => EMR_MASKBLT,
            crate::record::BlitKind::SetDibitsToDevice => EMR_SETDIBITSTODEVICE,
            crate::record::BlitKind::StretchDibits => EMR_STRETCHDIBITS,
        },
        MetafileRecord::Other(tag) => *tag,
    };
    get_record_type_name(tag)
}
