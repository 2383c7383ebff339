//! Decoded EMF records
//!
//! [`MetafileRecord`] borrows its arrays and sub-buffers from the metafile
//! bytes; nothing is copied except small fixed fields. Offsets stored in a
//! record (strings, bitmaps) are relative to the start of that record.

use std::io::{self, Cursor};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::dib::Dib;
use crate::emf_records::*;
use crate::error::{MetafileError, MetafileResult};

/// Size of the type + size prefix every record starts with
pub const RECORD_HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// RECTL; `right` and `bottom` are exclusive for boxes, inclusive for bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// XFORM: `[eM11, eM12, eM21, eM22, eDx, eDy]`
pub type XForm = [f64; 6];

/// Flat POINTL (32-bit) or POINTS (16-bit) array
#[derive(Debug, Clone, Copy)]
pub struct PointArray<'a> {
    bytes: &'a [u8],
    wide: bool,
}

impl<'a> PointArray<'a> {
    pub fn new(bytes: &'a [u8], wide: bool) -> Self {
        Self { bytes, wide }
    }

    fn stride(&self) -> usize {
        if self.wide {
            8
        } else {
            4
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len() / self.stride()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Point> {
        let at = index * self.stride();
        let raw = self.bytes.get(at..at + self.stride())?;
        Some(if self.wide {
            Point::new(LittleEndian::read_i32(&raw[0..4]), LittleEndian::read_i32(&raw[4..8]))
        } else {
            Point::new(
                LittleEndian::read_i16(&raw[0..2]) as i32,
                LittleEndian::read_i16(&raw[2..4]) as i32,
            )
        })
    }

    pub fn last(&self) -> Option<Point> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = Point> + 'a {
        let array = *self;
        (0..array.len()).filter_map(move |i| array.get(i))
    }

    /// Sub-array view of `count` points starting at `start`
    pub fn slice(&self, start: usize, count: usize) -> PointArray<'a> {
        let s = self.stride();
        let from = (start * s).min(self.bytes.len());
        let to = ((start + count) * s).min(self.bytes.len());
        PointArray::new(&self.bytes[from..to], self.wide)
    }
}

/// Packed little-endian u32 array
#[derive(Debug, Clone, Copy)]
pub struct U32Array<'a>(&'a [u8]);

impl<'a> U32Array<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    pub fn len(&self) -> usize {
        self.0.len() / 4
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        self.0.chunks_exact(4).map(LittleEndian::read_u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolyShape {
    Polygon,
    Polyline,
    Bezier,
    /// Polyline continuing from the current position
    PolylineTo,
    /// Bezier continuing from the current position
    BezierTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcKind {
    Arc,
    Chord,
    Pie,
    ArcTo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitKind {
    BitBlt,
    StretchBlt,
    MaskBlt,
    SetDibitsToDevice,
    StretchDibits,
}

/// BITMAPINFO and pixel bytes of an embedded bitmap
#[derive(Debug, Clone, Copy)]
pub struct DibSource<'a> {
    pub info: &'a [u8],
    pub bits: &'a [u8],
}

/// Pen as stored by CREATEPEN or EXTCREATEPEN
#[derive(Debug, Clone, Copy)]
pub struct LogPen<'a> {
    pub style: u32,
    pub width: i32,
    pub color: u32,
    /// Cap, join and custom dashes are only honoured for extended pens
    pub extended: bool,
    pub style_entries: U32Array<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBrush {
    pub style: u32,
    pub color: u32,
    pub hatch: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogFont {
    pub height: i32,
    pub width: i32,
    pub escapement: i32,
    pub orientation: i32,
    pub weight: i32,
    pub italic: u8,
    pub underline: u8,
    pub strikeout: u8,
    pub charset: u8,
    pub face_name: String,
}

/// One string of a text-out record
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    pub reference: Point,
    pub chars: u32,
    /// `chars` bytes for ANSI records, `2 * chars` for wide records
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone)]
pub struct Blit<'a> {
    pub kind: BlitKind,
    pub dest: Point,
    /// Destination extent for stretching records, otherwise the bitmap size is used
    pub dest_size: Option<(i32, i32)>,
    pub rop: Option<u32>,
    pub dib: Option<DibSource<'a>>,
}

impl<'a> Blit<'a> {
    /// Supported bitmap plus the destination extent in metafile units
    ///
    /// `None` when the record carries no bitmap the decoder can handle; such
    /// blits have no effect in either pass.
    pub fn resolve(&self) -> Option<(Dib<'a>, i32, i32)> {
        let source = self.dib?;
        let dib = Dib::reference(source.info, source.bits)?;
        let (w, h) = self.dest_size.unwrap_or((dib.width(), dib.height()));
        Some((dib, w, h.saturating_abs()))
    }
}

/// PT_* vertex types of POLYDRAW, close flag removed
pub const PT_CLOSEFIGURE: u8 = 0x01;
pub const PT_LINETO: u8 = 0x02;
pub const PT_BEZIERTO: u8 = 0x04;
pub const PT_MOVETO: u8 = 0x06;

/// Path step of a POLYDRAW record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOp {
    MoveTo(Point),
    LineTo(Point),
    BezierTo([Point; 3]),
}

/// Walks POLYDRAW points and types together
///
/// Bezier points are consumed in triples; an incomplete triple and unknown
/// type bytes are skipped.
pub struct DrawOps<'a> {
    points: PointArray<'a>,
    types: &'a [u8],
    index: usize,
}

impl<'a> DrawOps<'a> {
    pub fn new(points: PointArray<'a>, types: &'a [u8]) -> Self {
        Self { points, types, index: 0 }
    }

    fn kind(&self, i: usize) -> Option<u8> {
        self.types.get(i).map(|t| t & !PT_CLOSEFIGURE)
    }
}

impl Iterator for DrawOps<'_> {
    type Item = DrawOp;

    fn next(&mut self) -> Option<DrawOp> {
        let len = self.points.len().min(self.types.len());
        while self.index < len {
            let i = self.index;
            let point = self.points.get(i)?;
            match self.kind(i) {
                Some(PT_MOVETO) => {
                    self.index += 1;
                    return Some(DrawOp::MoveTo(point));
                }
                Some(PT_LINETO) => {
                    self.index += 1;
                    return Some(DrawOp::LineTo(point));
                }
                Some(PT_BEZIERTO)
                    if i + 2 < len
                        && self.kind(i + 1) == Some(PT_BEZIERTO)
                        && self.kind(i + 2) == Some(PT_BEZIERTO) =>
                {
                    self.index += 3;
                    return Some(DrawOp::BezierTo([point, self.points.get(i + 1)?, self.points.get(i + 2)?]));
                }
                _ => self.index += 1,
            }
        }
        None
    }
}

/// One decoded record
#[derive(Debug, Clone)]
pub enum MetafileRecord<'a> {
    Header,
    Eof,
    Poly {
        shape: PolyShape,
        points: PointArray<'a>,
    },
    PolyPoly {
        shape: PolyShape,
        counts: U32Array<'a>,
        points: PointArray<'a>,
    },
    PolyDraw {
        points: PointArray<'a>,
        types: &'a [u8],
    },
    SetPixel {
        point: Point,
        color: u32,
    },
    MoveTo(Point),
    LineTo(Point),
    AngleArc {
        center: Point,
        radius: u32,
        start: f32,
        sweep: f32,
    },
    Ellipse(Rect),
    Rectangle(Rect),
    RoundRect {
        rect: Rect,
        corner: Point,
    },
    Arc {
        kind: ArcKind,
        rect: Rect,
        start: Point,
        end: Point,
    },
    SetBkMode(u32),
    SetRop2(u32),
    SetPolyFillMode(u32),
    SetTextAlign(u32),
    SetTextColor(u32),
    SetBkColor(u32),
    SetWorldTransform(XForm),
    ModifyWorldTransform {
        xform: XForm,
        mode: u32,
    },
    SelectObject(u32),
    DeleteObject(u32),
    CreatePen {
        handle: u32,
        pen: LogPen<'a>,
    },
    CreateBrush {
        handle: u32,
        brush: LogBrush,
    },
    CreatePatternBrush {
        handle: u32,
        /// CREATEMONOBRUSH rather than CREATEDIBPATTERNBRUSHPT
        mono: bool,
        dib: Option<DibSource<'a>>,
    },
    CreateFont {
        handle: u32,
        font: LogFont,
    },
    CreatePalette {
        handle: u32,
        /// PALETTEENTRY quads: red, green, blue, flags
        entries: &'a [u8],
    },
    Text {
        wide: bool,
        runs: Vec<TextRun<'a>>,
    },
    Blit(Blit<'a>),
    /// Any record without visual effect here
    Other(u32),
}

impl<'a> MetafileRecord<'a> {
    /// Decode one complete record (header included); `offset` is only used for errors
    pub fn decode(record_type: u32, record: &'a [u8], offset: usize) -> MetafileResult<Self> {
        decode_fields(record_type, record).map_err(|e| {
            let reason = if e.kind() == io::ErrorKind::UnexpectedEof {
                "record ends before its fixed fields".to_string()
            } else {
                e.to_string()
            };
            MetafileError::malformed(offset, get_record_type_name(record_type), reason)
        })
    }
}

fn invalid(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}

/// Bounds-checked sub-slice of a record
fn take(record: &[u8], start: usize, len: usize) -> io::Result<&[u8]> {
    start
        .checked_add(len)
        .and_then(|end| record.get(start..end))
        .ok_or_else(|| invalid(format!("array of {} bytes at {} exceeds record size {}", len, start, record.len())))
}

fn cursor_at(record: &[u8], pos: usize) -> Cursor<&[u8]> {
    let mut cursor = Cursor::new(record);
    cursor.set_position(pos as u64);
    cursor
}

fn read_point(cursor: &mut Cursor<&[u8]>) -> io::Result<Point> {
    let x = cursor.read_i32::<LittleEndian>()?;
    let y = cursor.read_i32::<LittleEndian>()?;
    Ok(Point::new(x, y))
}

fn read_rect(cursor: &mut Cursor<&[u8]>) -> io::Result<Rect> {
    let left = cursor.read_i32::<LittleEndian>()?;
    let top = cursor.read_i32::<LittleEndian>()?;
    let right = cursor.read_i32::<LittleEndian>()?;
    let bottom = cursor.read_i32::<LittleEndian>()?;
    Ok(Rect::new(left, top, right, bottom))
}

fn read_xform(cursor: &mut Cursor<&[u8]>) -> io::Result<XForm> {
    let mut m = [0.0; 6];
    for v in m.iter_mut() {
        *v = cursor.read_f32::<LittleEndian>()? as f64;
    }
    Ok(m)
}

fn u32_at(record: &[u8], pos: usize) -> io::Result<u32> {
    cursor_at(record, pos).read_u32::<LittleEndian>()
}

/// Resolve an embedded bitmap; `None` when absent or out of range
fn dib_at<'a>(record: &'a [u8], pos: usize) -> io::Result<Option<DibSource<'a>>> {
    let mut cursor = cursor_at(record, pos);
    let off_bmi = cursor.read_u32::<LittleEndian>()? as usize;
    let cb_bmi = cursor.read_u32::<LittleEndian>()? as usize;
    let off_bits = cursor.read_u32::<LittleEndian>()? as usize;
    let cb_bits = cursor.read_u32::<LittleEndian>()? as usize;

    if cb_bmi == 0 {
        return Ok(None);
    }
    Ok(match (take(record, off_bmi, cb_bmi), take(record, off_bits, cb_bits)) {
        (Ok(info), Ok(bits)) => Some(DibSource { info, bits }),
        _ => None,
    })
}

fn poly<'a>(record: &'a [u8], shape: PolyShape, wide: bool) -> io::Result<MetafileRecord<'a>> {
    let count = u32_at(record, 24)? as usize;
    let size = if wide { 8 } else { 4 };
    let bytes = take(record, 28, count.saturating_mul(size))?;
    Ok(MetafileRecord::Poly {
        shape,
        points: PointArray::new(bytes, wide),
    })
}

fn poly_poly<'a>(record: &'a [u8], shape: PolyShape, wide: bool) -> io::Result<MetafileRecord<'a>> {
    let mut cursor = cursor_at(record, 24);
    let n_polys = cursor.read_u32::<LittleEndian>()? as usize;
    let n_points = cursor.read_u32::<LittleEndian>()? as usize;

    let counts = U32Array::new(take(record, 32, n_polys.saturating_mul(4))?);
    let total: u64 = counts.iter().map(u64::from).sum();
    if total != n_points as u64 {
        return Err(invalid(format!(
            "subpath counts add up to {} but the record declares {} points",
            total, n_points
        )));
    }

    let size = if wide { 8 } else { 4 };
    let bytes = take(record, 32 + n_polys * 4, n_points.saturating_mul(size))?;
    Ok(MetafileRecord::PolyPoly {
        shape,
        counts,
        points: PointArray::new(bytes, wide),
    })
}

fn poly_draw<'a>(record: &'a [u8], wide: bool) -> io::Result<MetafileRecord<'a>> {
    let count = u32_at(record, 24)? as usize;
    let size = if wide { 8 } else { 4 };
    let bytes = take(record, 28, count.saturating_mul(size))?;
    let types = take(record, 28 + bytes.len(), count)?;
    Ok(MetafileRecord::PolyDraw {
        points: PointArray::new(bytes, wide),
        types,
    })
}

fn arc(record: &[u8], kind: ArcKind) -> io::Result<MetafileRecord<'_>> {
    let mut cursor = cursor_at(record, 8);
    let rect = read_rect(&mut cursor)?;
    let start = read_point(&mut cursor)?;
    let end = read_point(&mut cursor)?;
    Ok(MetafileRecord::Arc { kind, rect, start, end })
}

/// EMRTEXT at `pos`
fn text_run(record: &[u8], pos: usize, wide: bool) -> io::Result<TextRun<'_>> {
    let mut cursor = cursor_at(record, pos);
    let reference = read_point(&mut cursor)?;
    let chars = cursor.read_u32::<LittleEndian>()?;
    let off_string = cursor.read_u32::<LittleEndian>()? as usize;
    let len = if wide {
        (chars as usize).saturating_mul(2)
    } else {
        chars as usize
    };
    let bytes = if chars == 0 { &record[0..0] } else { take(record, off_string, len)? };
    Ok(TextRun { reference, chars, bytes })
}

fn blit<'a>(record: &'a [u8], kind: BlitKind) -> io::Result<MetafileRecord<'a>> {
    let mut cursor = cursor_at(record, 24);
    let blit = match kind {
        BlitKind::BitBlt | BlitKind::StretchBlt | BlitKind::MaskBlt => {
            let dest = read_point(&mut cursor)?;
            let cx_dest = cursor.read_i32::<LittleEndian>()?;
            let cy_dest = cursor.read_i32::<LittleEndian>()?;
            let rop = cursor.read_u32::<LittleEndian>()?;
            let dest_size = (kind == BlitKind::StretchBlt).then_some((cx_dest, cy_dest));
            Blit {
                kind,
                dest,
                dest_size,
                rop: Some(rop),
                dib: dib_at(record, 84)?,
            }
        }
        BlitKind::SetDibitsToDevice => {
            let dest = read_point(&mut cursor)?;
            Blit {
                kind,
                dest,
                dest_size: None,
                rop: None,
                dib: dib_at(record, 48)?,
            }
        }
        BlitKind::StretchDibits => {
            let dest = read_point(&mut cursor)?;
            let mut tail = cursor_at(record, 68);
            let rop = tail.read_u32::<LittleEndian>()?;
            let cx_dest = tail.read_i32::<LittleEndian>()?;
            let cy_dest = tail.read_i32::<LittleEndian>()?;
            Blit {
                kind,
                dest,
                dest_size: Some((cx_dest, cy_dest)),
                rop: Some(rop),
                dib: dib_at(record, 48)?,
            }
        }
    };
    Ok(MetafileRecord::Blit(blit))
}

fn create_font(record: &[u8]) -> io::Result<MetafileRecord<'_>> {
    let mut cursor = cursor_at(record, 8);
    let handle = cursor.read_u32::<LittleEndian>()?;
    let height = cursor.read_i32::<LittleEndian>()?;
    let width = cursor.read_i32::<LittleEndian>()?;
    let escapement = cursor.read_i32::<LittleEndian>()?;
    let orientation = cursor.read_i32::<LittleEndian>()?;
    let weight = cursor.read_i32::<LittleEndian>()?;
    let italic = cursor.read_u8()?;
    let underline = cursor.read_u8()?;
    let strikeout = cursor.read_u8()?;
    let charset = cursor.read_u8()?;
    // precision, quality, pitch and family
    let _ = cursor.read_u32::<LittleEndian>()?;

    let face = take(record, 40, 64)?;
    let face_name = crate::text::decode_utf16(face, 32);

    Ok(MetafileRecord::CreateFont {
        handle,
        font: LogFont {
            height,
            width,
            escapement,
            orientation,
            weight,
            italic,
            underline,
            strikeout,
            charset,
            face_name,
        },
    })
}

fn decode_fields(record_type: u32, record: &[u8]) -> io::Result<MetafileRecord<'_>> {
    Ok(match record_type {
        EMR_HEADER => MetafileRecord::Header,
        EMR_EOF => MetafileRecord::Eof,

        EMR_POLYGON => poly(record, PolyShape::Polygon, true)?,
        EMR_POLYLINE => poly(record, PolyShape::Polyline, true)?,
        EMR_POLYBEZIER => poly(record, PolyShape::Bezier, true)?,
        EMR_POLYLINETO => poly(record, PolyShape::PolylineTo, true)?,
        EMR_POLYBEZIERTO => poly(record, PolyShape::BezierTo, true)?,
        EMR_POLYGON16 => poly(record, PolyShape::Polygon, false)?,
        EMR_POLYLINE16 => poly(record, PolyShape::Polyline, false)?,
        EMR_POLYBEZIER16 => poly(record, PolyShape::Bezier, false)?,
        EMR_POLYLINETO16 => poly(record, PolyShape::PolylineTo, false)?,
        EMR_POLYBEZIERTO16 => poly(record, PolyShape::BezierTo, false)?,

        EMR_POLYPOLYGON => poly_poly(record, PolyShape::Polygon, true)?,
        EMR_POLYPOLYLINE => poly_poly(record, PolyShape::Polyline, true)?,
        EMR_POLYPOLYGON16 => poly_poly(record, PolyShape::Polygon, false)?,
        EMR_POLYPOLYLINE16 => poly_poly(record, PolyShape::Polyline, false)?,

        EMR_POLYDRAW => poly_draw(record, true)?,
        EMR_POLYDRAW16 => poly_draw(record, false)?,

        EMR_SETPIXELV => {
            let mut cursor = cursor_at(record, 8);
            let point = read_point(&mut cursor)?;
            let color = cursor.read_u32::<LittleEndian>()?;
            MetafileRecord::SetPixel { point, color }
        }
        EMR_MOVETOEX => MetafileRecord::MoveTo(read_point(&mut cursor_at(record, 8))?),
        EMR_LINETO => MetafileRecord::LineTo(read_point(&mut cursor_at(record, 8))?),
        EMR_ANGLEARC => {
            let mut cursor = cursor_at(record, 8);
            let center = read_point(&mut cursor)?;
            let radius = cursor.read_u32::<LittleEndian>()?;
            let start = cursor.read_f32::<LittleEndian>()?;
            let sweep = cursor.read_f32::<LittleEndian>()?;
            MetafileRecord::AngleArc { center, radius, start, sweep }
        }
        EMR_ELLIPSE => MetafileRecord::Ellipse(read_rect(&mut cursor_at(record, 8))?),
        EMR_RECTANGLE => MetafileRecord::Rectangle(read_rect(&mut cursor_at(record, 8))?),
        EMR_ROUNDRECT => {
            let mut cursor = cursor_at(record, 8);
            let rect = read_rect(&mut cursor)?;
            let corner = read_point(&mut cursor)?;
            MetafileRecord::RoundRect { rect, corner }
        }
        EMR_ARC => arc(record, ArcKind::Arc)?,
        EMR_CHORD => arc(record, ArcKind::Chord)?,
        EMR_PIE => arc(record, ArcKind::Pie)?,
        EMR_ARCTO => arc(record, ArcKind::ArcTo)?,

        EMR_SETBKMODE => MetafileRecord::SetBkMode(u32_at(record, 8)?),
        EMR_SETROP2 => MetafileRecord::SetRop2(u32_at(record, 8)?),
        EMR_SETPOLYFILLMODE => MetafileRecord::SetPolyFillMode(u32_at(record, 8)?),
        EMR_SETTEXTALIGN => MetafileRecord::SetTextAlign(u32_at(record, 8)?),
        EMR_SETTEXTCOLOR => MetafileRecord::SetTextColor(u32_at(record, 8)?),
        EMR_SETBKCOLOR => MetafileRecord::SetBkColor(u32_at(record, 8)?),

        EMR_SETWORLDTRANSFORM => MetafileRecord::SetWorldTransform(read_xform(&mut cursor_at(record, 8))?),
        EMR_MODIFYWORLDTRANSFORM => {
            let mut cursor = cursor_at(record, 8);
            let xform = read_xform(&mut cursor)?;
            let mode = cursor.read_u32::<LittleEndian>()?;
            MetafileRecord::ModifyWorldTransform { xform, mode }
        }

        EMR_SELECTOBJECT => MetafileRecord::SelectObject(u32_at(record, 8)?),
        EMR_DELETEOBJECT => MetafileRecord::DeleteObject(u32_at(record, 8)?),
        EMR_CREATEPEN => {
            let mut cursor = cursor_at(record, 8);
            let handle = cursor.read_u32::<LittleEndian>()?;
            let style = cursor.read_u32::<LittleEndian>()?;
            let width = cursor.read_i32::<LittleEndian>()?;
            let _width_y = cursor.read_i32::<LittleEndian>()?;
            let color = cursor.read_u32::<LittleEndian>()?;
            MetafileRecord::CreatePen {
                handle,
                pen: LogPen {
                    style,
                    width,
                    color,
                    extended: false,
                    style_entries: U32Array::new(&[]),
                },
            }
        }
        EMR_EXTCREATEPEN => {
            let handle = u32_at(record, 8)?;
            let mut cursor = cursor_at(record, 28);
            let style = cursor.read_u32::<LittleEndian>()?;
            let width = cursor.read_u32::<LittleEndian>()? as i32;
            let _brush_style = cursor.read_u32::<LittleEndian>()?;
            let color = cursor.read_u32::<LittleEndian>()?;
            let _hatch = cursor.read_u32::<LittleEndian>()?;
            let entries = cursor.read_u32::<LittleEndian>()? as usize;
            let style_entries = U32Array::new(take(record, 52, entries.saturating_mul(4))?);
            MetafileRecord::CreatePen {
                handle,
                pen: LogPen {
                    style,
                    width,
                    color,
                    extended: true,
                    style_entries,
                },
            }
        }
        EMR_CREATEBRUSHINDIRECT => {
            let mut cursor = cursor_at(record, 8);
            let handle = cursor.read_u32::<LittleEndian>()?;
            let style = cursor.read_u32::<LittleEndian>()?;
            let color = cursor.read_u32::<LittleEndian>()?;
            let hatch = cursor.read_u32::<LittleEndian>()?;
            MetafileRecord::CreateBrush {
                handle,
                brush: LogBrush { style, color, hatch },
            }
        }
        EMR_CREATEMONOBRUSH | EMR_CREATEDIBPATTERNBRUSHPT => MetafileRecord::CreatePatternBrush {
            handle: u32_at(record, 8)?,
            mono: record_type == EMR_CREATEMONOBRUSH,
            dib: dib_at(record, 16)?,
        },
        EMR_EXTCREATEFONTINDIRECTW => create_font(record)?,
        EMR_CREATEPALETTE => {
            let handle = u32_at(record, 8)?;
            let mut cursor = cursor_at(record, 12);
            let _version = cursor.read_u16::<LittleEndian>()?;
            let count = cursor.read_u16::<LittleEndian>()? as usize;
            MetafileRecord::CreatePalette {
                handle,
                entries: take(record, 16, count * 4)?,
            }
        }

        EMR_EXTTEXTOUTA | EMR_EXTTEXTOUTW => MetafileRecord::Text {
            wide: record_type == EMR_EXTTEXTOUTW,
            runs: vec![text_run(record, 36, record_type == EMR_EXTTEXTOUTW)?],
        },
        EMR_POLYTEXTOUTA | EMR_POLYTEXTOUTW => {
            let wide = record_type == EMR_POLYTEXTOUTW;
            let count = u32_at(record, 36)? as usize;
            take(record, 40, count.saturating_mul(40))?;
            let runs = (0..count)
                .map(|i| text_run(record, 40 + i * 40, wide))
                .collect::<io::Result<Vec<_>>>()?;
            MetafileRecord::Text { wide, runs }
        }

        EMR_BITBLT => blit(record, BlitKind::BitBlt)?,
        EMR_STRETCHBLT => blit(record, BlitKind::StretchBlt)?,
        EMR_MASKBLT => blit(record, BlitKind::MaskBlt)?,
        EMR_SETDIBITSTODEVICE => blit(record, BlitKind::SetDibitsToDevice)?,
        EMR_STRETCHDIBITS => blit(record, BlitKind::StretchDibits)?,

        other => MetafileRecord::Other(other),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn record(record_type: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(record_type).unwrap();
        buf.write_u32::<LittleEndian>((payload.len() + 8) as u32).unwrap();
        buf.extend_from_slice(payload);
        buf
    }

    fn words(values: &[i32]) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in values {
            buf.write_i32::<LittleEndian>(*v).unwrap();
        }
        buf
    }

    #[test]
    fn test_decode_polyline16() {
        let mut payload = words(&[0, 0, 10, 10, 2]);
        for v in [1i16, 2, -3, 4] {
            payload.write_i16::<LittleEndian>(v).unwrap();
        }
        let rec = record(EMR_POLYLINE16, &payload);
        match MetafileRecord::decode(EMR_POLYLINE16, &rec, 0).unwrap() {
            MetafileRecord::Poly { shape, points } => {
                assert_eq!(shape, PolyShape::Polyline);
                let pts: Vec<Point> = points.iter().collect();
                assert_eq!(pts, vec![Point::new(1, 2), Point::new(-3, 4)]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_point_count_past_record_end() {
        let rec = record(EMR_POLYGON, &words(&[0, 0, 0, 0, 100, 1, 1]));
        let err = MetafileRecord::decode(EMR_POLYGON, &rec, 64).unwrap_err();
        match err {
            MetafileError::MalformedRecord { offset, kind, .. } => {
                assert_eq!(offset, 64);
                assert_eq!(kind, "EMR_POLYGON");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_polypolygon_count_mismatch() {
        // two subpaths of 2 + 2 points but only 3 declared
        let rec = record(
            EMR_POLYPOLYGON,
            &words(&[0, 0, 0, 0, 2, 3, 2, 2, 0, 0, 1, 1, 2, 2]),
        );
        assert!(MetafileRecord::decode(EMR_POLYPOLYGON, &rec, 0).is_err());
    }

    #[test]
    fn test_short_record_is_malformed() {
        let rec = record(EMR_RECTANGLE, &words(&[1, 2]));
        assert!(matches!(
            MetafileRecord::decode(EMR_RECTANGLE, &rec, 0),
            Err(MetafileError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_unknown_record_is_other() {
        let rec = record(EMR_GDICOMMENT, &words(&[0]));
        assert!(matches!(
            MetafileRecord::decode(EMR_GDICOMMENT, &rec, 0).unwrap(),
            MetafileRecord::Other(EMR_GDICOMMENT)
        ));
        assert!(matches!(MetafileRecord::decode(9999, &record(9999, &[]), 0).unwrap(), MetafileRecord::Other(9999)));
    }

    #[test]
    fn test_point_array_slice() {
        let bytes = words(&[1, 1, 2, 2, 3, 3]);
        let array = PointArray::new(&bytes, true);
        assert_eq!(array.len(), 3);
        let tail = array.slice(1, 2);
        assert_eq!(tail.iter().collect::<Vec<_>>(), vec![Point::new(2, 2), Point::new(3, 3)]);
        assert_eq!(array.last(), Some(Point::new(3, 3)));
        assert!(array.slice(3, 0).is_empty());
    }

    #[test]
    fn test_blit_without_bitmap() {
        let mut payload = words(&[0, 0, 0, 0, 5, 6, 7, 8]);
        payload.extend(words(&[0x00F0_0021u32 as i32]));
        payload.resize(100 - 8, 0);
        let rec = record(EMR_BITBLT, &payload);
        match MetafileRecord::decode(EMR_BITBLT, &rec, 0).unwrap() {
            MetafileRecord::Blit(blit) => {
                assert_eq!(blit.dest, Point::new(5, 6));
                assert_eq!(blit.dest_size, None);
                assert_eq!(blit.rop, Some(0x00F0_0021));
                assert!(blit.dib.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
