//! EMF byte stream writer
//!
//! Used to re-encode WMF records as EMF and to assemble metafiles in tests.
//! Records are appended in call order; [`EmfBuilder::finish`] prepends the
//! header and appends EMR_EOF.

use crate::canvas::Color;
use crate::emf_records::*;
use crate::header::{ENHMETAHEADER_SIZE, ENHMETA_SIGNATURE};
use crate::record::{LogFont, Point, Rect, XForm};

/// Little-endian record payload
#[derive(Default)]
struct Payload(Vec<u8>);

impl Payload {
    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u32(&mut self, v: u32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn i32(&mut self, v: i32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn f32(&mut self, v: f32) -> &mut Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn point(&mut self, p: Point) -> &mut Self {
        self.i32(p.x).i32(p.y)
    }

    fn point16(&mut self, p: Point) -> &mut Self {
        self.0.extend_from_slice(&(p.x as i16).to_le_bytes());
        self.0.extend_from_slice(&(p.y as i16).to_le_bytes());
        self
    }

    fn rect(&mut self, r: Rect) -> &mut Self {
        self.i32(r.left).i32(r.top).i32(r.right).i32(r.bottom)
    }

    fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.0.extend_from_slice(b);
        self
    }

    fn pad(&mut self) -> &mut Self {
        while self.0.len() % 4 != 0 {
            self.0.push(0);
        }
        self
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// Inclusive bounds of a point set
fn point_bounds<'p>(points: impl IntoIterator<Item = &'p Point>) -> Rect {
    let mut iter = points.into_iter();
    let Some(first) = iter.next() else {
        return Rect::default();
    };
    iter.fold(Rect::new(first.x, first.y, first.x, first.y), |r, p| {
        Rect::new(r.left.min(p.x), r.top.min(p.y), r.right.max(p.x), r.bottom.max(p.y))
    })
}

fn is_16bit(record_type: u32) -> bool {
    (EMR_POLYBEZIER16..=EMR_POLYDRAW16).contains(&record_type)
}

/// Fixed BITMAPINFO + bits placement shared by blit and brush records
///
/// `fixed` is the record size before the bitmap, header included.
fn append_dib(payload: &mut Payload, fixed: usize, info: &[u8], bits: &[u8]) -> (u32, u32, u32, u32) {
    let off_bmi = fixed as u32;
    let padded_info = (info.len() + 3) & !3;
    let off_bits = (fixed + padded_info) as u32;
    payload.bytes(info).pad().bytes(bits).pad();
    (off_bmi, info.len() as u32, off_bits, bits.len() as u32)
}

pub struct EmfBuilder {
    bounds: Rect,
    device: (i32, i32),
    millimeters: (i32, i32),
    body: Vec<u8>,
    records: u32,
    handles: u32,
}

impl EmfBuilder {
    /// Builder for a picture covering `bounds`, with a one pixel per millimetre reference device
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            device: (1000, 1000),
            millimeters: (1000, 1000),
            body: Vec::new(),
            records: 0,
            handles: 1,
        }
    }

    /// Reference device size in pixels and millimetres; the frame follows from it
    pub fn with_reference(mut self, device: (i32, i32), millimeters: (i32, i32)) -> Self {
        self.device = device;
        self.millimeters = millimeters;
        self
    }

    /// Append a raw record; the payload is padded to a multiple of four bytes
    pub fn record(&mut self, record_type: u32, payload: &[u8]) -> &mut Self {
        let padded = (payload.len() + 3) & !3;
        self.body.extend_from_slice(&record_type.to_le_bytes());
        self.body.extend_from_slice(&((padded + 8) as u32).to_le_bytes());
        self.body.extend_from_slice(payload);
        self.body.resize(self.body.len() + padded - payload.len(), 0);
        self.records += 1;
        self
    }

    fn push(&mut self, record_type: u32, payload: Payload) -> &mut Self {
        self.record(record_type, &payload.0)
    }

    fn uses_handle(&mut self, handle: u32) {
        self.handles = self.handles.max(handle.saturating_add(1));
    }

    /// POLYGON, POLYLINE, POLYBEZIER and their TO / 16-bit forms
    pub fn poly(&mut self, record_type: u32, points: &[Point]) -> &mut Self {
        let mut p = Payload::default();
        p.rect(point_bounds(points)).u32(points.len() as u32);
        for &pt in points {
            if is_16bit(record_type) {
                p.point16(pt);
            } else {
                p.point(pt);
            }
        }
        self.push(record_type, p)
    }

    /// POLYPOLYGON / POLYPOLYLINE and their 16-bit forms
    pub fn poly_poly(&mut self, record_type: u32, polys: &[&[Point]]) -> &mut Self {
        let total: usize = polys.iter().map(|poly| poly.len()).sum();
        let mut p = Payload::default();
        p.rect(point_bounds(polys.iter().flat_map(|poly| poly.iter())))
            .u32(polys.len() as u32)
            .u32(total as u32);
        for poly in polys {
            p.u32(poly.len() as u32);
        }
        for &pt in polys.iter().flat_map(|poly| poly.iter()) {
            if is_16bit(record_type) {
                p.point16(pt);
            } else {
                p.point(pt);
            }
        }
        self.push(record_type, p)
    }

    /// POLYDRAW with its PT_* type bytes
    pub fn poly_draw(&mut self, points: &[Point], types: &[u8]) -> &mut Self {
        let mut p = Payload::default();
        p.rect(point_bounds(points)).u32(points.len() as u32);
        for &pt in points {
            p.point(pt);
        }
        p.bytes(types);
        self.push(EMR_POLYDRAW, p)
    }

    pub fn set_pixel(&mut self, point: Point, color: Color) -> &mut Self {
        let mut p = Payload::default();
        p.point(point).u32(color.to_colorref());
        self.push(EMR_SETPIXELV, p)
    }

    pub fn move_to(&mut self, point: Point) -> &mut Self {
        let mut p = Payload::default();
        p.point(point);
        self.push(EMR_MOVETOEX, p)
    }

    pub fn line_to(&mut self, point: Point) -> &mut Self {
        let mut p = Payload::default();
        p.point(point);
        self.push(EMR_LINETO, p)
    }

    pub fn angle_arc(&mut self, center: Point, radius: u32, start: f32, sweep: f32) -> &mut Self {
        let mut p = Payload::default();
        p.point(center).u32(radius).f32(start).f32(sweep);
        self.push(EMR_ANGLEARC, p)
    }

    pub fn rectangle(&mut self, rect: Rect) -> &mut Self {
        let mut p = Payload::default();
        p.rect(rect);
        self.push(EMR_RECTANGLE, p)
    }

    pub fn round_rect(&mut self, rect: Rect, corner: Point) -> &mut Self {
        let mut p = Payload::default();
        p.rect(rect).point(corner);
        self.push(EMR_ROUNDRECT, p)
    }

    pub fn ellipse(&mut self, rect: Rect) -> &mut Self {
        let mut p = Payload::default();
        p.rect(rect);
        self.push(EMR_ELLIPSE, p)
    }

    /// ARC, CHORD, PIE or ARCTO
    pub fn arc(&mut self, record_type: u32, rect: Rect, start: Point, end: Point) -> &mut Self {
        let mut p = Payload::default();
        p.rect(rect).point(start).point(end);
        self.push(record_type, p)
    }

    /// Single-DWORD records: SETBKMODE, SETROP2, SETTEXTALIGN, SELECTOBJECT, ...
    pub fn dword(&mut self, record_type: u32, value: u32) -> &mut Self {
        let mut p = Payload::default();
        p.u32(value);
        self.push(record_type, p)
    }

    pub fn set_text_color(&mut self, color: Color) -> &mut Self {
        self.dword(EMR_SETTEXTCOLOR, color.to_colorref())
    }

    pub fn set_bk_color(&mut self, color: Color) -> &mut Self {
        self.dword(EMR_SETBKCOLOR, color.to_colorref())
    }

    pub fn select_object(&mut self, handle: u32) -> &mut Self {
        self.dword(EMR_SELECTOBJECT, handle)
    }

    pub fn delete_object(&mut self, handle: u32) -> &mut Self {
        self.dword(EMR_DELETEOBJECT, handle)
    }

    pub fn set_world_transform(&mut self, xform: XForm) -> &mut Self {
        let mut p = Payload::default();
        for v in xform {
            p.f32(v as f32);
        }
        self.push(EMR_SETWORLDTRANSFORM, p)
    }

    pub fn modify_world_transform(&mut self, xform: XForm, mode: u32) -> &mut Self {
        let mut p = Payload::default();
        for v in xform {
            p.f32(v as f32);
        }
        p.u32(mode);
        self.push(EMR_MODIFYWORLDTRANSFORM, p)
    }

    pub fn create_pen(&mut self, handle: u32, style: u32, width: i32, color: Color) -> &mut Self {
        self.uses_handle(handle);
        let mut p = Payload::default();
        p.u32(handle).u32(style).i32(width).i32(0).u32(color.to_colorref());
        self.push(EMR_CREATEPEN, p)
    }

    /// EXTCREATEPEN without a brush bitmap
    pub fn ext_create_pen(&mut self, handle: u32, style: u32, width: u32, color: Color, dashes: &[u32]) -> &mut Self {
        self.uses_handle(handle);
        let mut p = Payload::default();
        p.u32(handle).u32(0).u32(0).u32(0).u32(0);
        p.u32(style).u32(width).u32(0).u32(color.to_colorref()).u32(0);
        p.u32(dashes.len() as u32);
        for &d in dashes {
            p.u32(d);
        }
        self.push(EMR_EXTCREATEPEN, p)
    }

    pub fn create_brush(&mut self, handle: u32, style: u32, color: Color, hatch: u32) -> &mut Self {
        self.uses_handle(handle);
        let mut p = Payload::default();
        p.u32(handle).u32(style).u32(color.to_colorref()).u32(hatch);
        self.push(EMR_CREATEBRUSHINDIRECT, p)
    }

    /// CREATEMONOBRUSH when `mono`, CREATEDIBPATTERNBRUSHPT otherwise
    pub fn create_pattern_brush(&mut self, handle: u32, mono: bool, info: &[u8], bits: &[u8]) -> &mut Self {
        self.uses_handle(handle);
        let fixed = 32;
        let mut dib = Payload::default();
        let (off_bmi, cb_bmi, off_bits, cb_bits) = append_dib(&mut dib, fixed, info, bits);
        let mut p = Payload::default();
        p.u32(handle).u32(0).u32(off_bmi).u32(cb_bmi).u32(off_bits).u32(cb_bits);
        p.bytes(&dib.0);
        let record_type = if mono { EMR_CREATEMONOBRUSH } else { EMR_CREATEDIBPATTERNBRUSHPT };
        self.push(record_type, p)
    }

    pub fn create_font(&mut self, handle: u32, font: &LogFont) -> &mut Self {
        self.uses_handle(handle);
        let mut p = Payload::default();
        p.u32(handle)
            .i32(font.height)
            .i32(font.width)
            .i32(font.escapement)
            .i32(font.orientation)
            .i32(font.weight);
        p.bytes(&[font.italic, font.underline, font.strikeout, font.charset, 0, 0, 0, 0]);
        let mut face: Vec<u16> = font.face_name.encode_utf16().take(31).collect();
        face.resize(32, 0);
        for unit in face {
            p.u16(unit);
        }
        self.push(EMR_EXTCREATEFONTINDIRECTW, p)
    }

    pub fn create_palette(&mut self, handle: u32, colors: &[Color]) -> &mut Self {
        self.uses_handle(handle);
        let mut p = Payload::default();
        p.u32(handle).u16(0x300).u16(colors.len() as u16);
        for c in colors {
            p.bytes(&[c.r, c.g, c.b, 0]);
        }
        self.push(EMR_CREATEPALETTE, p)
    }

    /// EXTTEXTOUTA (ANSI bytes) or EXTTEXTOUTW
    fn ext_text_out(&mut self, reference: Point, string: &[u8], chars: usize, wide: bool) -> &mut Self {
        // header + bounds + graphics mode + scales + EMRTEXT
        let fixed = 8 + 16 + 12 + 40;
        let mut p = Payload::default();
        p.rect(Rect::default()).u32(1).f32(0.0).f32(0.0);
        p.point(reference).u32(chars as u32).u32(fixed as u32).u32(0).rect(Rect::default()).u32(0);
        p.bytes(string).pad();
        self.push(if wide { EMR_EXTTEXTOUTW } else { EMR_EXTTEXTOUTA }, p)
    }

    pub fn ext_text_out_a(&mut self, reference: Point, string: &[u8]) -> &mut Self {
        self.ext_text_out(reference, string, string.len(), false)
    }

    pub fn ext_text_out_w(&mut self, reference: Point, text: &str) -> &mut Self {
        let units: Vec<u8> = text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        self.ext_text_out(reference, &units, units.len() / 2, true)
    }

    /// POLYTEXTOUTW with one EMRTEXT per string
    pub fn poly_text_out_w(&mut self, runs: &[(Point, &str)]) -> &mut Self {
        let fixed = 8 + 16 + 12 + 4 + 40 * runs.len();
        let encoded: Vec<Vec<u8>> = runs
            .iter()
            .map(|(_, text)| text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect())
            .collect();

        let mut p = Payload::default();
        p.rect(Rect::default()).u32(1).f32(0.0).f32(0.0).u32(runs.len() as u32);
        let mut offset = fixed;
        for ((reference, _), units) in runs.iter().zip(&encoded) {
            p.point(*reference)
                .u32((units.len() / 2) as u32)
                .u32(offset as u32)
                .u32(0)
                .rect(Rect::default())
                .u32(0);
            offset += (units.len() + 3) & !3;
        }
        for units in &encoded {
            p.bytes(units).pad();
        }
        self.push(EMR_POLYTEXTOUTW, p)
    }

    /// BITBLT / MASKBLT (the mask is omitted) at the bitmap's own size
    pub fn bit_blt(&mut self, record_type: u32, dest: Point, rop: u32, info: &[u8], bits: &[u8]) -> &mut Self {
        let fixed = if record_type == EMR_MASKBLT { 128 } else { 100 };
        let mut dib = Payload::default();
        let (off_bmi, cb_bmi, off_bits, cb_bits) = append_dib(&mut dib, fixed, info, bits);

        let mut p = Payload::default();
        p.rect(Rect::default()).point(dest).i32(0).i32(0).u32(rop).i32(0).i32(0);
        p.f32(1.0).f32(0.0).f32(0.0).f32(1.0).f32(0.0).f32(0.0);
        p.u32(0).u32(0).u32(off_bmi).u32(cb_bmi).u32(off_bits).u32(cb_bits);
        if record_type == EMR_MASKBLT {
            p.i32(0).i32(0).u32(0).u32(0).u32(0).u32(0).u32(0);
        }
        debug_assert_eq!(p.len() + 8, fixed);
        p.bytes(&dib.0);
        self.push(record_type, p)
    }

    pub fn stretch_blt(&mut self, dest: Point, size: (i32, i32), rop: u32, info: &[u8], bits: &[u8]) -> &mut Self {
        let fixed = 108;
        let mut dib = Payload::default();
        let (off_bmi, cb_bmi, off_bits, cb_bits) = append_dib(&mut dib, fixed, info, bits);

        let mut p = Payload::default();
        p.rect(Rect::default()).point(dest).i32(size.0).i32(size.1).u32(rop).i32(0).i32(0);
        p.f32(1.0).f32(0.0).f32(0.0).f32(1.0).f32(0.0).f32(0.0);
        p.u32(0).u32(0).u32(off_bmi).u32(cb_bmi).u32(off_bits).u32(cb_bits);
        p.i32(0).i32(0);
        p.bytes(&dib.0);
        self.push(EMR_STRETCHBLT, p)
    }

    pub fn set_dibits_to_device(&mut self, dest: Point, info: &[u8], bits: &[u8]) -> &mut Self {
        let fixed = 76;
        let mut dib = Payload::default();
        let (off_bmi, cb_bmi, off_bits, cb_bits) = append_dib(&mut dib, fixed, info, bits);

        let mut p = Payload::default();
        p.rect(Rect::default()).point(dest).i32(0).i32(0).i32(0).i32(0);
        p.u32(off_bmi).u32(cb_bmi).u32(off_bits).u32(cb_bits).u32(0).u32(0).u32(0);
        p.bytes(&dib.0);
        self.push(EMR_SETDIBITSTODEVICE, p)
    }

    pub fn stretch_dibits(&mut self, dest: Point, size: (i32, i32), rop: u32, info: &[u8], bits: &[u8]) -> &mut Self {
        let fixed = 80;
        let mut dib = Payload::default();
        let (off_bmi, cb_bmi, off_bits, cb_bits) = append_dib(&mut dib, fixed, info, bits);

        let mut p = Payload::default();
        p.rect(Rect::default()).point(dest).i32(0).i32(0).i32(0).i32(0);
        p.u32(off_bmi).u32(cb_bmi).u32(off_bits).u32(cb_bits).u32(0).u32(rop).i32(size.0).i32(size.1);
        p.bytes(&dib.0);
        self.push(EMR_STRETCHDIBITS, p)
    }

    /// Header record + body + EMR_EOF
    pub fn finish(mut self) -> Vec<u8> {
        // EMR_EOF: nPalEntries, offPalEntries, nSizeLast
        self.record(EMR_EOF, &[0, 0, 0, 0, 16, 0, 0, 0, 20, 0, 0, 0]);

        let xres = resolution(self.device.0, self.millimeters.0);
        let yres = resolution(self.device.1, self.millimeters.1);
        let frame = |v: i32, res: f64| (v as f64 * 100.0 / res).round() as i32;

        let total = ENHMETAHEADER_SIZE + self.body.len();
        let mut p = Payload::default();
        p.rect(self.bounds)
            .rect(Rect::new(
                frame(self.bounds.left, xres),
                frame(self.bounds.top, yres),
                frame(self.bounds.right, xres),
                frame(self.bounds.bottom, yres),
            ))
            .u32(ENHMETA_SIGNATURE)
            .u32(0x0001_0000)
            .u32(total as u32)
            .u32(self.records + 1)
            .u16(self.handles.min(u16::MAX as u32) as u16)
            .u16(0)
            .u32(0)
            .u32(0)
            .u32(0)
            .i32(self.device.0)
            .i32(self.device.1)
            .i32(self.millimeters.0)
            .i32(self.millimeters.1);

        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&EMR_HEADER.to_le_bytes());
        out.extend_from_slice(&(ENHMETAHEADER_SIZE as u32).to_le_bytes());
        out.extend_from_slice(&p.0);
        out.extend_from_slice(&self.body);
        out
    }
}

fn resolution(pixels: i32, mm: i32) -> f64 {
    let res = pixels as f64 / mm as f64;
    if res.is_finite() && res > 0.0 {
        res
    } else {
        1.0
    }
}
