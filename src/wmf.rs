//! WMF parsing and promotion to EMF
//!
//! Windows metafiles are not played directly. [`promote`] walks the 16-bit
//! records and re-encodes the drawing ones as EMF records with
//! [`EmfBuilder`], so a single replay path serves both formats.
//!
//! WMF parameters are stored last-to-first: a rectangle is
//! `bottom, right, top, left`.

use std::io::{self, Cursor};

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use log::debug;

use crate::builder::EmfBuilder;
use crate::canvas::Color;
use crate::emf_records::*;
use crate::error::{MetafileError, MetafileResult};
use crate::placeable::{PlaceableHeader, PLACEABLE_HEADER_SIZE};
use crate::record::{LogFont, Point, Rect};
use crate::text::decode_ansi;

const META_EOF: u16 = 0x0000;
const META_SETBKCOLOR: u16 = 0x0201;
const META_SETBKMODE: u16 = 0x0102;
const META_SETROP2: u16 = 0x0104;
const META_SETPOLYFILLMODE: u16 = 0x0106;
const META_SETTEXTALIGN: u16 = 0x012E;
const META_SETTEXTCOLOR: u16 = 0x0209;
const META_LINETO: u16 = 0x0213;
const META_MOVETO: u16 = 0x0214;
const META_ELLIPSE: u16 = 0x0418;
const META_RECTANGLE: u16 = 0x041B;
const META_SETPIXEL: u16 = 0x041F;
const META_ROUNDRECT: u16 = 0x061C;
const META_ARC: u16 = 0x0817;
const META_PIE: u16 = 0x081A;
const META_CHORD: u16 = 0x0830;
const META_POLYGON: u16 = 0x0324;
const META_POLYLINE: u16 = 0x0325;
const META_POLYPOLYGON: u16 = 0x0538;
const META_TEXTOUT: u16 = 0x0521;
const META_EXTTEXTOUT: u16 = 0x0A32;
const META_SELECTOBJECT: u16 = 0x012D;
const META_DELETEOBJECT: u16 = 0x01F0;
const META_CREATEPENINDIRECT: u16 = 0x02FA;
const META_CREATEBRUSHINDIRECT: u16 = 0x02FC;
const META_CREATEFONTINDIRECT: u16 = 0x02FB;
const META_CREATEPALETTE: u16 = 0x00F7;
const META_CREATEPATTERNBRUSH: u16 = 0x01F9;
const META_CREATEREGION: u16 = 0x06FF;
const META_DIBCREATEPATTERNBRUSH: u16 = 0x0142;
const META_DIBBITBLT: u16 = 0x0940;
const META_DIBSTRETCHBLT: u16 = 0x0B41;
const META_STRETCHDIB: u16 = 0x0F43;
const META_SETDIBTODEV: u16 = 0x0D33;

const WMF_HEADER_SIZE: usize = 18;
/// Record size and function fields
const WMF_RECORD_PREFIX: usize = 6;

const ETO_OPAQUE: u16 = 0x0002;
const ETO_CLIPPED: u16 = 0x0004;

const BS_DIBPATTERNPT: u16 = 6;

pub fn get_function_name(function: u16) -> &'static str {
    match function {
        META_EOF => "META_EOF",
        META_SETBKCOLOR => "META_SETBKCOLOR",
        META_SETBKMODE => "META_SETBKMODE",
        META_SETROP2 => "META_SETROP2",
        META_SETPOLYFILLMODE => "META_SETPOLYFILLMODE",
        META_SETTEXTALIGN => "META_SETTEXTALIGN",
        META_SETTEXTCOLOR => "META_SETTEXTCOLOR",
        META_LINETO => "META_LINETO",
        META_MOVETO => "META_MOVETO",
        META_ELLIPSE => "META_ELLIPSE",
        META_RECTANGLE => "META_RECTANGLE",
        META_SETPIXEL => "META_SETPIXEL",
        META_ROUNDRECT => "META_ROUNDRECT",
        META_ARC => "META_ARC",
        META_PIE => "META_PIE",
        META_CHORD => "META_CHORD",
        META_POLYGON => "META_POLYGON",
        META_POLYLINE => "META_POLYLINE",
        META_POLYPOLYGON => "META_POLYPOLYGON",
        META_TEXTOUT => "META_TEXTOUT",
        META_EXTTEXTOUT => "META_EXTTEXTOUT",
        META_SELECTOBJECT => "META_SELECTOBJECT",
        META_DELETEOBJECT => "META_DELETEOBJECT",
        META_CREATEPENINDIRECT => "META_CREATEPENINDIRECT",
        META_CREATEBRUSHINDIRECT => "META_CREATEBRUSHINDIRECT",
        META_CREATEFONTINDIRECT => "META_CREATEFONTINDIRECT",
        META_CREATEPALETTE => "META_CREATEPALETTE",
        META_CREATEPATTERNBRUSH => "META_CREATEPATTERNBRUSH",
        META_CREATEREGION => "META_CREATEREGION",
        META_DIBCREATEPATTERNBRUSH => "META_DIBCREATEPATTERNBRUSH",
        META_DIBBITBLT => "META_DIBBITBLT",
        META_DIBSTRETCHBLT => "META_DIBSTRETCHBLT",
        META_STRETCHDIB => "META_STRETCHDIB",
        META_SETDIBTODEV => "META_SETDIBTODEV",
        _ => "META_UNKNOWN",
    }
}

/// Check for a placeable header or a plain WMF header
pub fn is_wmf_format(data: &[u8]) -> bool {
    if data.len() >= 4 && LittleEndian::read_u32(&data[0..4]) == crate::placeable::PLACEABLE_KEY {
        return true;
    }
    if data.len() >= 6 {
        let file_type = LittleEndian::read_u16(&data[0..2]);
        let header_words = LittleEndian::read_u16(&data[2..4]);
        let version = LittleEndian::read_u16(&data[4..6]);
        return matches!(file_type, 1 | 2) && header_words == 9 && matches!(version, 0x0100 | 0x0300);
    }
    false
}

/// Word-indexed view of a record's parameters
struct Params<'a>(&'a [u8]);

impl<'a> Params<'a> {
    fn i16(&self, index: usize) -> io::Result<i16> {
        self.0
            .get(index * 2..index * 2 + 2)
            .map(LittleEndian::read_i16)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "parameter past record end"))
    }

    fn u16(&self, index: usize) -> io::Result<u16> {
        self.i16(index).map(|v| v as u16)
    }

    fn i32(&self, index: usize) -> io::Result<i32> {
        self.i16(index).map(i32::from)
    }

    /// COLORREF spanning two words
    fn color(&self, index: usize) -> io::Result<Color> {
        let low = self.u16(index)? as u32;
        let high = self.u16(index + 1)? as u32;
        Ok(Color::from_colorref(low | high << 16))
    }

    fn u32(&self, index: usize) -> io::Result<u32> {
        let low = self.u16(index)? as u32;
        let high = self.u16(index + 1)? as u32;
        Ok(low | high << 16)
    }

    /// Rectangle stored as `bottom, right, top, left` from word `index`
    fn rect(&self, index: usize) -> io::Result<Rect> {
        let bottom = self.i32(index)?;
        let right = self.i32(index + 1)?;
        let top = self.i32(index + 2)?;
        let left = self.i32(index + 3)?;
        Ok(Rect::new(left, top, right, bottom))
    }

    /// Point stored as `y, x`
    fn point_yx(&self, index: usize) -> io::Result<Point> {
        Ok(Point::new(self.i32(index + 1)?, self.i32(index)?))
    }

    /// Point stored as `x, y`
    fn point_xy(&self, index: usize) -> io::Result<Point> {
        Ok(Point::new(self.i32(index)?, self.i32(index + 1)?))
    }

    fn points(&self, index: usize, count: usize) -> io::Result<Vec<Point>> {
        (0..count).map(|i| self.point_xy(index + i * 2)).collect()
    }

    fn bytes_from(&self, index: usize) -> &'a [u8] {
        self.0.get(index * 2..).unwrap_or(&[])
    }

    fn bytes(&self, index: usize, len: usize) -> io::Result<&'a [u8]> {
        self.0
            .get(index * 2..index * 2 + len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "string past record end"))
    }
}

/// Split a packed DIB into BITMAPINFO and pixel bytes
fn split_dib(dib: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut cursor = Cursor::new(dib);
    let header_size = cursor.read_u32::<LittleEndian>().ok()? as usize;
    cursor.set_position(14);
    let bit_count = cursor.read_u16::<LittleEndian>().ok()?;
    let compression = cursor.read_u32::<LittleEndian>().ok()?;
    cursor.set_position(32);
    let clr_used = cursor.read_u32::<LittleEndian>().ok()? as usize;

    let masks = if compression == 3 && header_size == 40 { 12 } else { 0 };
    let colors = if bit_count <= 8 {
        if clr_used == 0 {
            1usize << bit_count
        } else {
            clr_used
        }
    } else {
        clr_used
    };
    let info_len = header_size.checked_add(masks)?.checked_add(colors.checked_mul(4)?)?;
    if info_len > dib.len() {
        return None;
    }
    Some(dib.split_at(info_len))
}

/// Blit records without a bitmap are exactly `(function >> 8) + 3` words long
/// and describe a pattern fill instead
fn has_bitmap(function: u16, params: &Params<'_>) -> bool {
    params.0.len() / 2 + 3 != (function >> 8) as usize
}

/// Lowest-free-index object slots
#[derive(Default)]
struct Slots(Vec<bool>);

impl Slots {
    fn allocate(&mut self) -> usize {
        match self.0.iter().position(|used| !used) {
            Some(slot) => {
                self.0[slot] = true;
                slot
            }
            None => {
                self.0.push(true);
                self.0.len() - 1
            }
        }
    }

    fn free(&mut self, slot: usize) {
        if let Some(used) = self.0.get_mut(slot) {
            *used = false;
        }
    }
}

/// EMF object handle for a WMF slot
fn handle(slot: usize) -> u32 {
    slot as u32 + 1
}

struct Promoter {
    builder: EmfBuilder,
    slots: Slots,
}

impl Promoter {
    fn record(&mut self, function: u16, p: &Params<'_>) -> io::Result<()> {
        let b = &mut self.builder;
        match function {
            META_SETBKCOLOR => {
                b.set_bk_color(p.color(0)?);
            }
            META_SETTEXTCOLOR => {
                b.set_text_color(p.color(0)?);
            }
            META_SETBKMODE => {
                b.dword(EMR_SETBKMODE, p.u16(0)? as u32);
            }
            META_SETROP2 => {
                b.dword(EMR_SETROP2, p.u16(0)? as u32);
            }
            META_SETPOLYFILLMODE => {
                b.dword(EMR_SETPOLYFILLMODE, p.u16(0)? as u32);
            }
            META_SETTEXTALIGN => {
                b.dword(EMR_SETTEXTALIGN, p.u16(0)? as u32);
            }
            META_MOVETO => {
                b.move_to(p.point_yx(0)?);
            }
            META_LINETO => {
                b.line_to(p.point_yx(0)?);
            }
            META_SETPIXEL => {
                let color = p.color(0)?;
                b.set_pixel(p.point_yx(2)?, color);
            }
            META_RECTANGLE => {
                b.rectangle(p.rect(0)?);
            }
            META_ELLIPSE => {
                b.ellipse(p.rect(0)?);
            }
            META_ROUNDRECT => {
                let corner = Point::new(p.i32(1)?, p.i32(0)?);
                b.round_rect(p.rect(2)?, corner);
            }
            META_ARC | META_PIE | META_CHORD => {
                let end = p.point_yx(0)?;
                let start = p.point_yx(2)?;
                let rect = p.rect(4)?;
                let tag = match function {
                    META_ARC => EMR_ARC,
                    META_PIE => EMR_PIE,
                    _ => EMR_CHORD,
                };
                b.arc(tag, rect, start, end);
            }
            META_POLYGON | META_POLYLINE => {
                let count = p.u16(0)? as usize;
                let points = p.points(1, count)?;
                let tag = if function == META_POLYGON { EMR_POLYGON16 } else { EMR_POLYLINE16 };
                b.poly(tag, &points);
            }
            META_POLYPOLYGON => {
                let polys = p.u16(0)? as usize;
                let counts = (0..polys).map(|i| p.u16(1 + i).map(usize::from)).collect::<io::Result<Vec<_>>>()?;
                let mut at = 1 + polys;
                let mut subpaths = Vec::with_capacity(polys);
                for count in counts {
                    subpaths.push(p.points(at, count)?);
                    at += count * 2;
                }
                let refs: Vec<&[Point]> = subpaths.iter().map(Vec::as_slice).collect();
                b.poly_poly(EMR_POLYPOLYGON16, &refs);
            }
            META_TEXTOUT => {
                let len = p.u16(0)? as usize;
                let string = p.bytes(1, len)?;
                let after = 1 + (len + 1) / 2;
                let reference = p.point_yx(after)?;
                b.ext_text_out_a(reference, string);
            }
            META_EXTTEXTOUT => {
                let reference = p.point_yx(0)?;
                let len = p.u16(2)? as usize;
                let options = p.u16(3)?;
                let start = if options & (ETO_OPAQUE | ETO_CLIPPED) != 0 { 8 } else { 4 };
                let string = p.bytes(start, len)?;
                b.ext_text_out_a(reference, string);
            }

            META_CREATEPENINDIRECT => {
                let style = p.u16(0)? as u32;
                let width = p.i32(1)?;
                let color = p.color(3)?;
                let slot = self.slots.allocate();
                self.builder.create_pen(handle(slot), style, width, color);
            }
            META_CREATEBRUSHINDIRECT => {
                let style = p.u16(0)? as u32;
                let color = p.color(1)?;
                let hatch = p.u16(3)? as u32;
                let slot = self.slots.allocate();
                self.builder.create_brush(handle(slot), style, color, hatch);
            }
            META_CREATEFONTINDIRECT => {
                let flags = p.bytes(5, 8)?;
                let font = LogFont {
                    height: p.i32(0)?,
                    width: p.i32(1)?,
                    escapement: p.i32(2)?,
                    orientation: p.i32(3)?,
                    weight: p.i32(4)?,
                    italic: flags[0],
                    underline: flags[1],
                    strikeout: flags[2],
                    charset: flags[3],
                    face_name: decode_ansi(p.bytes_from(9)),
                };
                let slot = self.slots.allocate();
                self.builder.create_font(handle(slot), &font);
            }
            META_CREATEPALETTE => {
                let count = p.u16(1)? as usize;
                let entries = p.bytes(2, count * 4)?;
                let colors: Vec<Color> = entries.chunks_exact(4).map(|e| Color::rgb(e[0], e[1], e[2])).collect();
                let slot = self.slots.allocate();
                self.builder.create_palette(handle(slot), &colors);
            }
            META_DIBCREATEPATTERNBRUSH => {
                let style = p.u16(0)?;
                let slot = self.slots.allocate();
                match split_dib(p.bytes_from(2)) {
                    Some((info, bits)) if style == BS_DIBPATTERNPT => {
                        // a 1-bit pattern plays as a stipple
                        let mono = info.len() >= 16 && LittleEndian::read_u16(&info[14..16]) == 1;
                        self.builder.create_pattern_brush(handle(slot), mono, info, bits);
                    }
                    _ => debug!("Pattern brush in slot {} has no usable DIB", slot),
                }
            }
            META_CREATEPATTERNBRUSH | META_CREATEREGION => {
                let slot = self.slots.allocate();
                debug!("{} in slot {} has no EMF promotion", get_function_name(function), slot);
            }
            META_SELECTOBJECT => {
                b.select_object(handle(p.u16(0)? as usize));
            }
            META_DELETEOBJECT => {
                let slot = p.u16(0)? as usize;
                self.slots.free(slot);
                self.builder.delete_object(handle(slot));
            }

            META_DIBBITBLT => {
                if !has_bitmap(function, p) {
                    debug!("META_DIBBITBLT without bitmap dropped");
                    return Ok(());
                }
                let rop = p.u32(0)?;
                let dest = p.point_yx(6)?;
                match split_dib(p.bytes_from(8)) {
                    Some((info, bits)) => {
                        b.bit_blt(EMR_BITBLT, dest, rop, info, bits);
                    }
                    None => debug!("META_DIBBITBLT with unreadable bitmap dropped"),
                }
            }
            META_DIBSTRETCHBLT => {
                if !has_bitmap(function, p) {
                    debug!("META_DIBSTRETCHBLT without bitmap dropped");
                    return Ok(());
                }
                let rop = p.u32(0)?;
                let size = (p.i32(7)?, p.i32(6)?);
                let dest = p.point_yx(8)?;
                match split_dib(p.bytes_from(10)) {
                    Some((info, bits)) => {
                        b.stretch_blt(dest, size, rop, info, bits);
                    }
                    None => debug!("META_DIBSTRETCHBLT with unreadable bitmap dropped"),
                }
            }
            META_STRETCHDIB => {
                let rop = p.u32(0)?;
                let size = (p.i32(8)?, p.i32(7)?);
                let dest = p.point_yx(9)?;
                match split_dib(p.bytes_from(11)) {
                    Some((info, bits)) => {
                        b.stretch_dibits(dest, size, rop, info, bits);
                    }
                    None => debug!("META_STRETCHDIB with unreadable bitmap dropped"),
                }
            }
            META_SETDIBTODEV => {
                let dest = p.point_yx(7)?;
                match split_dib(p.bytes_from(9)) {
                    Some((info, bits)) => {
                        b.set_dibits_to_device(dest, info, bits);
                    }
                    None => debug!("META_SETDIBTODEV with unreadable bitmap dropped"),
                }
            }

            other => debug!("{} ({:#06x}) has no EMF promotion", get_function_name(other), other),
        }
        Ok(())
    }
}

/// Re-encode a WMF stream (placeable or not) as EMF
///
/// The promoted header bounds are the placeable bounding box, or an empty
/// box when there is none.
pub fn promote(data: &[u8]) -> MetafileResult<Vec<u8>> {
    if data.is_empty() {
        return Err(MetafileError::Empty);
    }
    let placeable = PlaceableHeader::parse(data)?;
    let start = if placeable.is_some() { PLACEABLE_HEADER_SIZE } else { 0 };
    if !is_wmf_format(&data[start..]) {
        return Err(if placeable.is_some() {
            MetafileError::InvalidHeader("placeable header is not followed by a WMF header".into())
        } else {
            MetafileError::NotAMetafile
        });
    }
    if data.len() < start + WMF_HEADER_SIZE {
        return Err(MetafileError::Truncated {
            offset: start,
            needed: WMF_HEADER_SIZE,
            available: data.len() - start,
        });
    }

    let builder = match placeable {
        Some(header) => {
            if !header.is_checksum_valid() {
                debug!("Placeable header checksum mismatch");
            }
            // units per inch as the reference resolution
            let upi = i32::from(header.units_per_inch.max(1));
            EmfBuilder::new(header.bbox).with_reference((upi * 100, upi * 100), (2540, 2540))
        }
        None => EmfBuilder::new(Rect::default()),
    };
    let mut promoter = Promoter {
        builder,
        slots: Slots::default(),
    };

    let header_words = LittleEndian::read_u16(&data[start + 2..start + 4]) as usize;
    let mut offset = start + header_words * 2;
    while offset < data.len() {
        if offset + WMF_RECORD_PREFIX > data.len() {
            return Err(MetafileError::Truncated {
                offset,
                needed: WMF_RECORD_PREFIX,
                available: data.len() - offset,
            });
        }
        let size_words = LittleEndian::read_u32(&data[offset..offset + 4]) as usize;
        let function = LittleEndian::read_u16(&data[offset + 4..offset + 6]);
        let size = size_words.saturating_mul(2);
        if size < WMF_RECORD_PREFIX {
            return Err(MetafileError::malformed(
                offset,
                get_function_name(function),
                format!("invalid record size {} words", size_words),
            ));
        }
        if size > data.len() - offset {
            return Err(MetafileError::Truncated {
                offset,
                needed: size,
                available: data.len() - offset,
            });
        }
        if function == META_EOF {
            break;
        }

        let params = Params(&data[offset + WMF_RECORD_PREFIX..offset + size]);
        promoter.record(function, &params).map_err(|e| {
            MetafileError::malformed(offset, get_function_name(function), e.to_string())
        })?;
        offset += size;
    }

    Ok(promoter.builder.finish())
}
