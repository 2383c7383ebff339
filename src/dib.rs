//! Device-independent bitmap decoding
//!
//! Blit records and pattern brushes embed a BITMAPINFO (header plus optional
//! colour table) and the packed pixel rows at offsets inside the record.
//! [`Dib::reference`] validates both parts without copying; the decode
//! functions then expand the rows into either three RGB planes or an index
//! plane plus a 256-entry colour table.
//!
//! Decoded planes are always bottom-up: row 0 is the bottom scan line, which
//! is the orientation the canvas expects for image paints.

use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};

use crate::canvas::Color;

const BI_RGB: u32 = 0;
const BI_BITFIELDS: u32 = 3;

const BITMAPINFOHEADER_SIZE: usize = 40;

/// How a supported DIB is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// 16, 24 and 32 bits per pixel
    TrueColor,
    /// 1, 4 and 8 bits per pixel through the colour table
    Indexed,
}

/// Three-plane RGB image, `width * height` bytes per plane, bottom-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub red: Vec<u8>,
    pub green: Vec<u8>,
    pub blue: Vec<u8>,
}

impl RgbImage {
    pub fn pixel(&self, x: usize, y: usize) -> Color {
        let i = y * self.width + x;
        Color::rgb(self.red[i], self.green[i], self.blue[i])
    }
}

/// Palette-indexed image, bottom-up, always with 256 colours
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub width: usize,
    pub height: usize,
    pub index: Vec<u8>,
    pub colors: Vec<Color>,
}

impl IndexedImage {
    pub fn pixel(&self, x: usize, y: usize) -> Color {
        self.colors[self.index[y * self.width + x] as usize]
    }
}

/// Either decode result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedImage {
    Rgb(RgbImage),
    Indexed(IndexedImage),
}

/// Validated reference to a DIB living inside a record
#[derive(Debug, Clone, Copy)]
pub struct Dib<'a> {
    width: i32,
    height: i32,
    bit_count: u16,
    masks: Option<[u32; 3]>,
    color_table: &'a [u8],
    bits: &'a [u8],
}

impl<'a> Dib<'a> {
    /// Reference a DIB from its BITMAPINFO and pixel bytes
    ///
    /// Returns `None` for anything the decoder does not handle: missing or
    /// short header, zero extent, unknown depth, compressed rows, or pixel
    /// data shorter than the header declares.
    pub fn reference(info: &'a [u8], bits: &'a [u8]) -> Option<Dib<'a>> {
        if info.len() < BITMAPINFOHEADER_SIZE {
            return None;
        }

        let mut cursor = Cursor::new(info);
        let header_size = cursor.read_u32::<LittleEndian>().ok()? as usize;
        let width = cursor.read_i32::<LittleEndian>().ok()?;
        let height = cursor.read_i32::<LittleEndian>().ok()?;
        let _planes = cursor.read_u16::<LittleEndian>().ok()?;
        let bit_count = cursor.read_u16::<LittleEndian>().ok()?;
        let compression = cursor.read_u32::<LittleEndian>().ok()?;
        let _size_image = cursor.read_u32::<LittleEndian>().ok()?;
        let _x_pels = cursor.read_i32::<LittleEndian>().ok()?;
        let _y_pels = cursor.read_i32::<LittleEndian>().ok()?;
        let clr_used = cursor.read_u32::<LittleEndian>().ok()?;

        if header_size < BITMAPINFOHEADER_SIZE || header_size > info.len() {
            return None;
        }
        if width <= 0 || height == 0 || height == i32::MIN {
            return None;
        }

        let mut table_start = header_size;
        let masks = match (compression, bit_count) {
            (BI_RGB, 1 | 4 | 8 | 16 | 24 | 32) => None,
            (BI_BITFIELDS, 16 | 32) => {
                // V4/V5 headers carry the masks inline, plain headers append them
                let at = if header_size >= 52 {
                    BITMAPINFOHEADER_SIZE
                } else {
                    table_start += 12;
                    header_size
                };
                let raw = info.get(at..at + 12)?;
                Some([
                    LittleEndian::read_u32(&raw[0..4]),
                    LittleEndian::read_u32(&raw[4..8]),
                    LittleEndian::read_u32(&raw[8..12]),
                ])
            }
            _ => return None,
        };

        let color_table = if bit_count <= 8 {
            let declared = if clr_used == 0 || clr_used > (1 << bit_count) {
                1usize << bit_count
            } else {
                clr_used as usize
            };
            // Writers sometimes trim the table; use what is actually present
            let available = info.len().saturating_sub(table_start) / 4;
            let entries = declared.min(available);
            if entries == 0 {
                return None;
            }
            &info[table_start..table_start + entries * 4]
        } else {
            &info[0..0]
        };

        let stride = row_stride(width as usize, bit_count)?;
        let needed = stride.checked_mul(height.unsigned_abs() as usize)?;
        if bits.len() < needed {
            return None;
        }

        Some(Dib {
            width,
            height,
            bit_count,
            masks,
            color_table,
            bits: &bits[..needed],
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    /// Signed height, negative for top-down source rows
    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn bit_count(&self) -> u16 {
        self.bit_count
    }

    pub fn mode(&self) -> DecodeMode {
        if self.bit_count <= 8 {
            DecodeMode::Indexed
        } else {
            DecodeMode::TrueColor
        }
    }

    pub fn decode(&self) -> DecodedImage {
        match self.mode() {
            DecodeMode::TrueColor => DecodedImage::Rgb(self.decode_rgb()),
            DecodeMode::Indexed => DecodedImage::Indexed(self.decode_map()),
        }
    }

    /// Expand to RGB planes; indexed bitmaps go through their colour table
    pub fn decode_rgb(&self) -> RgbImage {
        let (w, h) = self.extent();
        let size = w * h;
        let mut image = RgbImage {
            width: w,
            height: h,
            red: vec![0; size],
            green: vec![0; size],
            blue: vec![0; size],
        };

        let colors = self.colors();
        for y in 0..h {
            let row = self.source_row(y);
            for x in 0..w {
                let color = match self.bit_count {
                    1 | 4 | 8 => colors[self.index_at(row, x) as usize],
                    16 => self.unpack(LittleEndian::read_u16(&row[x * 2..]) as u32, true),
                    24 => Color::rgb(row[x * 3 + 2], row[x * 3 + 1], row[x * 3]),
                    _ => self.unpack(LittleEndian::read_u32(&row[x * 4..]), false),
                };
                let i = y * w + x;
                image.red[i] = color.r;
                image.green[i] = color.g;
                image.blue[i] = color.b;
            }
        }
        image
    }

    /// Expand to an index plane; only meaningful for indexed bitmaps
    pub fn decode_map(&self) -> IndexedImage {
        let (w, h) = self.extent();
        let mut index = vec![0u8; w * h];
        if self.bit_count <= 8 {
            for y in 0..h {
                let row = self.source_row(y);
                for x in 0..w {
                    index[y * w + x] = self.index_at(row, x);
                }
            }
        }
        IndexedImage {
            width: w,
            height: h,
            index,
            colors: self.colors(),
        }
    }

    fn extent(&self) -> (usize, usize) {
        (self.width as usize, self.height.unsigned_abs() as usize)
    }

    /// Source bytes of output row `y` (bottom-up numbering)
    fn source_row(&self, y: usize) -> &'a [u8] {
        let (w, h) = self.extent();
        let stride = (w * self.bit_count as usize).div_ceil(32) * 4;
        let stored = if self.height > 0 { y } else { h - 1 - y };
        &self.bits[stored * stride..(stored + 1) * stride]
    }

    fn index_at(&self, row: &[u8], x: usize) -> u8 {
        match self.bit_count {
            1 => (row[x / 8] >> (7 - (x % 8))) & 0x01,
            4 => {
                let byte = row[x / 2];
                if x % 2 == 0 {
                    byte >> 4
                } else {
                    byte & 0x0F
                }
            }
            _ => row[x],
        }
    }

    /// Colour table padded to 256 entries
    fn colors(&self) -> Vec<Color> {
        let mut colors = vec![Color::BLACK; 256];
        for (slot, quad) in colors.iter_mut().zip(self.color_table.chunks_exact(4)) {
            *slot = Color::rgb(quad[2], quad[1], quad[0]);
        }
        colors
    }

    fn unpack(&self, pixel: u32, sixteen: bool) -> Color {
        let [r, g, b] = match self.masks {
            Some(masks) => masks,
            None if sixteen => [0x7C00, 0x03E0, 0x001F],
            None => [0x00FF_0000, 0x0000_FF00, 0x0000_00FF],
        };
        Color::rgb(channel(pixel, r), channel(pixel, g), channel(pixel, b))
    }
}

/// Bytes per scan line, rows are padded to 32 bits
fn row_stride(width: usize, bit_count: u16) -> Option<usize> {
    let bits = width.checked_mul(bit_count as usize)?;
    Some(bits.div_ceil(32) * 4)
}

/// Scale a masked channel to 8 bits
fn channel(pixel: u32, mask: u32) -> u8 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let max = mask >> shift;
    let value = (pixel & mask) >> shift;
    if max == 0xFF {
        value as u8
    } else {
        ((value as u64 * 255 + max as u64 / 2) / max as u64) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn info_header(width: i32, height: i32, bit_count: u16, compression: u32, clr_used: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(40).unwrap();
        buf.write_i32::<LittleEndian>(width).unwrap();
        buf.write_i32::<LittleEndian>(height).unwrap();
        buf.write_u16::<LittleEndian>(1).unwrap();
        buf.write_u16::<LittleEndian>(bit_count).unwrap();
        buf.write_u32::<LittleEndian>(compression).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        buf.write_i32::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(clr_used).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap();
        buf
    }

    #[test]
    fn test_24bpp_bottom_up_with_padding() {
        let info = info_header(2, 2, 24, BI_RGB, 0);
        // stride = 8: two BGR pixels + 2 padding bytes
        let bits = [
            0, 0, 255, 0, 255, 0, 0, 0, // bottom row: red, green
            255, 0, 0, 255, 255, 255, 0, 0, // top row: blue, white
        ];
        let dib = Dib::reference(&info, &bits).unwrap();
        assert_eq!(dib.mode(), DecodeMode::TrueColor);

        let image = dib.decode_rgb();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.pixel(0, 0), Color::rgb(255, 0, 0));
        assert_eq!(image.pixel(1, 0), Color::rgb(0, 255, 0));
        assert_eq!(image.pixel(0, 1), Color::rgb(0, 0, 255));
        assert_eq!(image.pixel(1, 1), Color::WHITE);
    }

    #[test]
    fn test_top_down_rows_are_flipped() {
        let info = info_header(1, -2, 24, BI_RGB, 0);
        let bits = [
            0, 0, 255, 0, // first stored row is the top: red
            255, 0, 0, 0, // blue
        ];
        let image = Dib::reference(&info, &bits).unwrap().decode_rgb();
        assert_eq!(image.height, 2);
        assert_eq!(image.pixel(0, 0), Color::rgb(0, 0, 255));
        assert_eq!(image.pixel(0, 1), Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_1bpp_indexed() {
        let mut info = info_header(10, 1, 1, BI_RGB, 0);
        info.extend_from_slice(&[0, 0, 0, 0]); // black
        info.extend_from_slice(&[255, 255, 255, 0]); // white
        let bits = [0b1010_0000, 0b0100_0000, 0, 0];

        let dib = Dib::reference(&info, &bits).unwrap();
        assert_eq!(dib.mode(), DecodeMode::Indexed);
        let image = dib.decode_map();
        assert_eq!(image.colors.len(), 256);
        assert_eq!(&image.index[..10], &[1, 0, 1, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(image.pixel(0, 0), Color::WHITE);
    }

    #[test]
    fn test_4bpp_nibbles() {
        let mut info = info_header(3, 1, 4, BI_RGB, 2);
        info.extend_from_slice(&[0, 0, 255, 0]);
        info.extend_from_slice(&[0, 255, 0, 0]);
        let bits = [0x01, 0x10, 0, 0];
        let image = Dib::reference(&info, &bits).unwrap().decode_map();
        assert_eq!(&image.index, &[0, 1, 1]);
        assert_eq!(image.pixel(1, 0), Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_8bpp_through_rgb_decode() {
        let mut info = info_header(2, 1, 8, BI_RGB, 2);
        info.extend_from_slice(&[10, 20, 30, 0]);
        info.extend_from_slice(&[40, 50, 60, 0]);
        let bits = [1, 0, 0, 0];
        let image = Dib::reference(&info, &bits).unwrap().decode_rgb();
        assert_eq!(image.pixel(0, 0), Color::rgb(60, 50, 40));
        assert_eq!(image.pixel(1, 0), Color::rgb(30, 20, 10));
    }

    #[test]
    fn test_16bpp_default_555() {
        let info = info_header(1, 1, 16, BI_RGB, 0);
        let bits = [0x00, 0x7C, 0, 0]; // pure red in 5-5-5
        let image = Dib::reference(&info, &bits).unwrap().decode_rgb();
        assert_eq!(image.pixel(0, 0), Color::rgb(255, 0, 0));
    }

    #[test]
    fn test_16bpp_bitfields_565() {
        let mut info = info_header(1, 1, 16, BI_BITFIELDS, 0);
        for mask in [0xF800u32, 0x07E0, 0x001F] {
            info.write_u32::<LittleEndian>(mask).unwrap();
        }
        let bits = [0xE0, 0x07, 0, 0]; // pure green in 5-6-5
        let image = Dib::reference(&info, &bits).unwrap().decode_rgb();
        assert_eq!(image.pixel(0, 0), Color::rgb(0, 255, 0));
    }

    #[test]
    fn test_32bpp() {
        let info = info_header(1, 1, 32, BI_RGB, 0);
        let bits = [1, 2, 3, 0xFF];
        let image = Dib::reference(&info, &bits).unwrap().decode_rgb();
        assert_eq!(image.pixel(0, 0), Color::rgb(3, 2, 1));
    }

    #[test]
    fn test_unsupported_bitmaps() {
        let bits = [0u8; 64];
        // missing header
        assert!(Dib::reference(&[], &bits).is_none());
        // zero width and zero height
        assert!(Dib::reference(&info_header(0, 4, 24, BI_RGB, 0), &bits).is_none());
        assert!(Dib::reference(&info_header(4, 0, 24, BI_RGB, 0), &bits).is_none());
        // unknown depth
        assert!(Dib::reference(&info_header(1, 1, 12, BI_RGB, 0), &bits).is_none());
        // RLE8
        assert!(Dib::reference(&info_header(1, 1, 8, 1, 0), &bits).is_none());
        // pixel data shorter than declared
        assert!(Dib::reference(&info_header(4, 4, 24, BI_RGB, 0), &bits[..10]).is_none());
    }
}
