//! EMR_HEADER decoding
//!
//! Only the fixed ENHMETAHEADER part is read; description strings, pixel
//! format and OpenGL fields are not needed for playback.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::emf_records::EMR_HEADER;
use crate::error::{MetafileError, MetafileResult};
use crate::record::Rect;

/// " EMF" in little-endian
pub const ENHMETA_SIGNATURE: u32 = 0x464D_4520;

/// Bytes up to and including `szlMillimeters`
pub const ENHMETAHEADER_SIZE: usize = 88;

/// Check if data is EMF format
pub fn is_emf_format(data: &[u8]) -> bool {
    data.len() >= 44
        && data[0..4] == EMR_HEADER.to_le_bytes()
        && data[40..44] == ENHMETA_SIGNATURE.to_le_bytes()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmfHeader {
    /// Size of the header record
    pub size: u32,
    /// Inclusive bounds of the drawing, in device units
    pub bounds: Rect,
    /// Picture frame in 0.01 mm
    pub frame: Rect,
    pub version: u32,
    pub bytes: u32,
    pub records: u32,
    pub handles: u16,
    pub palette_entries: u32,
    /// Reference device size in pixels
    pub device: (i32, i32),
    /// Reference device size in millimetres
    pub millimeters: (i32, i32),
}

impl EmfHeader {
    pub fn parse(data: &[u8]) -> MetafileResult<Self> {
        if data.is_empty() {
            return Err(MetafileError::Empty);
        }
        if data.len() < ENHMETAHEADER_SIZE {
            return Err(MetafileError::Truncated {
                offset: 0,
                needed: ENHMETAHEADER_SIZE,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let record_type = cursor.read_u32::<LittleEndian>()?;
        let size = cursor.read_u32::<LittleEndian>()?;
        if record_type != EMR_HEADER {
            return Err(MetafileError::NotAMetafile);
        }

        let bounds = read_rect(&mut cursor)?;
        let frame = read_rect(&mut cursor)?;
        let signature = cursor.read_u32::<LittleEndian>()?;
        if signature != ENHMETA_SIGNATURE {
            return Err(MetafileError::NotAMetafile);
        }
        if (size as usize) < ENHMETAHEADER_SIZE || size % 4 != 0 {
            return Err(MetafileError::InvalidHeader(format!("header record size {}", size)));
        }
        if size as usize > data.len() {
            return Err(MetafileError::Truncated {
                offset: 0,
                needed: size as usize,
                available: data.len(),
            });
        }

        let version = cursor.read_u32::<LittleEndian>()?;
        let bytes = cursor.read_u32::<LittleEndian>()?;
        let records = cursor.read_u32::<LittleEndian>()?;
        let handles = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let _n_description = cursor.read_u32::<LittleEndian>()?;
        let _off_description = cursor.read_u32::<LittleEndian>()?;
        let palette_entries = cursor.read_u32::<LittleEndian>()?;
        let device = (cursor.read_i32::<LittleEndian>()?, cursor.read_i32::<LittleEndian>()?);
        let millimeters = (cursor.read_i32::<LittleEndian>()?, cursor.read_i32::<LittleEndian>()?);

        Ok(Self {
            size,
            bounds,
            frame,
            version,
            bytes,
            records,
            handles,
            palette_entries,
            device,
            millimeters,
        })
    }

    /// Reference device pixels per millimetre, 1.0 when unusable
    pub fn resolution(&self) -> (f64, f64) {
        fn per_mm(pixels: i32, mm: i32) -> f64 {
            let res = pixels as f64 / mm as f64;
            if res.is_finite() && res > 0.0 {
                res
            } else {
                1.0
            }
        }
        (
            per_mm(self.device.0, self.millimeters.0),
            per_mm(self.device.1, self.millimeters.1),
        )
    }

    /// The frame converted to reference device units (right/bottom exclusive)
    pub fn frame_box(&self) -> Rect {
        let (xres, yres) = self.resolution();
        let scale = |v: i32, res: f64| (v as f64 * res / 100.0) as i32;
        Rect::new(
            scale(self.frame.left, xres),
            scale(self.frame.top, yres),
            scale(self.frame.right, xres),
            scale(self.frame.bottom, yres),
        )
    }

    /// Physical size in millimetres of a `width` x `height` box
    pub fn physical_size(&self, width: i32, height: i32) -> (f64, f64) {
        let (xres, yres) = self.resolution();
        (width as f64 / xres, height as f64 / yres)
    }
}

fn read_rect(cursor: &mut Cursor<&[u8]>) -> std::io::Result<Rect> {
    let left = cursor.read_i32::<LittleEndian>()?;
    let top = cursor.read_i32::<LittleEndian>()?;
    let right = cursor.read_i32::<LittleEndian>()?;
    let bottom = cursor.read_i32::<LittleEndian>()?;
    Ok(Rect::new(left, top, right, bottom))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EmfBuilder;

    #[test]
    fn test_parse_builder_header() {
        let data = EmfBuilder::new(Rect::new(0, 0, 200, 100))
            .with_reference((2000, 1000), (200, 100))
            .finish();
        assert!(is_emf_format(&data));

        let header = EmfHeader::parse(&data).unwrap();
        assert_eq!(header.bounds, Rect::new(0, 0, 200, 100));
        assert_eq!(header.resolution(), (10.0, 10.0));
        assert_eq!(header.frame_box(), Rect::new(0, 0, 200, 100));
        assert_eq!(header.physical_size(200, 100), (20.0, 10.0));
        assert_eq!(header.bytes as usize, data.len());
    }

    #[test]
    fn test_bad_resolution_clamps_to_one() {
        let data = EmfBuilder::new(Rect::new(0, 0, 10, 10))
            .with_reference((0, -5), (0, 10))
            .finish();
        let header = EmfHeader::parse(&data).unwrap();
        assert_eq!(header.resolution(), (1.0, 1.0));
    }

    #[test]
    fn test_rejections() {
        assert!(matches!(EmfHeader::parse(&[]), Err(MetafileError::Empty)));
        assert!(matches!(
            EmfHeader::parse(&[1, 0, 0, 0, 88, 0]),
            Err(MetafileError::Truncated { .. })
        ));

        let mut data = EmfBuilder::new(Rect::new(0, 0, 10, 10)).finish();
        data[40] = b'X';
        assert!(matches!(EmfHeader::parse(&data), Err(MetafileError::NotAMetafile)));
        assert!(!is_emf_format(&data));
    }
}
