//! Placeable (Aldus) WMF header
//!
//! A 22-byte preamble in front of a Windows metafile that gives the picture
//! a bounding box and a unit size. The last word is the XOR of the ten
//! words before it.

use std::io::{Cursor, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{MetafileError, MetafileResult};
use crate::record::Rect;

pub const PLACEABLE_KEY: u32 = 0x9AC6_CDD7;
pub const PLACEABLE_HEADER_SIZE: usize = 22;

/// Logical units per inch written by [`PlaceableHeader::new`]
pub const DEFAULT_UNITS_PER_INCH: u16 = 100;

pub const MM_ISOTROPIC: i32 = 7;
pub const MM_ANISOTROPIC: i32 = 8;

/// Device units per placeable unit for the scalable mapping modes
const SCALABLE_MODE_DIVISOR: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceableHeader {
    pub handle: u16,
    pub bbox: Rect,
    pub units_per_inch: u16,
    /// Should be zero, but is covered by the checksum either way
    pub reserved: u32,
    pub checksum: u16,
}

impl PlaceableHeader {
    /// Header for a `width` x `height` picture at the origin
    pub fn new(width: i32, height: i32) -> Self {
        let mut header = Self {
            handle: 0,
            bbox: Rect::new(0, 0, width, height),
            units_per_inch: DEFAULT_UNITS_PER_INCH,
            reserved: 0,
            checksum: 0,
        };
        header.checksum = header.compute_checksum();
        header
    }

    /// Header for a picture recorded in mapping mode `mode` with the given extents
    pub fn for_mapping(mode: i32, x_ext: i32, y_ext: i32) -> Self {
        if mode == MM_ISOTROPIC || mode == MM_ANISOTROPIC {
            Self::new(x_ext / SCALABLE_MODE_DIVISOR, y_ext / SCALABLE_MODE_DIVISOR)
        } else {
            Self::new(x_ext, y_ext)
        }
    }

    /// Parse the header at the start of `data`; `Ok(None)` when the key is absent
    pub fn parse(data: &[u8]) -> MetafileResult<Option<Self>> {
        if data.len() < 4 {
            return Ok(None);
        }
        let mut cursor = Cursor::new(data);
        if cursor.read_u32::<LittleEndian>()? != PLACEABLE_KEY {
            return Ok(None);
        }
        if data.len() < PLACEABLE_HEADER_SIZE {
            return Err(MetafileError::Truncated {
                offset: 0,
                needed: PLACEABLE_HEADER_SIZE,
                available: data.len(),
            });
        }

        let handle = cursor.read_u16::<LittleEndian>()?;
        let left = cursor.read_i16::<LittleEndian>()? as i32;
        let top = cursor.read_i16::<LittleEndian>()? as i32;
        let right = cursor.read_i16::<LittleEndian>()? as i32;
        let bottom = cursor.read_i16::<LittleEndian>()? as i32;
        let units_per_inch = cursor.read_u16::<LittleEndian>()?;
        let reserved = cursor.read_u32::<LittleEndian>()?;
        let checksum = cursor.read_u16::<LittleEndian>()?;

        Ok(Some(Self {
            handle,
            bbox: Rect::new(left, top, right, bottom),
            units_per_inch,
            reserved,
            checksum,
        }))
    }

    /// The ten words covered by the checksum
    fn words(&self) -> [u16; 10] {
        [
            (PLACEABLE_KEY & 0xFFFF) as u16,
            (PLACEABLE_KEY >> 16) as u16,
            self.handle,
            self.bbox.left as i16 as u16,
            self.bbox.top as i16 as u16,
            self.bbox.right as i16 as u16,
            self.bbox.bottom as i16 as u16,
            self.units_per_inch,
            (self.reserved & 0xFFFF) as u16,
            (self.reserved >> 16) as u16,
        ]
    }

    pub fn compute_checksum(&self) -> u16 {
        self.words().iter().fold(0, |sum, w| sum ^ w)
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    /// Emit the 22 header bytes with a freshly computed checksum
    pub fn write_to<W: Write>(&self, out: &mut W) -> MetafileResult<()> {
        for word in self.words() {
            out.write_u16::<LittleEndian>(word)?;
        }
        out.write_u16::<LittleEndian>(self.compute_checksum())?;
        Ok(())
    }

    /// Prefix a WMF body with this header
    pub fn wrap_wmf(&self, wmf: &[u8]) -> MetafileResult<Vec<u8>> {
        let mut out = Vec::with_capacity(PLACEABLE_HEADER_SIZE + wmf.len());
        self.write_to(&mut out)?;
        out.extend_from_slice(wmf);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_xor_of_ten_words() {
        let header = PlaceableHeader::new(200, 100);
        assert_eq!(header.checksum, 0xCDD7 ^ 0x9AC6 ^ 200 ^ 100 ^ 100);
        assert!(header.is_checksum_valid());
    }

    #[test]
    fn test_write_then_parse() {
        let header = PlaceableHeader::new(640, 480);
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(bytes.len(), PLACEABLE_HEADER_SIZE);
        assert_eq!(&bytes[..4], &[0xD7, 0xCD, 0xC6, 0x9A]);

        let parsed = PlaceableHeader::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.units_per_inch, 100);
    }

    #[test]
    fn test_checksum_covers_reserved_field() {
        let mut header = PlaceableHeader::new(640, 480);
        header.reserved = 0x0001_0002;
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[16..20], &[2, 0, 1, 0]);

        let parsed = PlaceableHeader::parse(&bytes).unwrap().unwrap();
        assert_eq!(parsed.reserved, 0x0001_0002);
        assert!(parsed.is_checksum_valid());
        assert_eq!(parsed.checksum, PlaceableHeader::new(640, 480).checksum ^ 2 ^ 1);
    }

    #[test]
    fn test_scalable_modes_divide_extents() {
        let header = PlaceableHeader::for_mapping(MM_ANISOTROPIC, 3000, 1500);
        assert_eq!(header.bbox, Rect::new(0, 0, 100, 50));
        let header = PlaceableHeader::for_mapping(MM_ISOTROPIC, 61, 29);
        assert_eq!(header.bbox, Rect::new(0, 0, 2, 0));
        // MM_TEXT keeps the extents
        let header = PlaceableHeader::for_mapping(1, 3000, 1500);
        assert_eq!(header.bbox, Rect::new(0, 0, 3000, 1500));
    }

    #[test]
    fn test_parse_without_key() {
        assert_eq!(PlaceableHeader::parse(&[1, 0, 9, 0, 0, 3]).unwrap(), None);
        assert_eq!(PlaceableHeader::parse(&[]).unwrap(), None);
    }

    #[test]
    fn test_truncated_header() {
        let bytes = PLACEABLE_KEY.to_le_bytes();
        assert!(matches!(
            PlaceableHeader::parse(&bytes),
            Err(MetafileError::Truncated { needed: 22, .. })
        ));
    }

    #[test]
    fn test_wrap_wmf() {
        let wrapped = PlaceableHeader::new(10, 10).wrap_wmf(&[1, 2, 3]).unwrap();
        assert_eq!(wrapped.len(), 25);
        assert_eq!(&wrapped[22..], &[1, 2, 3]);
    }
}
