//! Loaded metafile and its record enumerator
//!
//! The whole byte stream is walked and every record decoded when the
//! metafile is created, so playback never starts on a stream that would
//! fail halfway through.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use crate::emf_records::{get_record_type_name, EMR_EOF};
use crate::error::{MetafileError, MetafileResult};
use crate::header::EmfHeader;
use crate::record::{MetafileRecord, Rect, RECORD_HEADER_SIZE};

/// Where the EMF stream came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Emf,
    /// Promoted from a Windows metafile
    Wmf,
}

pub struct Metafile<'a> {
    data: &'a [u8],
    header: EmfHeader,
    format: SourceFormat,
    records: Vec<MetafileRecord<'a>>,
}

impl<'a> Metafile<'a> {
    pub fn from_emf(data: &'a [u8]) -> MetafileResult<Self> {
        Self::parse(data, SourceFormat::Emf)
    }

    /// Parse and validate an EMF stream
    pub fn parse(data: &'a [u8], format: SourceFormat) -> MetafileResult<Self> {
        let header = EmfHeader::parse(data)?;
        let records = decode_records(data, header.size as usize)?;
        debug!(
            "Loaded {:?} metafile: {} records, bounds {:?}, frame {:?}",
            format,
            records.len(),
            header.bounds,
            header.frame
        );
        Ok(Self {
            data,
            header,
            format,
            records,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    pub fn header(&self) -> &EmfHeader {
        &self.header
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Records after the header, up to and including EMR_EOF
    pub fn records(&self) -> &[MetafileRecord<'a>] {
        &self.records
    }

    /// Picture box used when no pre-pass runs
    ///
    /// EMF pictures use the frame converted to device units. Promoted WMF
    /// pictures only have meaningful header bounds.
    pub fn header_box(&self) -> Rect {
        match self.format {
            SourceFormat::Emf => self.header.frame_box(),
            SourceFormat::Wmf => self.header.bounds,
        }
    }
}

fn decode_records(data: &[u8], header_size: usize) -> MetafileResult<Vec<MetafileRecord<'_>>> {
    let mut records = Vec::new();
    let mut cursor = Cursor::new(data);
    let mut offset = header_size;

    while offset < data.len() {
        if offset + RECORD_HEADER_SIZE > data.len() {
            return Err(MetafileError::Truncated {
                offset,
                needed: RECORD_HEADER_SIZE,
                available: data.len() - offset,
            });
        }

        cursor.set_position(offset as u64);
        let record_type = cursor.read_u32::<LittleEndian>()?;
        let record_size = cursor.read_u32::<LittleEndian>()? as usize;

        if record_size < RECORD_HEADER_SIZE || record_size % 4 != 0 {
            return Err(MetafileError::malformed(
                offset,
                get_record_type_name(record_type),
                format!("invalid record size {}", record_size),
            ));
        }
        if record_size > data.len() - offset {
            return Err(MetafileError::Truncated {
                offset,
                needed: record_size,
                available: data.len() - offset,
            });
        }

        let bytes = &data[offset..offset + record_size];
        records.push(MetafileRecord::decode(record_type, bytes, offset)?);
        offset += record_size;

        if record_type == EMR_EOF {
            break;
        }
    }

    Ok(records)
}
