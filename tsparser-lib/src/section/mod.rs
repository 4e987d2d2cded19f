//! Decoding of table section contents.
//!
//! References:
//! * ISO/IEC 13818-1, section 2.4.4 (program specific information)
//! * ISO/IEC 13818-1, section 2.6 (program and program element descriptors)
mod pat;
mod pmt;

pub use pat::*;
pub use pmt::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::table::Table;

/// Fields of the long-form section header, present when the section syntax
/// indicator is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxHeader {
    pub table_id_extension: u16,
    pub version_number: u8,
    pub current_next_indicator: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

impl SyntaxHeader {
    fn from_bytes(dat: [u8; 5]) -> Self {
        SyntaxHeader {
            table_id_extension: u16::from_be_bytes([dat[0], dat[1]]),
            version_number: (dat[2] >> 1) & 0x1f,
            current_next_indicator: dat[2] & 0x1 != 0,
            section_number: dat[3],
            last_section_number: dat[4],
        }
    }
}

/// Common header of every table section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub table_id: u8,
    pub section_syntax_indicator: bool,
    pub private_indicator: bool,
    /// Number of bytes in the section following the section_length field.
    pub section_length: usize,
    pub syntax: Option<SyntaxHeader>,
}

impl Header {
    /// Decode from the start of a section. Returns `None` if `buf` is too short for
    /// the header form signalled by the section syntax indicator.
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < Table::HEADER_LEN {
            return None;
        }
        let section_syntax_indicator = buf[1] & 0x80 != 0;
        let syntax = if section_syntax_indicator {
            let dat: [u8; 5] = buf.get(3..Table::LONG_HEADER_LEN)?.try_into().ok()?;
            Some(SyntaxHeader::from_bytes(dat))
        } else {
            None
        };
        Some(Header {
            table_id: buf[0],
            section_syntax_indicator,
            private_indicator: buf[1] & 0x40 != 0,
            section_length: (usize::from(buf[1] & 0x0f) << 8) | usize::from(buf[2]),
            syntax,
        })
    }
}

/// A descriptor as a tag and its undecoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Descriptor {
    pub tag: u8,
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    pub data: Vec<u8>,
}

/// Decode a descriptor loop that fills all of `buf`.
///
/// # Errors
/// [Error::NotEnoughData] if the last descriptor is cut short.
pub fn decode_descriptors(buf: &[u8]) -> Result<Vec<Descriptor>> {
    let mut descriptors = Vec::new();
    let mut idx = 0;
    while idx < buf.len() {
        if idx + 2 > buf.len() {
            return Err(Error::NotEnoughData {
                actual: buf.len() - idx,
                minimum: 2,
            });
        }
        let tag = buf[idx];
        let len = buf[idx + 1] as usize;
        let start = idx + 2;
        if start + len > buf.len() {
            return Err(Error::NotEnoughData {
                actual: buf.len() - start,
                minimum: len,
            });
        }
        descriptors.push(Descriptor {
            tag,
            data: buf[start..start + len].to_vec(),
        });
        idx = start + len;
    }
    Ok(descriptors)
}

/// Validate the long-form header of a section with the expected table id and
/// return the extended header fields with the section body, i.e., the bytes between the header and
/// the CRC as bounded by section_length.
fn long_section(buf: &[u8], table_id: u8) -> Result<(SyntaxHeader, &[u8])> {
    let header = Header::decode(buf).ok_or(Error::NotEnoughData {
        actual: buf.len(),
        minimum: Table::LONG_HEADER_LEN,
    })?;
    if header.table_id != table_id {
        return Err(Error::UnexpectedTableId {
            expected: table_id,
            got: header.table_id,
        });
    }
    let Some(syntax) = header.syntax else {
        return Err(Error::NotEnoughData {
            actual: header.section_length,
            minimum: Table::MIN_LONG_SECTION_LENGTH,
        });
    };
    if header.section_length < Table::MIN_LONG_SECTION_LENGTH {
        return Err(Error::InvalidSectionLength(header.section_length));
    }
    let end = Table::HEADER_LEN + header.section_length - Table::CRC_LEN;
    if buf.len() < end {
        return Err(Error::NotEnoughData {
            actual: buf.len(),
            minimum: end,
        });
    }
    Ok((syntax, &buf[Table::LONG_HEADER_LEN..end]))
}
