//! Table reassembly.
//!
//! Tables (PSI/SI sections) are carried in the payload of one or more transport stream
//! packets on the same PID. [TableScanner] drives a [PacketScanner](crate::PacketScanner),
//! hands each payload to the [TableBuffer] for its PID, and reports each table once
//! it has been reassembled and validated.
mod buffer;
mod scanner;

pub use buffer::*;
pub use scanner::*;

use crc::{Crc, CRC_32_MPEG_2};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::prelude::*;
use crate::section::{Header, SyntaxHeader};

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// A complete table section whose length has been validated against its
/// section_length field.
///
/// Only container-level structure is guaranteed; see [crate::section] for decoding
/// table contents.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Table {
    #[cfg_attr(feature = "serde", serde(with = "serde_bytes"))]
    data: Vec<u8>,
}

impl Table {
    /// Length of the table_id and section_length fields that precede the section
    /// data counted by section_length.
    pub const HEADER_LEN: usize = 3;
    /// Length of the header of a section with the section syntax indicator set.
    pub const LONG_HEADER_LEN: usize = 8;
    pub const CRC_LEN: usize = 4;
    /// Largest section_length the 12-bit field may legally carry.
    pub const MAX_SECTION_LENGTH: usize = 4093;
    /// Smallest section_length of a long-form section: 5 header bytes and the CRC.
    pub const MIN_LONG_SECTION_LENGTH: usize = 9;
    /// table_id value used for stuffing.
    pub const STUFFING: u8 = 0xff;

    /// Construct from accumulated section bytes.
    ///
    /// The table is the first `3 + section_length` bytes of `buf`; anything after that,
    /// such as the stuffing that pads the final packet, is dropped.
    ///
    /// # Errors
    /// [Error::NotEnoughData] if `buf` cannot hold a section header,
    /// [Error::InvalidSectionLength] if section_length is out of range, and
    /// [Error::TableTruncated] if `buf` holds fewer bytes than declared.
    pub fn from_section(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::HEADER_LEN {
            return Err(Error::NotEnoughData {
                actual: buf.len(),
                minimum: Self::HEADER_LEN,
            });
        }
        let long_form = buf[1] & 0x80 != 0;
        let section_length = (usize::from(buf[1] & 0x0f) << 8) | usize::from(buf[2]);
        if section_length > Self::MAX_SECTION_LENGTH
            || (long_form && section_length < Self::MIN_LONG_SECTION_LENGTH)
        {
            return Err(Error::InvalidSectionLength(section_length));
        }
        let declared = Self::HEADER_LEN + section_length;
        if buf.len() < declared {
            return Err(Error::TableTruncated {
                declared,
                actual: buf.len(),
            });
        }

        Ok(Table {
            data: buf[..declared].to_vec(),
        })
    }

    /// Check the CRC_32 trailer of a long-form section. Short-form sections carry no
    /// CRC and always pass.
    ///
    /// # Errors
    /// [Error::CrcMismatch] if the computed checksum does not match the trailer.
    pub fn verify_crc(&self) -> Result<()> {
        let Some(expected) = self.crc32() else {
            return Ok(());
        };
        let computed = CRC.checksum(&self.data[..self.data.len() - Self::CRC_LEN]);
        if computed != expected {
            return Err(Error::CrcMismatch { expected, computed });
        }
        Ok(())
    }

    /// All table bytes, from table_id through the end of the section.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn table_id(&self) -> u8 {
        self.data[0]
    }

    #[must_use]
    pub fn section_syntax_indicator(&self) -> bool {
        self.data[1] & 0x80 != 0
    }

    #[must_use]
    pub fn section_length(&self) -> usize {
        (usize::from(self.data[1] & 0x0f) << 8) | usize::from(self.data[2])
    }

    /// The section header. Long-form fields are only present when the section syntax
    /// indicator is set.
    #[must_use]
    pub fn header(&self) -> Header {
        // Length was checked against the header form when the table was constructed
        Header::decode(&self.data).unwrap_or(Header {
            table_id: self.table_id(),
            section_syntax_indicator: false,
            private_indicator: false,
            section_length: self.section_length(),
            syntax: None,
        })
    }

    fn syntax(&self) -> Option<SyntaxHeader> {
        self.header().syntax
    }

    #[must_use]
    pub fn table_id_extension(&self) -> Option<u16> {
        self.syntax().map(|s| s.table_id_extension)
    }

    #[must_use]
    pub fn version_number(&self) -> Option<u8> {
        self.syntax().map(|s| s.version_number)
    }

    #[must_use]
    pub fn current_next_indicator(&self) -> Option<bool> {
        self.syntax().map(|s| s.current_next_indicator)
    }

    #[must_use]
    pub fn section_number(&self) -> Option<u8> {
        self.syntax().map(|s| s.section_number)
    }

    #[must_use]
    pub fn last_section_number(&self) -> Option<u8> {
        self.syntax().map(|s| s.last_section_number)
    }

    /// Section data following the header and preceding the CRC of a long-form section,
    /// or following the 3 byte header for a short-form section.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        if self.section_syntax_indicator() {
            &self.data[Self::LONG_HEADER_LEN..self.data.len() - Self::CRC_LEN]
        } else {
            &self.data[Self::HEADER_LEN..]
        }
    }

    /// CRC_32 trailer of a long-form section.
    #[must_use]
    pub fn crc32(&self) -> Option<u32> {
        if !self.section_syntax_indicator() {
            return None;
        }
        let n = self.data.len();
        Some(u32::from_be_bytes([
            self.data[n - 4],
            self.data[n - 3],
            self.data[n - 2],
            self.data[n - 1],
        ]))
    }
}

impl AsRef<[u8]> for Table {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}
