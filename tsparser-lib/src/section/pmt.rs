#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{decode_descriptors, long_section, Descriptor};
use crate::packet::Pid;
use crate::prelude::*;
use crate::table::Table;

/// An elementary stream of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StreamEntry {
    pub stream_type: u8,
    pub elementary_pid: Pid,
    pub descriptors: Vec<Descriptor>,
}

/// Decoded program map section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgramMap {
    pub program_number: u16,
    pub version_number: u8,
    pub pcr_pid: Pid,
    pub descriptors: Vec<Descriptor>,
    pub streams: Vec<StreamEntry>,
}

/// Read a 12-bit length field and the `len` bytes following it.
fn length_prefixed(buf: &[u8], idx: usize) -> Result<(&[u8], usize)> {
    if idx + 2 > buf.len() {
        return Err(Error::NotEnoughData {
            actual: buf.len(),
            minimum: idx + 2,
        });
    }
    let len = (usize::from(buf[idx] & 0x0f) << 8) | usize::from(buf[idx + 1]);
    let start = idx + 2;
    if start + len > buf.len() {
        return Err(Error::NotEnoughData {
            actual: buf.len(),
            minimum: start + len,
        });
    }
    Ok((&buf[start..start + len], start + len))
}

impl ProgramMap {
    pub const TABLE_ID: u8 = 0x02;

    /// Decode from complete section bytes, starting at the table_id.
    ///
    /// # Errors
    /// [Error::UnexpectedTableId] if this is not a PMT section and [Error::NotEnoughData]
    /// if the section or any of its length-prefixed fields is cut short.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (syntax, body) = long_section(buf, Self::TABLE_ID)?;
        if body.len() < 2 {
            return Err(Error::NotEnoughData {
                actual: body.len(),
                minimum: 4,
            });
        }
        let pcr_pid = u16::from_be_bytes([body[0], body[1]]) & 0x1fff;
        let (info, mut idx) = length_prefixed(body, 2)?;
        let descriptors = decode_descriptors(info)?;

        let mut streams = Vec::new();
        while idx < body.len() {
            if idx + 3 > body.len() {
                return Err(Error::NotEnoughData {
                    actual: body.len() - idx,
                    minimum: 5,
                });
            }
            let stream_type = body[idx];
            let elementary_pid = u16::from_be_bytes([body[idx + 1], body[idx + 2]]) & 0x1fff;
            let (info, next) = length_prefixed(body, idx + 3)?;
            streams.push(StreamEntry {
                stream_type,
                elementary_pid,
                descriptors: decode_descriptors(info)?,
            });
            idx = next;
        }

        Ok(ProgramMap {
            program_number: syntax.table_id_extension,
            version_number: syntax.version_number,
            pcr_pid,
            descriptors,
            streams,
        })
    }
}

impl TryFrom<&Table> for ProgramMap {
    type Error = Error;

    fn try_from(table: &Table) -> Result<Self> {
        Self::decode(table.as_bytes())
    }
}
