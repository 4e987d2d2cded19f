use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::long_section;
use crate::packet::Pid;
use crate::prelude::*;
use crate::table::Table;

/// Decoded program association section.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgramAssociation {
    pub transport_stream_id: u16,
    pub version_number: u8,
    /// PID of the network information table, if program number 0 is present.
    pub network_pid: Option<Pid>,
    /// Program number to program map PID.
    pub programs: BTreeMap<u16, Pid>,
}

impl ProgramAssociation {
    pub const TABLE_ID: u8 = 0x00;

    /// Decode from complete section bytes, starting at the table_id.
    ///
    /// # Errors
    /// [Error::UnexpectedTableId] if this is not a PAT section and [Error::NotEnoughData]
    /// if the section is shorter than its header claims.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let (syntax, body) = long_section(buf, Self::TABLE_ID)?;

        let mut network_pid = None;
        let mut programs = BTreeMap::new();
        // a trailing partial entry is ignored
        for entry in body.chunks_exact(4) {
            let program_number = u16::from_be_bytes([entry[0], entry[1]]);
            let pid = u16::from_be_bytes([entry[2], entry[3]]) & 0x1fff;
            if program_number == 0 {
                network_pid = Some(pid);
            } else {
                programs.insert(program_number, pid);
            }
        }

        Ok(ProgramAssociation {
            transport_stream_id: syntax.table_id_extension,
            version_number: syntax.version_number,
            network_pid,
            programs,
        })
    }
}

impl TryFrom<&Table> for ProgramAssociation {
    type Error = Error;

    fn try_from(table: &Table) -> Result<Self> {
        Self::decode(table.as_bytes())
    }
}
