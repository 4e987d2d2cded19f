use std::fmt::Display;

use tracing::warn;

use super::Table;
use crate::packet::Pid;
use crate::prelude::*;

/// Largest pointer_field value that can still leave room for a section in a
/// packet payload.
pub const MAX_POINTER: usize = 182;

/// Start code prefix that opens every PES packet.
const PES_START_CODE_PREFIX: [u8; 3] = [0x00, 0x00, 0x01];

/// How the payload of a PID is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Table sections, with a pointer_field leading each unit start payload.
    Table,
    /// PES packets. Only continuity is tracked for these.
    Stream,
}

impl Framing {
    fn detect(payload: &[u8]) -> Self {
        if payload.starts_with(&PES_START_CODE_PREFIX) {
            Framing::Stream
        } else {
            Framing::Table
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuity {
    Ok,
    Duplicate,
    Dropped { expected: u8 },
}

/// Reassembly state for a single PID.
///
/// Payloads are fed in stream order with [TableBuffer::begin] for packets with the
/// payload_unit_start_indicator set and [TableBuffer::extend] for the rest. Data
/// accumulated since the previous `begin` is frozen into a [Table] when the next
/// `begin` arrives.
#[derive(Debug)]
pub struct TableBuffer {
    pid: Pid,
    // Table in progress
    data: Vec<u8>,
    // True once a unit start has been seen and data may be appended
    started: bool,
    last_counter: Option<u8>,
    // Most recently frozen table
    table: Option<Table>,
    framing: Option<Framing>,
    verify_crc: bool,
}

impl TableBuffer {
    #[must_use]
    pub fn new(pid: Pid) -> Self {
        TableBuffer {
            pid,
            data: Vec::new(),
            started: false,
            last_counter: None,
            table: None,
            framing: None,
            verify_crc: false,
        }
    }

    /// Also verify the CRC_32 of long-form sections when freezing.
    #[must_use]
    pub fn with_crc(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Framing detected from the first unit start payload, if one was seen.
    #[must_use]
    pub fn framing(&self) -> Option<Framing> {
        self.framing
    }

    /// The most recently frozen table.
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Number of bytes accumulated for the table in progress.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.data.len()
    }

    /// Forget the last continuity counter, e.g., when a packet signals a
    /// discontinuity. The next packet is accepted with any counter value.
    pub fn reset_continuity(&mut self) {
        self.last_counter = None;
    }

    fn continuity(&mut self, counter: u8) -> Continuity {
        let counter = counter & 0xf;
        let Some(prev) = self.last_counter else {
            self.last_counter = Some(counter);
            return Continuity::Ok;
        };
        if counter == prev {
            return Continuity::Duplicate;
        }
        self.last_counter = Some(counter);
        let expected = (prev + 1) % 16;
        if counter == expected {
            Continuity::Ok
        } else {
            Continuity::Dropped { expected }
        }
    }

    fn restart(&mut self) {
        self.data.clear();
        self.started = false;
    }

    /// Freeze the accumulated data, returning true if it produced a new table.
    fn freeze(&mut self) -> Result<bool> {
        if self.data.is_empty() {
            return Ok(false);
        }
        if self.data[0] == Table::STUFFING {
            return Ok(false);
        }
        let table = Table::from_section(&self.data)?;
        if self.verify_crc {
            table.verify_crc()?;
        }
        self.table = Some(table);
        Ok(true)
    }

    /// Start a new payload unit.
    ///
    /// Any data accumulated since the previous unit start, completed by the bytes
    /// before the section start named by the pointer_field, is frozen and validated.
    /// Accumulation then restarts at the section start in `payload`. Returns true if a
    /// new table was frozen.
    ///
    /// A repeated continuity counter is a retransmission and is ignored. Payloads
    /// starting with a PES start code prefix mark the PID as stream carrying; such
    /// PIDs are only tracked for continuity.
    ///
    /// # Errors
    /// - [Error::PacketDropped] if the continuity counter skipped. Everything else is
    ///   still done, but a table frozen by this call is not announced.
    /// - [Error::InvalidPointer] if the pointer_field cannot be valid. The table in
    ///   progress is discarded and nothing is accumulated until the next unit start.
    /// - Any [Table::from_section] or [Table::verify_crc] error for the frozen data.
    ///   Accumulation of the new unit proceeds regardless.
    pub fn begin(&mut self, counter: u8, payload: &[u8]) -> Result<bool> {
        let continuity = self.continuity(counter);
        if continuity == Continuity::Duplicate {
            return Ok(false);
        }
        let dropped = match continuity {
            Continuity::Dropped { expected } => Some(Error::PacketDropped {
                expected,
                got: counter & 0xf,
            }),
            _ => None,
        };

        let framing = *self
            .framing
            .get_or_insert_with(|| Framing::detect(payload));
        let zult = match framing {
            Framing::Stream => Ok(false),
            Framing::Table => self.begin_section(payload),
        };

        match (dropped, zult) {
            (Some(err), Ok(_)) => Err(err),
            (Some(err), Err(other)) => {
                warn!(pid = self.pid, "{other}");
                Err(err)
            }
            (None, zult) => zult,
        }
    }

    fn begin_section(&mut self, payload: &[u8]) -> Result<bool> {
        let Some(&pointer) = payload.first() else {
            self.restart();
            return Err(Error::InvalidPointer(0));
        };
        let pointer = pointer as usize;
        if pointer > MAX_POINTER || 1 + pointer > payload.len() {
            self.restart();
            return Err(Error::InvalidPointer(pointer));
        }

        if self.started {
            self.data.extend_from_slice(&payload[1..=pointer]);
        }
        let zult = self.freeze();
        self.data.clear();
        self.data.extend_from_slice(&payload[1 + pointer..]);
        self.started = true;
        zult
    }

    /// Continue the current payload unit.
    ///
    /// # Errors
    /// - [Error::InvalidPayload] if no unit start has been accepted. Nothing is
    ///   accumulated.
    /// - [Error::PacketDropped] if the continuity counter skipped. The payload is
    ///   still appended; validation of the resulting table decides its fate.
    pub fn extend(&mut self, counter: u8, payload: &[u8]) -> Result<()> {
        let continuity = self.continuity(counter);
        if self.framing == Some(Framing::Stream) {
            return match continuity {
                Continuity::Dropped { expected } => Err(Error::PacketDropped {
                    expected,
                    got: counter & 0xf,
                }),
                _ => Ok(()),
            };
        }
        if !self.started {
            return Err(Error::InvalidPayload);
        }
        match continuity {
            Continuity::Duplicate => Ok(()),
            Continuity::Ok => {
                self.data.extend_from_slice(payload);
                Ok(())
            }
            Continuity::Dropped { expected } => {
                self.data.extend_from_slice(payload);
                Err(Error::PacketDropped {
                    expected,
                    got: counter & 0xf,
                })
            }
        }
    }
}

impl Display for TableBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TableBuffer{{pid={}, started={}, pending={}, last_counter={:?}, framing={:?}}}",
            self.pid,
            self.started,
            self.data.len(),
            self.last_counter,
            self.framing,
        )
    }
}
