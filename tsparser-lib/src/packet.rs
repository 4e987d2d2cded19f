//! Transport stream packets.
//!
//! References:
//! * ISO/IEC 13818-1, section 2.4.3.2 (transport stream packet layer)

pub type Pid = u16;

/// Program association table PID.
pub const PAT_PID: Pid = 0x0000;
/// Conditional access table PID.
pub const CAT_PID: Pid = 0x0001;
/// Null packet PID.
pub const NULL_PID: Pid = 0x1fff;

/// A single transport stream packet.
///
/// A `Packet` borrows the bytes it was created from, so a packet obtained from a
/// [`PacketScanner`](crate::PacketScanner) cannot outlive the next call to
/// `advance`. Copy the bytes out with [`Packet::bytes`] to keep them.
///
/// # Example
/// ```
/// use tsparser::Packet;
///
/// let mut dat = [0xffu8; Packet::LEN];
/// dat[..4].copy_from_slice(&[0x47, 0x40, 0x00, 0x11]);
/// let packet = Packet::new(&dat, 0).unwrap();
/// assert_eq!(packet.pid(), 0);
/// assert!(packet.payload_unit_start_indicator());
/// assert_eq!(packet.continuity_counter(), 1);
/// assert_eq!(packet.payload().len(), 184);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    data: &'a [u8],
    offset: u64,
}

impl<'a> Packet<'a> {
    /// Size of a packet in bytes
    pub const LEN: usize = 188;
    /// Size of the fixed packet header
    pub const HEADER_LEN: usize = 4;
    /// Value of the first byte of every packet
    pub const SYNC_BYTE: u8 = 0x47;

    /// Construct from exactly [`Packet::LEN`] bytes found at `offset` in a stream, or
    /// `None` for any other length.
    #[must_use]
    pub fn new(data: &'a [u8], offset: u64) -> Option<Self> {
        if data.len() != Self::LEN {
            return None;
        }
        Some(Packet { data, offset })
    }

    /// All packet bytes, including the header.
    #[must_use]
    pub fn bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Byte offset of this packet from the start of the stream.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn sync_byte(&self) -> u8 {
        self.data[0]
    }

    #[must_use]
    pub fn transport_error_indicator(&self) -> bool {
        self.data[1] & 0x80 != 0
    }

    #[must_use]
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.data[1] & 0x40 != 0
    }

    #[must_use]
    pub fn transport_priority(&self) -> bool {
        self.data[1] & 0x20 != 0
    }

    #[must_use]
    pub fn pid(&self) -> Pid {
        u16::from_be_bytes([self.data[1], self.data[2]]) & 0x1fff
    }

    /// The 2-bit scrambling control field; zero means not scrambled.
    #[must_use]
    pub fn transport_scrambling_control(&self) -> u8 {
        (self.data[3] >> 6) & 0x3
    }

    #[must_use]
    pub fn is_scrambled(&self) -> bool {
        self.transport_scrambling_control() != 0
    }

    #[must_use]
    pub fn adaptation_field_control(&self) -> u8 {
        (self.data[3] >> 4) & 0x3
    }

    #[must_use]
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_field_control() & 0x2 != 0
    }

    #[must_use]
    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control() & 0x1 != 0
    }

    #[must_use]
    pub fn continuity_counter(&self) -> u8 {
        self.data[3] & 0xf
    }

    /// Adaptation field bytes following the adaptation_field_length byte. Empty if
    /// there is no adaptation field. A length running past the end of the packet is
    /// clamped to the packet.
    #[must_use]
    pub fn adaptation_field(&self) -> &'a [u8] {
        if !self.has_adaptation_field() {
            return &[];
        }
        let start = Self::HEADER_LEN + 1;
        let end = (start + self.data[Self::HEADER_LEN] as usize).min(Self::LEN);
        &self.data[start..end]
    }

    /// True when the adaptation field signals a continuity counter discontinuity.
    #[must_use]
    pub fn discontinuity_indicator(&self) -> bool {
        self.adaptation_field()
            .first()
            .is_some_and(|flags| flags & 0x80 != 0)
    }

    /// Payload bytes following the header and any adaptation field.
    ///
    /// Empty when the packet carries no payload, or when the adaptation field length
    /// leaves no room for one.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        if !self.has_payload() {
            return &[];
        }
        let start = if self.has_adaptation_field() {
            Self::HEADER_LEN + 1 + self.data[Self::HEADER_LEN] as usize
        } else {
            Self::HEADER_LEN
        };
        if start >= Self::LEN {
            return &[];
        }
        &self.data[start..]
    }
}
