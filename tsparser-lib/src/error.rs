#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid pointer_field value {0}")]
    InvalidPointer(usize),
    #[error("scrambled packet")]
    Scrambled,
    #[error("dropped packet; expected continuity counter {expected}, got {got}")]
    PacketDropped { expected: u8, got: u8 },
    #[error("data for not started payload")]
    InvalidPayload,

    #[error("not enough bytes; got {actual}, need at least {minimum}")]
    NotEnoughData { actual: usize, minimum: usize },
    #[error("invalid section_length {0}")]
    InvalidSectionLength(usize),
    #[error("truncated table; declared {declared} bytes, got {actual}")]
    TableTruncated { declared: usize, actual: usize },
    #[error("CRC-32 mismatch; expected {expected:#010x}, computed {computed:#010x}")]
    CrcMismatch { expected: u32, computed: u32 },

    #[error("unexpected table_id {got:#04x}, expected {expected:#04x}")]
    UnexpectedTableId { expected: u8, got: u8 },
}

impl Error {
    /// False only for failures of the underlying byte source, after which decoding
    /// cannot continue.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_))
    }

    /// True for errors produced by structural validation of a frozen table.
    #[must_use]
    pub fn is_invalid_table(&self) -> bool {
        matches!(
            self,
            Error::NotEnoughData { .. }
                | Error::InvalidSectionLength(_)
                | Error::TableTruncated { .. }
                | Error::CrcMismatch { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
