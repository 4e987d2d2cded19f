#![doc = include_str!("../README.md")]

mod error;

pub mod packet;
pub mod scanner;
pub mod section;
pub mod summary;
pub mod table;

pub use error::{Error, Result};
pub use packet::{Packet, Pid};
pub use scanner::PacketScanner;
pub use section::{ProgramAssociation, ProgramMap};
pub use summary::{PidSummary, Summary};
pub use table::{DecodedTable, ScanOpts, Table, TableBuffer, TableScanner};

pub(crate) mod prelude {
    pub use crate::error::{Error, Result};
}
