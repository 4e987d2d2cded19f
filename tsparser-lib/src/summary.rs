use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::packet::{Packet, Pid};
use crate::Error;

/// Counts for a single PID, or for all of them.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidSummary {
    pub packets: usize,
    pub no_payload: usize,
    pub scrambled: usize,
    pub dropped: usize,
    pub invalid_pointers: usize,
    pub invalid_payloads: usize,
    pub invalid_tables: usize,
    pub tables: usize,
}

impl PidSummary {
    fn record(&mut self, err: &Error) {
        match err {
            Error::Scrambled => self.scrambled += 1,
            Error::PacketDropped { .. } => self.dropped += 1,
            Error::InvalidPointer(_) => self.invalid_pointers += 1,
            Error::InvalidPayload => self.invalid_payloads += 1,
            err if err.is_invalid_table() => self.invalid_tables += 1,
            _ => {}
        }
    }
}

/// Tracks stats on table scanning.
///
/// # Example
/// ```
/// use tsparser::{Packet, Summary};
///
/// let mut dat = [0xffu8; Packet::LEN];
/// dat[..4].copy_from_slice(&[0x47, 0x40, 0x00, 0x10]);
/// let packet = Packet::new(&dat, 0).unwrap();
///
/// let mut summary = Summary::default();
/// summary.add(&packet);
/// summary.add_table(packet.pid());
///
/// assert_eq!(summary.total.packets, 1);
/// assert_eq!(summary.pids[&0].tables, 1);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    pub total: PidSummary,
    pub pids: BTreeMap<Pid, PidSummary>,
}

impl Summary {
    fn update<F>(&mut self, pid: Pid, f: F)
    where
        F: Fn(&mut PidSummary),
    {
        f(&mut self.total);
        f(self.pids.entry(pid).or_default());
    }

    /// Count a packet. Packets without payload are counted as such; scrambling is
    /// counted separately by [Summary::record].
    pub fn add(&mut self, packet: &Packet) {
        let no_payload = !packet.has_payload();
        self.update(packet.pid(), |s| {
            s.packets += 1;
            if no_payload {
                s.no_payload += 1;
            }
        });
    }

    /// Count a recoverable error reported for `pid`.
    pub fn record(&mut self, pid: Pid, err: &Error) {
        self.update(pid, |s| s.record(err));
    }

    /// Count a table surfaced for `pid`.
    pub fn add_table(&mut self, pid: Pid) {
        self.update(pid, |s| s.tables += 1);
    }
}
