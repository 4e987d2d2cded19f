use std::collections::{HashMap, HashSet};
use std::io::Read;

use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

use super::{Table, TableBuffer};
use crate::packet::{Pid, NULL_PID};
use crate::prelude::*;
use crate::scanner::PacketScanner;
use crate::summary::Summary;

/// Options controlling which packets a [TableScanner] reassembles.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ScanOpts {
    /// Only reassemble tables on these PIDs. Empty means all PIDs.
    #[builder(default, setter(into))]
    pub pids: HashSet<Pid>,
    /// Verify the CRC_32 of long-form sections. Sections failing verification are
    /// reported as invalid tables.
    #[builder(default = false)]
    pub verify_crc: bool,
    /// Skip null packets.
    #[builder(default = true)]
    pub skip_null: bool,
}

impl Default for ScanOpts {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScanOpts {
    fn selects(&self, pid: Pid) -> bool {
        if self.skip_null && pid == NULL_PID {
            return false;
        }
        self.pids.is_empty() || self.pids.contains(&pid)
    }
}

/// A [Table] along with the PID it was reassembled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTable {
    pub pid: Pid,
    pub table: Table,
}

/// Reassembles tables from all selected PIDs of a transport stream.
///
/// Errors on individual packets or tables are logged, counted in the [Summary], and
/// otherwise do not stop scanning. Only an I/O error from the underlying reader does.
///
/// # Example
/// ```
/// use tsparser::{Packet, TableScanner};
///
/// // Two PAT packets; the first table is complete when the second starts
/// let section = [
///     0x00, 0xb0, 0x0d, 0x00, 0x00, 0xc3, 0x00, 0x00, 0x00, 0x01, 0xe1, 0xe0, 0xe8, 0x5f,
///     0x74, 0xec,
/// ];
/// let mut dat = Vec::new();
/// for counter in 0..2u8 {
///     let mut packet = [0xffu8; Packet::LEN];
///     packet[..5].copy_from_slice(&[0x47, 0x40, 0x00, 0x10 | counter, 0x00]);
///     packet[5..5 + section.len()].copy_from_slice(&section);
///     dat.extend_from_slice(&packet);
/// }
///
/// let mut scanner = TableScanner::new(&dat[..]);
/// assert!(TableScanner::scan(&mut scanner).unwrap());
/// assert_eq!(scanner.pid(), Some(0));
/// assert_eq!(scanner.table().unwrap().as_bytes(), &section);
/// assert!(!TableScanner::scan(&mut scanner).unwrap());
/// ```
pub struct TableScanner<R>
where
    R: Read + Send,
{
    packets: PacketScanner<R>,
    opts: ScanOpts,
    buffers: HashMap<Pid, TableBuffer>,
    // PID whose buffer froze a table during the last scan
    current: Option<Pid>,
    summary: Summary,
}

impl<R> TableScanner<R>
where
    R: Read + Send,
{
    pub fn new(reader: R) -> Self {
        Self::with_opts(reader, ScanOpts::default())
    }

    pub fn with_opts(reader: R, opts: ScanOpts) -> Self {
        TableScanner {
            packets: PacketScanner::new(reader),
            opts,
            buffers: HashMap::default(),
            current: None,
            summary: Summary::default(),
        }
    }

    /// Scan packets until a new table is available.
    ///
    /// Returns `Ok(true)` when a table was frozen; it is available from
    /// [TableScanner::table] until the next call. Returns `Ok(false)` once the stream
    /// is exhausted.
    ///
    /// # Errors
    /// [Error::Io] if reading the stream fails. No further tables are produced.
    pub fn scan(&mut self) -> Result<bool> {
        self.current = None;
        while self.packets.advance()? {
            let Some(packet) = self.packets.current() else {
                break;
            };
            let pid = packet.pid();
            if !self.opts.selects(pid) {
                continue;
            }
            self.summary.add(&packet);
            if !packet.has_payload() {
                continue;
            }
            if packet.is_scrambled() {
                report(&mut self.summary, pid, &Error::Scrambled);
                continue;
            }

            let buffer = self
                .buffers
                .entry(pid)
                .or_insert_with(|| TableBuffer::new(pid).with_crc(self.opts.verify_crc));
            if packet.discontinuity_indicator() {
                trace!(pid, "discontinuity indicated");
                buffer.reset_continuity();
            }

            let counter = packet.continuity_counter();
            let payload = packet.payload();
            if packet.payload_unit_start_indicator() {
                match buffer.begin(counter, payload) {
                    Ok(true) => {
                        trace!(pid, offset = packet.offset(), "table complete");
                        self.summary.add_table(pid);
                        self.current = Some(pid);
                        return Ok(true);
                    }
                    Ok(false) => {}
                    Err(err) => report(&mut self.summary, pid, &err),
                }
            } else if let Err(err) = buffer.extend(counter, payload) {
                report(&mut self.summary, pid, &err);
            }
        }
        Ok(false)
    }

    /// The table frozen by the last successful [TableScanner::scan], if any.
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.current
            .and_then(|pid| self.buffers.get(&pid))
            .and_then(TableBuffer::table)
    }

    /// PID of the table frozen by the last successful [TableScanner::scan].
    #[must_use]
    pub fn pid(&self) -> Option<Pid> {
        self.current
    }

    /// Reassembly state for `pid`, if any payload was seen on it.
    #[must_use]
    pub fn buffer(&self, pid: Pid) -> Option<&TableBuffer> {
        self.buffers.get(&pid)
    }

    #[must_use]
    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Number of bytes skipped to regain packet sync.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.packets.skipped()
    }
}

fn report(summary: &mut Summary, pid: Pid, err: &Error) {
    match err {
        Error::Scrambled | Error::InvalidPayload => trace!(pid, "{err}"),
        Error::PacketDropped { .. } => debug!(pid, "{err}"),
        _ => warn!(pid, "{err}"),
    }
    summary.record(pid, err);
}

impl<R> Iterator for TableScanner<R>
where
    R: Read + Send,
{
    type Item = Result<DecodedTable>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.scan() {
            Ok(true) => {
                let pid = self.current?;
                let table = self.table()?.clone();
                Some(Ok(DecodedTable { pid, table }))
            }
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;

    const PAT: &str = "00b00d0000c30000000001e1e0e85f74ec";

    fn packet(pid: Pid, start: bool, counter: u8, payload: &[u8]) -> Vec<u8> {
        let mut dat = vec![0xffu8; Packet::LEN];
        let [hi, lo] = pid.to_be_bytes();
        dat[0] = Packet::SYNC_BYTE;
        dat[1] = if start { 0x40 | hi } else { hi };
        dat[2] = lo;
        dat[3] = 0x10 | (counter & 0xf);
        dat[4..4 + payload.len()].copy_from_slice(payload);
        dat
    }

    fn pat_payload() -> Vec<u8> {
        let mut payload = vec![0u8];
        payload.extend(hex::decode(PAT).unwrap());
        payload
    }

    fn pat_stream(counters: &[u8]) -> Vec<u8> {
        counters
            .iter()
            .flat_map(|&cc| packet(0, true, cc, &pat_payload()))
            .collect()
    }

    #[test]
    fn table_is_idempotent() {
        let dat = pat_stream(&[0, 1]);
        let mut scanner = TableScanner::new(&dat[..]);

        assert!(scanner.table().is_none());
        assert!(TableScanner::scan(&mut scanner).unwrap());

        let first = scanner.table().cloned();
        assert!(first.is_some());
        assert_eq!(scanner.table().cloned(), first);
        assert_eq!(scanner.table().cloned(), first);
        assert_eq!(
            first.unwrap().as_bytes(),
            &hex::decode(PAT).unwrap()[..]
        );

        assert!(!TableScanner::scan(&mut scanner).unwrap());
        assert!(scanner.table().is_none());
    }

    #[test]
    fn duplicate_counter_is_not_a_drop() {
        let dat = pat_stream(&[0, 1, 2, 2, 3]);
        let mut scanner = TableScanner::new(&dat[..]);

        let tables: Vec<DecodedTable> = scanner.by_ref().map(Result::unwrap).collect();

        // the retransmission does not freeze; the last table is never completed
        assert_eq!(tables.len(), 3);
        assert_eq!(scanner.summary().total.dropped, 0);
    }

    #[test]
    fn skipped_counter_is_one_drop() {
        let dat = pat_stream(&[0, 1, 3]);
        let mut scanner = TableScanner::new(&dat[..]);

        let tables: Vec<DecodedTable> = scanner.by_ref().map(Result::unwrap).collect();

        assert_eq!(scanner.summary().total.dropped, 1);
        assert_eq!(scanner.summary().pids[&0].dropped, 1);
        // the table frozen alongside the drop is not announced
        assert_eq!(tables.len(), 1);
    }

    #[test]
    fn scrambled_packets_are_skipped() {
        let mut dat = pat_stream(&[0]);
        let mut scrambled = packet(0, true, 1, &pat_payload());
        scrambled[3] |= 0x80;
        dat.extend(scrambled);
        dat.extend(pat_stream(&[1]));

        let mut scanner = TableScanner::new(&dat[..]);

        assert!(TableScanner::scan(&mut scanner).unwrap());
        assert_eq!(scanner.summary().total.scrambled, 1);
        assert_eq!(scanner.summary().total.dropped, 0);
    }

    #[test]
    fn continuation_without_start_is_reported() {
        let mut dat = packet(0x100, false, 0, &[0u8; 10]);
        dat.extend(pat_stream(&[0, 1]));
        let mut scanner = TableScanner::new(&dat[..]);

        assert!(TableScanner::scan(&mut scanner).unwrap());

        assert_eq!(scanner.summary().pids[&0x100].invalid_payloads, 1);
    }

    #[test]
    fn packets_without_payload_are_counted() {
        let mut dat = packet(0x100, false, 0, &[]);
        dat[3] = 0x20;
        dat[4] = 183;
        dat.extend(pat_stream(&[0, 1]));
        let mut scanner = TableScanner::new(&dat[..]);

        assert!(TableScanner::scan(&mut scanner).unwrap());

        assert_eq!(scanner.summary().total.no_payload, 1);
        assert!(scanner.buffer(0x100).is_none());
    }

    #[test]
    fn unselected_pids_are_skipped() {
        let mut dat = packet(NULL_PID, true, 0, &pat_payload());
        dat.extend(packet(NULL_PID, true, 1, &pat_payload()));
        dat.extend(packet(0x20, true, 0, &pat_payload()));
        dat.extend(packet(0x20, true, 1, &pat_payload()));
        dat.extend(pat_stream(&[0, 1]));

        let opts = ScanOpts::builder().pids([0x20].into_iter().collect::<HashSet<Pid>>()).build();
        let scanner = TableScanner::with_opts(&dat[..], opts);
        let pids: Vec<Pid> = scanner.map(|t| t.unwrap().pid).collect();
        assert_eq!(pids, vec![0x20]);

        let scanner = TableScanner::new(&dat[..]);
        let pids: Vec<Pid> = scanner.map(|t| t.unwrap().pid).collect();
        assert_eq!(pids, vec![0x20, 0]);

        let opts = ScanOpts::builder().skip_null(false).build();
        let scanner = TableScanner::with_opts(&dat[..], opts);
        let pids: Vec<Pid> = scanner.map(|t| t.unwrap().pid).collect();
        assert_eq!(pids, vec![NULL_PID, 0x20, 0]);
    }

    #[test]
    fn default_opts() {
        let opts = ScanOpts::default();
        assert!(opts.pids.is_empty());
        assert!(!opts.verify_crc);
        assert!(opts.skip_null);
    }
}
