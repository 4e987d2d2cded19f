use std::io::{ErrorKind, Read};

use tracing::{debug, trace};

use crate::packet::Packet;
use crate::prelude::*;

/// Number of packets held by the scanner buffer.
pub const BUFFERED_PACKETS: usize = 5;
const BUFFER_SIZE: usize = Packet::LEN * BUFFERED_PACKETS;

/// Scans a byte stream for sync-byte aligned transport stream packets.
///
/// The scanner owns a single buffer of [`BUFFERED_PACKETS`] packets that is reused for
/// the whole stream. Alignment is established by requiring the sync byte at every
/// packet-length aligned offset in the buffer. When alignment is lost the scanner
/// slides forward one byte at a time looking for a new aligned offset, dropping a
/// packet length at a time until one is found or the reader is exhausted.
///
/// Any trailing bytes that do not form a complete packet are never produced.
///
/// # Example
/// ```
/// use tsparser::{Packet, PacketScanner};
///
/// let mut dat = vec![0xffu8; Packet::LEN * 2];
/// dat[0] = Packet::SYNC_BYTE;
/// dat[Packet::LEN] = Packet::SYNC_BYTE;
///
/// let mut scanner = PacketScanner::new(&dat[..]);
/// let mut offsets = Vec::new();
/// while scanner.advance().unwrap() {
///     offsets.push(scanner.current().unwrap().offset());
/// }
/// assert_eq!(offsets, vec![0, 188]);
/// ```
pub struct PacketScanner<R>
where
    R: Read + Send,
{
    reader: R,
    buf: Box<[u8; BUFFER_SIZE]>,
    // Number of valid bytes at the start of buf
    filled: usize,
    // Start of the current packet in buf, if positioned on one
    cursor: Option<usize>,
    // Stream offset of buf[0]
    base: u64,
    // Bytes thrown away while searching for sync
    skipped: u64,
    eof: bool,
    done: bool,
}

impl<R> PacketScanner<R>
where
    R: Read + Send,
{
    pub fn new(reader: R) -> Self {
        PacketScanner {
            reader,
            buf: Box::new([0u8; BUFFER_SIZE]),
            filled: 0,
            cursor: None,
            base: 0,
            skipped: 0,
            eof: false,
            done: false,
        }
    }

    /// Position the scanner on the next packet.
    ///
    /// Returns `Ok(false)` once the reader is exhausted and no further packet could be
    /// aligned. Every call after that also returns `Ok(false)`.
    ///
    /// # Errors
    /// [Error::Io] for any reader error other than an interrupted read. The scanner is
    /// exhausted afterwards.
    pub fn advance(&mut self) -> Result<bool> {
        if self.done {
            return Ok(false);
        }

        let next = match self.cursor {
            Some(cursor) => cursor + Packet::LEN,
            None => 0,
        };
        if self.cursor.is_some()
            && next + Packet::LEN <= self.filled
            && (self.buf[next] == Packet::SYNC_BYTE || self.is_final_packet(next))
        {
            self.cursor = Some(next);
            return Ok(true);
        }

        // Whatever is before next has been consumed
        self.cursor = None;
        self.discard(next);
        match self.synchronize() {
            Ok(true) => {
                self.cursor = Some(0);
                Ok(true)
            }
            Ok(false) => {
                trace!(offset = self.base, "packet stream exhausted");
                self.done = true;
                Ok(false)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }

    /// The packet the scanner is currently positioned on, or `None` if `advance` has
    /// not yet been called or the stream is exhausted.
    #[must_use]
    pub fn current(&self) -> Option<Packet<'_>> {
        if self.done {
            return None;
        }
        let cursor = self.cursor?;
        Packet::new(
            &self.buf[cursor..cursor + Packet::LEN],
            self.base + cursor as u64,
        )
    }

    /// Total number of bytes discarded while searching for sync.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Drop the first `n` buffered bytes, moving the rest to the front.
    fn discard(&mut self, n: usize) {
        let n = n.min(self.filled);
        self.buf.copy_within(n..self.filled, 0);
        self.filled -= n;
        self.base += n as u64;
    }

    /// Read until the buffer is full or the reader is at EOF.
    fn fill(&mut self) -> Result<()> {
        while !self.eof && self.filled < BUFFER_SIZE {
            match self.reader.read(&mut self.buf[self.filled..]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::Io(err)),
            }
        }
        Ok(())
    }

    /// True at EOF if the packet at `offset` is the last complete one in the stream.
    /// Its sync byte is not required.
    fn is_final_packet(&self, offset: usize) -> bool {
        self.eof && offset + 2 * Packet::LEN > self.filled
    }

    /// True if a complete packet starts at `offset` on a sync byte and every following
    /// aligned offset in the buffer holds the sync byte. Once at EOF a trailing partial
    /// packet is not considered, nor is the sync byte of the final packet.
    fn synced_at(&self, offset: usize) -> bool {
        if offset + Packet::LEN > self.filled || self.buf[offset] != Packet::SYNC_BYTE {
            return false;
        }
        (offset + Packet::LEN..self.filled)
            .step_by(Packet::LEN)
            .filter(|idx| !self.eof || idx + 2 * Packet::LEN <= self.filled)
            .all(|idx| self.buf[idx] == Packet::SYNC_BYTE)
    }

    /// True if the buffer starts with two sync-marked packets even though alignment
    /// breaks further in.
    fn leading_pair_synced(&self) -> bool {
        self.filled >= 2 * Packet::LEN
            && self.buf[0] == Packet::SYNC_BYTE
            && self.buf[Packet::LEN] == Packet::SYNC_BYTE
    }

    /// Find sync at the start of the buffer. Skipped bytes are discarded and replaced
    /// from the reader.
    ///
    /// Offsets within one packet length are tried first. If none is aligned across the
    /// whole buffer, the packet at the start is accepted when it and the next packet
    /// are both sync-marked; the fast path in `advance` then runs into the break and
    /// resyncs from there. Otherwise one packet length is dropped and the search
    /// repeats until the reader is at EOF.
    fn synchronize(&mut self) -> Result<bool> {
        loop {
            self.fill()?;
            if self.filled < Packet::LEN {
                return Ok(false);
            }
            if let Some(offset) = (0..Packet::LEN).find(|offset| self.synced_at(*offset)) {
                if offset > 0 {
                    debug!(offset = self.base, skipped = offset, "resynchronized");
                    self.skipped += offset as u64;
                    self.discard(offset);
                    self.fill()?;
                }
                return Ok(true);
            }
            if self.leading_pair_synced() {
                debug!(offset = self.base, "sync lost later in buffer");
                return Ok(true);
            }
            debug!(offset = self.base, "no sync within one packet length, dropping a packet");
            let n = Packet::LEN.min(self.filled);
            self.skipped += n as u64;
            self.discard(n);
        }
    }
}
