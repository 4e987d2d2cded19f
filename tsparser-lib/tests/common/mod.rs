#![allow(dead_code)]
use std::collections::HashMap;

use crc::{Crc, CRC_32_MPEG_2};
use tsparser::{Packet, Pid};

pub const PAYLOAD_LEN: usize = Packet::LEN - Packet::HEADER_LEN;

/// Long-form section with the given body, with section_length and CRC_32 filled in.
pub fn section(table_id: u8, table_id_extension: u16, version: u8, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut dat = vec![
        table_id,
        0xb0 | u8::try_from(section_length >> 8).unwrap(),
        u8::try_from(section_length & 0xff).unwrap(),
    ];
    dat.extend_from_slice(&table_id_extension.to_be_bytes());
    dat.push(0xc1 | ((version & 0x1f) << 1));
    dat.extend_from_slice(&[0x00, 0x00]);
    dat.extend_from_slice(body);
    append_crc(dat)
}

/// Append the CRC_32 of `dat`.
pub fn append_crc(mut dat: Vec<u8>) -> Vec<u8> {
    let crc = Crc::<u32>::new(&CRC_32_MPEG_2).checksum(&dat);
    dat.extend_from_slice(&crc.to_be_bytes());
    dat
}

/// PAT mapping each program number to its PMT PID.
pub fn pat(transport_stream_id: u16, version: u8, programs: &[(u16, Pid)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (program, pid) in programs {
        body.extend_from_slice(&program.to_be_bytes());
        body.extend_from_slice(&(0xe000 | pid).to_be_bytes());
    }
    section(0x00, transport_stream_id, version, &body)
}

/// Builds a transport stream in memory, keeping a continuity counter per PID.
#[derive(Default)]
pub struct StreamBuilder {
    dat: Vec<u8>,
    counters: HashMap<Pid, u8>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_counter(&mut self, pid: Pid) -> u8 {
        let counter = self.counters.entry(pid).or_insert(0);
        let cur = *counter;
        *counter = (cur + 1) % 16;
        cur
    }

    /// Append a packet with explicit header values. A payload shorter than a full
    /// packet payload is padded with adaptation field stuffing.
    pub fn raw(
        &mut self,
        pid: Pid,
        start: bool,
        counter: u8,
        adaptation_flags: Option<u8>,
        payload: &[u8],
    ) -> &mut Self {
        assert!(payload.len() <= PAYLOAD_LEN, "payload too long");
        assert!(
            adaptation_flags.is_none() || payload.len() < PAYLOAD_LEN - 1,
            "no room for adaptation flags"
        );
        let [hi, lo] = pid.to_be_bytes();
        let mut packet = vec![
            Packet::SYNC_BYTE,
            if start { 0x40 | hi } else { hi },
            lo,
            counter & 0xf,
        ];
        if payload.len() < PAYLOAD_LEN || adaptation_flags.is_some() {
            let room = PAYLOAD_LEN - 1 - payload.len().min(PAYLOAD_LEN - 1);
            packet[3] |= if payload.is_empty() { 0x20 } else { 0x30 };
            packet.push(u8::try_from(room).unwrap());
            if room > 0 {
                packet.push(adaptation_flags.unwrap_or(0));
                packet.extend(std::iter::repeat(0xff).take(room - 1));
            }
            packet.extend_from_slice(&payload[..payload.len().min(PAYLOAD_LEN - 1)]);
        } else {
            packet[3] |= 0x10;
            packet.extend_from_slice(payload);
        }
        assert_eq!(packet.len(), Packet::LEN);
        self.dat.extend(packet);
        self
    }

    /// Append a packet with the next continuity counter for `pid`.
    pub fn packet(&mut self, pid: Pid, start: bool, payload: &[u8]) -> &mut Self {
        let counter = self.next_counter(pid);
        self.raw(pid, start, counter, None, payload)
    }

    /// Append a section as a zero pointer_field unit start followed by as many
    /// continuation packets as needed. The final packet is padded with 0xff stuffing
    /// bytes in the payload.
    pub fn section(&mut self, pid: Pid, section: &[u8]) -> &mut Self {
        let mut payload = vec![0u8];
        payload.extend_from_slice(section);
        let padded = payload.len().div_ceil(PAYLOAD_LEN) * PAYLOAD_LEN;
        payload.resize(padded, 0xff);
        for (idx, chunk) in payload.chunks(PAYLOAD_LEN).enumerate() {
            self.packet(pid, idx == 0, chunk);
        }
        self
    }

    /// Append a null packet.
    pub fn null(&mut self) -> &mut Self {
        self.packet(0x1fff, false, &[0xff; PAYLOAD_LEN])
    }

    /// Append arbitrary bytes.
    pub fn bytes(&mut self, dat: &[u8]) -> &mut Self {
        self.dat.extend_from_slice(dat);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        self.dat.clone()
    }
}
