//! MPEG-2 Transport Stream packetization: PAT/PMT sections, PES framing
//! and the 188-byte packet layer with PCR insertion.

use std::collections::HashMap;
use std::io::Write;

use crate::es::{MediaSet, StreamId, StreamType};
use crate::file::MediaRead;
use crate::track::Sample;
use crate::{Error, Result};

pub const PACKET_LEN: usize = 188;
pub const PAT_PID: u16 = 0x0000;
pub const PMT_PID: u16 = 0x1000;

const PROGRAM_NUMBER: u16 = 1;
const PTS_CLOCK: u64 = 90_000;
const PCR_CLOCK: u64 = 27_000_000;
/// Minimum PCR spacing, a tenth of a second in 90 kHz ticks.
const PCR_INTERVAL: u64 = 9_000;

/// Packetizer for one segment. Continuity counters and the PCR clock
/// start fresh with each instance, every segment is independently
/// decodable.
pub struct TsMuxer<W: Write> {
    out: W,
    continuity: HashMap<u16, u8>,
    /// Last emitted PCR base, 90 kHz.
    last_pcr: Option<u64>,
}

impl<W: Write> TsMuxer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            continuity: HashMap::new(),
            last_pcr: None,
        }
    }

    pub fn write_pat(&mut self) -> Result<()> {
        let mut section = Vec::with_capacity(16);
        section.push(0x00); // table_id: program association
        section.extend_from_slice(&(0xB000u16 | 13).to_be_bytes());
        section.extend_from_slice(&1u16.to_be_bytes()); // transport_stream_id
        section.push(0xC1); // version 0, current
        section.push(0x00); // section_number
        section.push(0x00); // last_section_number
        section.extend_from_slice(&PROGRAM_NUMBER.to_be_bytes());
        section.extend_from_slice(&(0xE000 | PMT_PID).to_be_bytes());

        let crc = crc32_mpeg2(&section);
        section.extend_from_slice(&crc.to_be_bytes());

        self.write_section(PAT_PID, &section)
    }

    /// `pcr_pid` is the stream whose packets carry the program clock.
    pub fn write_pmt(&mut self, pcr_pid: u16, streams: &[(u16, StreamType)]) -> Result<()> {
        let section_length = 13 + 5 * streams.len();
        if section_length > 0x3FF {
            return Err(Error::InvalidData("too many streams for one PMT section"));
        }

        let mut section = Vec::with_capacity(4 + section_length);
        section.push(0x02); // table_id: program map
        section.extend_from_slice(&(0xB000u16 | section_length as u16).to_be_bytes());
        section.extend_from_slice(&PROGRAM_NUMBER.to_be_bytes());
        section.push(0xC1); // version 0, current
        section.push(0x00);
        section.push(0x00);
        section.extend_from_slice(&(0xE000 | pcr_pid).to_be_bytes());
        section.extend_from_slice(&0xF000u16.to_be_bytes()); // no program descriptors

        for &(pid, stream_type) in streams {
            section.push(stream_type as u8);
            section.extend_from_slice(&(0xE000 | pid).to_be_bytes());
            section.extend_from_slice(&0xF000u16.to_be_bytes()); // no ES descriptors
        }

        let crc = crc32_mpeg2(&section);
        section.extend_from_slice(&crc.to_be_bytes());

        self.write_section(PMT_PID, &section)
    }

    /// Frames one access unit as a PES packet and splits it over transport
    /// packets. `pcr` is the 27 MHz program clock sample for streams that
    /// carry it, the muxer spaces actual insertions by [`PCR_INTERVAL`].
    pub fn write_pes(
        &mut self,
        pid: u16,
        stream_id: StreamId,
        pts: u64,
        dts: u64,
        pcr: Option<u64>,
        es: &[u8],
    ) -> Result<()> {
        let both = pts != dts;
        let header_data_len: usize = if both { 10 } else { 5 };

        let mut pes = Vec::with_capacity(es.len() + 9 + header_data_len);
        pes.extend_from_slice(&[0x00, 0x00, 0x01, stream_id as u8]);

        // Zero marks an unbounded packet, the only choice once the access
        // unit outgrows the 16-bit length field.
        let body_len = 3 + header_data_len + es.len();
        let packet_length = if body_len <= 0xFFFF { body_len as u16 } else { 0 };
        pes.extend_from_slice(&packet_length.to_be_bytes());

        pes.push(0x80); // marker bits, no scrambling
        pes.push(if both { 0xC0 } else { 0x80 });
        pes.push(header_data_len as u8);
        write_timestamp(&mut pes, if both { 0x30 } else { 0x20 }, pts);
        if both {
            write_timestamp(&mut pes, 0x10, dts);
        }
        pes.extend_from_slice(es);

        let pcr = pcr.and_then(|pcr| {
            let base = pcr / 300;
            match self.last_pcr {
                Some(last) if base.saturating_sub(last) <= PCR_INTERVAL => None,
                _ => {
                    self.last_pcr = Some(base);
                    Some(pcr)
                }
            }
        });

        self.write_payload(pid, pcr, &pes)
    }

    /// Splits `data` into 188-byte packets, PUSI on the first, adaptation
    /// field stuffing on the tail.
    fn write_payload(&mut self, pid: u16, pcr: Option<u64>, data: &[u8]) -> Result<()> {
        let mut first = true;
        let mut rest = data;

        while !rest.is_empty() {
            let mut packet = [0xFFu8; PACKET_LEN];
            packet[0] = 0x47;
            packet[1] = if first { 0x40 } else { 0x00 } | (pid >> 8) as u8;
            packet[2] = pid as u8;
            let cc = self.next_continuity(pid);

            let take;
            let mut at = 4;

            if let (true, Some(pcr)) = (first, pcr) {
                // Adaptation field with the clock, padded out when the
                // whole access unit fits in this packet.
                take = rest.len().min(176);
                let af_len = 183 - take;
                packet[3] = 0x30 | cc;
                packet[4] = af_len as u8;
                packet[5] = 0x10; // PCR_flag
                write_pcr(&mut packet[6..12], pcr);
                at = 5 + af_len;
            } else if rest.len() >= 184 {
                take = 184;
                packet[3] = 0x10 | cc;
            } else {
                take = rest.len();
                let af_len = 183 - take;
                packet[3] = 0x30 | cc;
                packet[4] = af_len as u8;
                if af_len > 0 {
                    packet[5] = 0x00; // stuffing only
                }
                at = 5 + af_len;
            }

            packet[at..at + take].copy_from_slice(&rest[..take]);
            rest = &rest[take..];
            first = false;

            self.out.write_all(&packet)?;
        }

        Ok(())
    }

    fn write_section(&mut self, pid: u16, section: &[u8]) -> Result<()> {
        if section.len() > 183 {
            return Err(Error::InvalidData("PSI section does not fit one packet"));
        }

        let mut packet = [0xFFu8; PACKET_LEN];
        packet[0] = 0x47;
        packet[1] = 0x40 | (pid >> 8) as u8;
        packet[2] = pid as u8;
        packet[3] = 0x10 | self.next_continuity(pid);
        packet[4] = 0x00; // pointer_field
        packet[5..5 + section.len()].copy_from_slice(section);

        self.out.write_all(&packet)?;

        Ok(())
    }

    fn next_continuity(&mut self, pid: u16) -> u8 {
        let counter = self.continuity.entry(pid).or_insert(0);
        let value = *counter;
        *counter = (value + 1) & 0x0F;
        value
    }
}

/// 33-bit timestamp with interleaved marker bits, 5 bytes.
fn write_timestamp(out: &mut Vec<u8>, prefix: u8, ts: u64) {
    let ts = ts & 0x1_FFFF_FFFF;
    out.push(prefix | ((ts >> 29) & 0x0E) as u8 | 0x01);
    out.push((ts >> 22) as u8);
    out.push((((ts >> 15) as u8) << 1) | 0x01);
    out.push((ts >> 7) as u8);
    out.push(((ts as u8) << 1) | 0x01);
}

/// 33-bit base at 90 kHz plus a 9-bit extension counting the remaining
/// 27 MHz ticks, 6 bytes.
fn write_pcr(out: &mut [u8], pcr: u64) {
    let base = (pcr / 300) & 0x1_FFFF_FFFF;
    let ext = (pcr % 300) as u16;

    out[0] = (base >> 25) as u8;
    out[1] = (base >> 17) as u8;
    out[2] = (base >> 9) as u8;
    out[3] = (base >> 1) as u8;
    out[4] = ((base as u8) << 7) | 0x7E | (ext >> 8) as u8;
    out[5] = ext as u8;
}

/// CRC-32/MPEG-2: 0x04C11DB7 without reflection, all-ones init, no final
/// xor.
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ 0x04C1_1DB7
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Remuxes every sample of the video window `[start, end)` into one
/// standalone transport stream. `end` is `None` for the final segment.
pub fn write_segment(
    set: &MediaSet,
    source: &dyn MediaRead,
    start: u64,
    end: Option<u64>,
) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut muxer = TsMuxer::new(&mut out);

    let pcr_pid = set.video().pid;
    let table: Vec<(u16, StreamType)> = set
        .streams
        .iter()
        .map(|s| (s.pid, s.stream_type))
        .collect();

    muxer.write_pat()?;
    muxer.write_pmt(pcr_pid, &table)?;

    let mut prev: HashMap<usize, Sample> = HashMap::new();
    let mut es_buf = Vec::new();

    for (index, sample) in set.interleave(start, end) {
        let stream = &set.streams[index];
        let payload = source.read_at(sample.offset, sample.size as usize)?;

        es_buf.clear();
        stream
            .packager
            .write_sample(sample, prev.get(&index), &payload, &mut es_buf)?;

        let pts = rescale(sample.presentation_time(), stream.timescale, PTS_CLOCK)?;
        let dts = rescale(sample.dts, stream.timescale, PTS_CLOCK)?;
        let pcr = if stream.pid == pcr_pid {
            Some(rescale(sample.dts, stream.timescale, PCR_CLOCK)?)
        } else {
            None
        };

        muxer.write_pes(stream.pid, stream.stream_id, pts, dts, pcr, &es_buf)?;
        prev.insert(index, *sample);
    }

    Ok(out)
}

fn rescale(value: u64, timescale: u32, clock: u64) -> Result<u64> {
    if timescale == 0 {
        return Err(Error::InvalidData("timescale is zero"));
    }

    u64::try_from(value as u128 * clock as u128 / timescale as u128)
        .map_err(|_| Error::Overflow("rescaling a timestamp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc32_mpeg2() {
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376E6E7);
    }

    #[test]
    fn test_pat_packet() {
        let mut out = Vec::new();
        TsMuxer::new(&mut out).write_pat().unwrap();

        assert_eq!(out.len(), PACKET_LEN);
        assert_eq!(&out[..4], &[0x47, 0x40, 0x00, 0x10]);
        assert_eq!(out[4], 0x00); // pointer_field
        assert_eq!(out[5], 0x00); // table_id

        // section body checks out against its own CRC
        let section = &out[5..5 + 16];
        assert_eq!(crc32_mpeg2(&section[..12]).to_be_bytes(), section[12..16]);

        // program 1 maps to the PMT PID
        assert_eq!(&section[8..12], &[0x00, 0x01, 0xF0, 0x00]);
    }

    #[test]
    fn test_pmt_packet() {
        let mut out = Vec::new();
        TsMuxer::new(&mut out)
            .write_pmt(0x100, &[(0x100, StreamType::Video), (0x101, StreamType::Audio)])
            .unwrap();

        assert_eq!(out.len(), PACKET_LEN);
        assert_eq!(&out[..3], &[0x47, 0x50, 0x00]);
        assert_eq!(out[5], 0x02); // table_id

        let section_length = (u16::from_be_bytes([out[6], out[7]]) & 0x3FF) as usize;
        assert_eq!(section_length, 23);

        let section = &out[5..5 + 3 + section_length];
        assert_eq!(
            crc32_mpeg2(&section[..section.len() - 4]).to_be_bytes(),
            section[section.len() - 4..]
        );

        // first loop entry: H.264 on PID 0x100
        assert_eq!(&section[12..17], &[0x1B, 0xE1, 0x00, 0xF0, 0x00]);
        assert_eq!(&section[17..22], &[0x0F, 0xE1, 0x01, 0xF0, 0x00]);
    }

    #[test]
    fn test_continuity_counters() {
        let mut out = Vec::new();
        let mut muxer = TsMuxer::new(&mut out);
        muxer.write_payload(0x100, None, &vec![0u8; 400]).unwrap();
        muxer.write_payload(0x100, None, &vec![0u8; 10]).unwrap();

        assert_eq!(out.len(), 4 * PACKET_LEN);
        let counters: Vec<u8> = out
            .chunks(PACKET_LEN)
            .map(|packet| packet[3] & 0x0F)
            .collect();
        assert_eq!(counters, vec![0, 1, 2, 3]);

        // PUSI only on the first packet of each payload
        assert_eq!(out[1] & 0x40, 0x40);
        assert_eq!(out[PACKET_LEN + 1] & 0x40, 0x00);
        assert_eq!(out[3 * PACKET_LEN + 1] & 0x40, 0x40);
    }

    #[test]
    fn test_stuffing_tail() {
        let mut out = Vec::new();
        TsMuxer::new(&mut out)
            .write_payload(0x100, None, &[0xAAu8; 10])
            .unwrap();

        assert_eq!(out.len(), PACKET_LEN);
        assert_eq!(out[3] & 0x30, 0x30); // adaptation + payload
        assert_eq!(out[4], 173); // 183 - 10
        assert_eq!(out[5], 0x00); // no flags, stuffing only
        assert_eq!(out[6], 0xFF);
        assert_eq!(&out[178..], &[0xAA; 10]);
    }

    #[test]
    fn test_pes_timestamp_packing() {
        let mut pes = Vec::new();
        write_timestamp(&mut pes, 0x20, 0);
        assert_eq!(pes, vec![0x21, 0x00, 0x01, 0x00, 0x01]);

        pes.clear();
        // all ones: every payload bit set, markers intact
        write_timestamp(&mut pes, 0x30, 0x1_FFFF_FFFF);
        assert_eq!(pes, vec![0x3F, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    fn packet_payload(packet: &[u8]) -> &[u8] {
        if packet[3] & 0x20 != 0 {
            &packet[5 + packet[4] as usize..]
        } else {
            &packet[4..]
        }
    }

    #[test]
    fn test_pes_header_flags() {
        let mut out = Vec::new();
        let mut muxer = TsMuxer::new(&mut out);
        muxer
            .write_pes(0x100, StreamId::Video, 3000, 3000, None, &[1, 2, 3])
            .unwrap();

        let header = packet_payload(&out);
        assert_eq!(&header[..4], &[0x00, 0x00, 0x01, 0xE0]);
        assert_eq!(u16::from_be_bytes([header[4], header[5]]), 3 + 5 + 3);
        assert_eq!(header[7], 0x80); // PTS only
        assert_eq!(header[8], 5);

        out.clear();
        let mut muxer = TsMuxer::new(&mut out);
        muxer
            .write_pes(0x100, StreamId::Video, 6000, 3000, None, &[1, 2, 3])
            .unwrap();

        let header = packet_payload(&out);
        assert_eq!(header[7], 0xC0); // PTS + DTS
        assert_eq!(header[8], 10);
    }

    #[test]
    fn test_pcr_spacing() {
        let mut out = Vec::new();
        let mut muxer = TsMuxer::new(&mut out);

        // 90 kHz deltas of 3000: the 9000-tick interval must be exceeded,
        // so the access unit landing exactly on it still goes without
        for i in 0..5u64 {
            let dts = i * 3000;
            muxer
                .write_pes(0x100, StreamId::Video, dts, dts, Some(dts * 300), &[0u8; 8])
                .unwrap();
        }

        let with_pcr: Vec<bool> = out
            .chunks(PACKET_LEN)
            .map(|p| p[3] & 0x20 != 0 && p[4] > 0 && p[5] & 0x10 != 0)
            .collect();
        assert_eq!(with_pcr, vec![true, false, false, false, true]);
    }

    #[test]
    fn test_pcr_encoding() {
        let mut buf = [0u8; 6];
        // base 2, ext 299
        write_pcr(&mut buf, 2 * 300 + 299);
        assert_eq!(buf[3], 0x01);
        assert_eq!(buf[4], 0x7F);
        assert_eq!(buf[5], 0x2B);
    }

    #[test]
    fn test_oversized_pes_length_zero() {
        let mut out = Vec::new();
        let mut muxer = TsMuxer::new(&mut out);
        muxer
            .write_pes(0x100, StreamId::Video, 0, 0, None, &vec![0u8; 0x1_0000])
            .unwrap();

        let header = &out[4..];
        assert_eq!(u16::from_be_bytes([header[4], header[5]]), 0);
    }
}
