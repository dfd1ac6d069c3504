use serde::Serialize;

use crate::mp4box::*;

const ES_DESCR_TAG: u8 = 0x03;
const DECODER_CONFIG_TAG: u8 = 0x04;
const DEC_SPECIFIC_TAG: u8 = 0x05;

/// Sampling frequencies addressable by a 4-bit index, per ISO/IEC 14496-3.
pub const SAMPLE_FREQUENCIES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Elementary stream descriptor chain carried by `mp4a` sample entries:
/// ES_Descriptor -> DecoderConfigDescriptor -> DecSpecificInfo.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EsdsBox {
    pub version: u8,
    pub flags: u32,
    pub es_id: u16,
    pub object_type_indication: u8,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,

    #[serde(skip_serializing)]
    pub decoder_specific: Vec<u8>,
    pub audio_config: Option<AudioSpecificConfig>,
}

/// Decoded AudioSpecificConfig, enough to emit ADTS headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AudioSpecificConfig {
    /// Audio object type after resolving the SBR extension, 2 = AAC-LC.
    pub object_type: u8,
    /// 4-bit index into [`SAMPLE_FREQUENCIES`], 0x0F when the frequency
    /// is only available in explicit form.
    pub frequency_index: u8,
    pub frequency: u32,
    pub channel_config: u8,
}

impl Mp4Box for EsdsBox {
    const TYPE: BoxType = BoxType::EsdsBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "es_id={} object_type_indication={:#x}",
            self.es_id, self.object_type_indication
        );
        Ok(s)
    }
}

impl BlockReader for EsdsBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let mut esds = EsdsBox {
            version,
            flags,
            ..Default::default()
        };

        let (tag, size) = read_descriptor_header(reader)?;
        if tag != ES_DESCR_TAG {
            return Err(Error::InvalidData("esds does not start with ES_Descriptor"));
        }

        let mut es = reader.take(size.min(reader.remaining()))?;
        esds.es_id = es.try_get_u16()?;

        let stream_flags = es.try_get_u8()?;
        if stream_flags & 0x80 != 0 {
            es.try_get_u16()?; // dependsOn_ES_ID
        }
        if stream_flags & 0x40 != 0 {
            let url_len = es.try_get_u8()? as usize;
            if es.remaining() < url_len {
                return Err(Error::InvalidData("esds URL string is truncated"));
            }
            es.skip(url_len);
        }
        if stream_flags & 0x20 != 0 {
            es.try_get_u16()?; // OCR_ES_ID
        }

        let (tag, size) = read_descriptor_header(&mut es)?;
        if tag != DECODER_CONFIG_TAG {
            return Err(Error::InvalidData("esds lacks a DecoderConfigDescriptor"));
        }

        let mut config = es.take(size.min(es.remaining()))?;
        esds.object_type_indication = config.try_get_u8()?;
        config.try_get_u8()?; // streamType + upStream
        if config.remaining() < 11 {
            return Err(Error::InvalidData("DecoderConfigDescriptor is truncated"));
        }
        config.get_u24(); // bufferSizeDB
        esds.max_bitrate = config.get_u32();
        esds.avg_bitrate = config.get_u32();

        while config.remaining() > 1 {
            let (tag, size) = read_descriptor_header(&mut config)?;
            let mut body = config.take(size.min(config.remaining()))?;

            if tag == DEC_SPECIFIC_TAG {
                esds.decoder_specific = body.collect_remaining();
                break;
            }
        }

        if !esds.decoder_specific.is_empty() {
            match AudioSpecificConfig::parse(&esds.decoder_specific) {
                Ok(audio) => esds.audio_config = Some(audio),
                Err(err) => log::warn!("undecodable AudioSpecificConfig: {err}"),
            }
        }

        Ok(esds)
    }

    fn size_hint() -> usize {
        4
    }
}

/// Reads a descriptor tag plus its expandable length: up to four length
/// bytes, seven payload bits each, high bit flags continuation.
fn read_descriptor_header<'a>(reader: &mut impl Reader<'a>) -> Result<(u8, usize)> {
    let tag = reader.try_get_u8()?;

    let mut size = 0usize;
    for _ in 0..4 {
        let b = reader.try_get_u8()?;
        size = (size << 7) | (b & 0x7F) as usize;
        if b & 0x80 == 0 {
            return Ok((tag, size));
        }
    }

    Err(Error::InvalidData("descriptor length is longer than 4 bytes"))
}

impl AudioSpecificConfig {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut bits = BitReader::new(data);

        let mut object_type = read_object_type(&mut bits)?;
        let frequency_index = bits.read(4)? as u8;
        let mut frequency = explicit_or_indexed_frequency(&mut bits, frequency_index)?;
        let channel_config = bits.read(4)? as u8;

        // SBR: the extension carries the output rate, the core object
        // type and rate follow.
        if object_type == 5 {
            let ext_index = bits.read(4)? as u8;
            frequency = explicit_or_indexed_frequency(&mut bits, ext_index)?;
            object_type = read_object_type(&mut bits)?;
        }

        Ok(AudioSpecificConfig {
            object_type,
            frequency_index,
            frequency,
            channel_config,
        })
    }
}

fn read_object_type(bits: &mut BitReader<'_>) -> Result<u8> {
    let ty = bits.read(5)? as u8;
    if ty == 31 {
        Ok(32 + bits.read(6)? as u8)
    } else {
        Ok(ty)
    }
}

fn explicit_or_indexed_frequency(bits: &mut BitReader<'_>, index: u8) -> Result<u32> {
    if index == 0x0F {
        bits.read(24)
    } else {
        SAMPLE_FREQUENCIES
            .get(index as usize)
            .copied()
            .ok_or(Error::InvalidData("reserved sampling frequency index"))
    }
}

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read(&mut self, count: u32) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self
                .data
                .get(self.pos / 8)
                .ok_or(Error::InvalidData("bitstream exhausted"))?;
            let bit = (byte >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.pos += 1;
        }
        Ok(value)
    }
}
