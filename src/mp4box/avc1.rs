use serde::Serialize;

use crate::mp4box::*;

/// `avc1` visual sample entry carrying the H.264 decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VisualSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub frame_count: u16,
    pub depth: u16,
    pub avcc: AvcConfig,
}

/// AVCDecoderConfigurationRecord (`avcC`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AvcConfig {
    pub configuration_version: u8,
    pub profile_indication: u8,
    pub profile_compatibility: u8,
    pub level_indication: u8,
    /// NAL length prefixes in samples are `length_size_minus_one + 1`
    /// bytes wide.
    pub length_size_minus_one: u8,

    #[serde(skip_serializing)]
    pub sequence_parameter_sets: Vec<Vec<u8>>,
    #[serde(skip_serializing)]
    pub picture_parameter_sets: Vec<Vec<u8>>,
}

impl Mp4Box for VisualSampleEntry {
    const TYPE: BoxType = BoxType::Avc1Box;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "width={} height={} profile={} level={}",
            self.width,
            self.height,
            self.avcc.profile_indication,
            self.avcc.level_indication
        );
        Ok(s)
    }
}

impl BlockReader for VisualSampleEntry {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        reader.skip(6); // reserved
        let data_reference_index = reader.get_u16();

        reader.skip(16); // pre_defined + reserved
        let width = reader.get_u16();
        let height = reader.get_u16();
        reader.skip(12); // resolution + reserved
        let frame_count = reader.get_u16();
        reader.skip(32); // compressorname
        let depth = reader.try_get_u16()?;
        reader.try_get_u16()?; // pre_defined

        let avcc = reader.find_box::<AvcConfig>()?;

        Ok(VisualSampleEntry {
            data_reference_index,
            width,
            height,
            frame_count,
            depth,
            avcc,
        })
    }

    fn size_hint() -> usize {
        78
    }
}

impl Mp4Box for AvcConfig {
    const TYPE: BoxType = BoxType::AvcCBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "profile={} level={} sps={} pps={}",
            self.profile_indication,
            self.level_indication,
            self.sequence_parameter_sets.len(),
            self.picture_parameter_sets.len()
        );
        Ok(s)
    }
}

impl BlockReader for AvcConfig {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let configuration_version = reader.get_u8();
        let profile_indication = reader.get_u8();
        let profile_compatibility = reader.get_u8();
        let level_indication = reader.get_u8();
        let length_size_minus_one = reader.get_u8() & 0x03;

        let sps_count = reader.try_get_u8()? & 0x1F;
        let mut sequence_parameter_sets = Vec::with_capacity(sps_count as usize);
        for _ in 0..sps_count {
            let len = reader.try_get_u16()? as usize;
            sequence_parameter_sets.push(reader.collect(len)?);
        }

        let pps_count = reader.try_get_u8()?;
        let mut picture_parameter_sets = Vec::with_capacity(pps_count as usize);
        for _ in 0..pps_count {
            let len = reader.try_get_u16()? as usize;
            picture_parameter_sets.push(reader.collect(len)?);
        }

        Ok(AvcConfig {
            configuration_version,
            profile_indication,
            profile_compatibility,
            level_indication,
            length_size_minus_one,
            sequence_parameter_sets,
            picture_parameter_sets,
        })
    }

    fn size_hint() -> usize {
        7
    }
}
