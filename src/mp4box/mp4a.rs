use serde::Serialize;

use crate::mp4box::*;

/// `mp4a` audio sample entry carrying the AAC decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct AudioSampleEntry {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    /// Integer part of the 16.16 sample rate field.
    pub sample_rate: u32,
    pub esds: Option<EsdsBox>,
}

impl AudioSampleEntry {
    pub fn audio_config(&self) -> Option<&AudioSpecificConfig> {
        self.esds.as_ref()?.audio_config.as_ref()
    }
}

impl Mp4Box for AudioSampleEntry {
    const TYPE: BoxType = BoxType::Mp4aBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "channel_count={} sample_size={} sample_rate={}",
            self.channel_count, self.sample_size, self.sample_rate
        );
        Ok(s)
    }
}

impl BlockReader for AudioSampleEntry {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        reader.skip(6); // reserved
        let data_reference_index = reader.get_u16();

        reader.skip(8); // reserved
        let channel_count = reader.get_u16();
        let sample_size = reader.get_u16();
        reader.skip(4); // pre_defined + reserved
        let sample_rate = reader.get_u32() >> 16;

        let esds = reader.try_find_box::<EsdsBox>()?;
        if esds.is_none() {
            log::warn!("mp4a sample entry without esds");
        }

        Ok(AudioSampleEntry {
            data_reference_index,
            channel_count,
            sample_size,
            sample_rate,
            esds,
        })
    }

    fn size_hint() -> usize {
        28
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mp4a_entry_without_esds() {
        let mut buf = vec![0u8; 6];
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.extend_from_slice(&16u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&(44100u32 << 16).to_be_bytes());

        let entry = AudioSampleEntry::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(entry.channel_count, 2);
        assert_eq!(entry.sample_rate, 44100);
        assert!(entry.esds.is_none());
    }
}
