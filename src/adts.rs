//! AAC raw frame to ADTS repacketizing.

use crate::es::Repacketize;
use crate::mp4box::{AudioSpecificConfig, SAMPLE_FREQUENCIES};
use crate::track::Sample;
use crate::{Error, Result};

pub const HEADER_LEN: usize = 7;

/// 13-bit frame_length field, header included.
const MAX_FRAME_LEN: usize = 0x1FFF;

/// Prepends a 7-byte ADTS header (MPEG-4, no CRC) to each raw AAC frame.
pub struct AdtsWriter {
    /// One decoder configuration per `stsd` entry.
    configs: Vec<AudioSpecificConfig>,
}

impl AdtsWriter {
    pub fn new(configs: Vec<AudioSpecificConfig>) -> Self {
        Self { configs }
    }

    fn config_for(&self, sample: &Sample) -> Result<&AudioSpecificConfig> {
        self.configs
            .get(sample.description_index)
            .ok_or(Error::InvalidData("sample description index out of range"))
    }
}

/// The header wants the 4-bit table index. Prefer the exact frequency when
/// it is addressable, fall back to the index the configuration declared.
fn frequency_index(config: &AudioSpecificConfig) -> u8 {
    SAMPLE_FREQUENCIES
        .iter()
        .position(|&f| f == config.frequency)
        .map(|i| i as u8)
        .unwrap_or(config.frequency_index & 0x0F)
}

impl Repacketize for AdtsWriter {
    fn write_sample(
        &self,
        sample: &Sample,
        _prev: Option<&Sample>,
        payload: &[u8],
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let config = self.config_for(sample)?;

        let frame_len = payload.len() + HEADER_LEN;
        if frame_len > MAX_FRAME_LEN {
            return Err(Error::InvalidData("AAC frame too large for ADTS"));
        }

        // profile counts from zero, the object type from one
        let profile = config.object_type.saturating_sub(1) & 0x03;
        let freq = frequency_index(config);
        let channels = config.channel_config & 0x07;

        out.push(0xFF);
        out.push(0xF1); // MPEG-4, layer 0, no CRC
        out.push(profile << 6 | freq << 2 | channels >> 2);
        out.push((channels & 0x03) << 6 | (frame_len >> 11) as u8);
        out.push((frame_len >> 3) as u8);
        // buffer fullness is pinned at 0x7FF, variable bitrate
        out.push(((frame_len & 0x07) << 5) as u8 | 0x1F);
        out.push(0xFC);

        out.extend_from_slice(payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lc_44k_stereo() -> AudioSpecificConfig {
        AudioSpecificConfig {
            object_type: 2,
            frequency_index: 4,
            frequency: 44100,
            channel_config: 2,
        }
    }

    #[test]
    fn test_header_bytes() {
        let writer = AdtsWriter::new(vec![lc_44k_stereo()]);
        let mut out = Vec::new();
        writer
            .write_sample(&Sample::default(), None, &[0u8; 100], &mut out)
            .unwrap();

        assert_eq!(out.len(), 107);
        assert_eq!(&out[..7], &[0xFF, 0xF1, 0x50, 0x80, 0x0D, 0x7F, 0xFC]);
    }

    #[test]
    fn test_explicit_frequency_maps_back_to_index() {
        let config = AudioSpecificConfig {
            object_type: 2,
            frequency_index: 0x0F,
            frequency: 48000,
            channel_config: 2,
        };

        assert_eq!(frequency_index(&config), 3);
    }

    #[test]
    fn test_unlisted_frequency_keeps_declared_index() {
        let config = AudioSpecificConfig {
            object_type: 2,
            frequency_index: 0x0F,
            frequency: 12345,
            channel_config: 2,
        };

        assert_eq!(frequency_index(&config), 0x0F);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let writer = AdtsWriter::new(vec![lc_44k_stereo()]);
        let mut out = Vec::new();
        let error =
            writer.write_sample(&Sample::default(), None, &[0u8; MAX_FRAME_LEN], &mut out);
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_frames_concatenate() {
        let writer = AdtsWriter::new(vec![lc_44k_stereo()]);
        let mut out = Vec::new();
        writer
            .write_sample(&Sample::default(), None, &[1u8; 10], &mut out)
            .unwrap();
        let prev = Sample::default();
        writer
            .write_sample(&Sample::default(), Some(&prev), &[2u8; 10], &mut out)
            .unwrap();

        assert_eq!(out.len(), 34);
        assert_eq!(out[17], 0xFF);
        assert_eq!(out[18], 0xF1);
    }
}
