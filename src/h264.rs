//! H.264 length-prefixed to Annex-B repacketizing.

use crate::es::Repacketize;
use crate::mp4box::AvcConfig;
use crate::track::Sample;
use crate::{Error, Result};

const START_CODE: [u8; 4] = [0, 0, 0, 1];
const NAL_AUD: u8 = 9;

/// Rewrites length-prefixed AVC samples as Annex-B access units: an access
/// unit delimiter, parameter sets when the decoder needs them, then every
/// NAL behind a start code.
pub struct AnnexBWriter {
    /// One decoder configuration per `stsd` entry.
    configs: Vec<AvcConfig>,
}

impl AnnexBWriter {
    pub fn new(configs: Vec<AvcConfig>) -> Self {
        Self { configs }
    }

    fn config_for(&self, sample: &Sample) -> Result<&AvcConfig> {
        self.configs
            .get(sample.description_index)
            .ok_or(Error::InvalidData("sample description index out of range"))
    }
}

impl Repacketize for AnnexBWriter {
    fn write_sample(
        &self,
        sample: &Sample,
        prev: Option<&Sample>,
        payload: &[u8],
        out: &mut Vec<u8>,
    ) -> Result<()> {
        let config = self.config_for(sample)?;
        let length_size = config.length_size_minus_one as usize + 1;

        // Parameter sets go out at the start of a stream, whenever the
        // description changes, and again ahead of every sync sample.
        let emit_params = sample.is_sync
            || prev.map_or(true, |p| p.description_index != sample.description_index);

        // Access unit delimiter: primary_pic_type 0 promises an I slice,
        // 1 allows I and P. The low bits are the RBSP stop bit.
        out.extend_from_slice(&START_CODE);
        out.push(NAL_AUD);
        out.push(if emit_params { 0b000_10000 } else { 0b001_10000 });

        if emit_params {
            for sps in config.sequence_parameter_sets.iter() {
                out.extend_from_slice(&START_CODE);
                out.extend_from_slice(sps);
            }
            for pps in config.picture_parameter_sets.iter() {
                out.extend_from_slice(&START_CODE);
                out.extend_from_slice(pps);
            }
        }

        let mut rest = payload;
        while !rest.is_empty() {
            if rest.len() < length_size {
                return Err(Error::InvalidData("truncated NAL length prefix"));
            }

            let mut nal_size = 0usize;
            for &b in &rest[..length_size] {
                nal_size = (nal_size << 8) | b as usize;
            }
            rest = &rest[length_size..];

            if nal_size == 0 || rest.len() < nal_size {
                return Err(Error::InvalidData("NAL length exceeds the sample"));
            }

            // A delimiter inside the sample means the source already is
            // Annex-B, or the length prefixes are lying.
            if rest[0] & 0x1F == NAL_AUD {
                return Err(Error::UnexpectedAccessUnitDelimiter);
            }

            out.extend_from_slice(&START_CODE);
            out.extend_from_slice(&rest[..nal_size]);
            rest = &rest[nal_size..];
        }

        Ok(())
    }
}
