use serde::Serialize;
use std::mem::size_of;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StszBox {
    pub version: u8,
    pub flags: u32,

    /// Non-zero when every sample has the same size, `sample_sizes` is
    /// then empty.
    pub sample_size: u32,
    pub sample_count: u32,

    #[serde(skip_serializing)]
    pub sample_sizes: Vec<u32>,
}

impl StszBox {
    pub fn size_for(&self, index: usize) -> Option<u32> {
        if self.sample_size > 0 {
            (index < self.sample_count as usize).then_some(self.sample_size)
        } else {
            self.sample_sizes.get(index).copied()
        }
    }
}

impl Mp4Box for StszBox {
    const TYPE: BoxType = BoxType::StszBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "sample_size={} sample_count={}",
            self.sample_size, self.sample_count
        );
        Ok(s)
    }
}

impl BlockReader for StszBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let sample_size = reader.get_u32();
        let sample_count = reader.get_u32();

        let mut sample_sizes = Vec::new();
        if sample_size == 0 {
            if sample_count as usize > reader.remaining() / size_of::<u32>() {
                return Err(Error::InvalidData(
                    "stsz sample_count indicates more entries than could fit in the box",
                ));
            }

            sample_sizes.reserve(sample_count as usize);
            for _ in 0..sample_count {
                sample_sizes.push(reader.get_u32());
            }
        }

        Ok(StszBox {
            version,
            flags,
            sample_size,
            sample_count,
            sample_sizes,
        })
    }

    fn size_hint() -> usize {
        12
    }
}

/// Compact sample size table. Decoded into the same shape as `stsz` so the
/// indexer only deals with one representation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Stz2Box {
    pub version: u8,
    pub flags: u32,
    pub field_size: u8,
    pub sample_count: u32,

    #[serde(skip_serializing)]
    pub sample_sizes: Vec<u32>,
}

impl From<Stz2Box> for StszBox {
    fn from(compact: Stz2Box) -> Self {
        StszBox {
            version: compact.version,
            flags: compact.flags,
            sample_size: 0,
            sample_count: compact.sample_count,
            sample_sizes: compact.sample_sizes,
        }
    }
}

impl Mp4Box for Stz2Box {
    const TYPE: BoxType = BoxType::Stz2Box;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "field_size={} sample_count={}",
            self.field_size, self.sample_count
        );
        Ok(s)
    }
}

impl BlockReader for Stz2Box {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        reader.skip(3); // reserved
        let field_size = reader.get_u8();
        let sample_count = reader.get_u32();

        let needed = match field_size {
            4 => (sample_count as usize).div_ceil(2),
            8 => sample_count as usize,
            16 => sample_count as usize * 2,
            _ => return Err(Error::InvalidData("stz2 field_size must be 4, 8 or 16")),
        };

        if needed > reader.remaining() {
            return Err(Error::InvalidData(
                "stz2 sample_count indicates more entries than could fit in the box",
            ));
        }

        let mut sample_sizes = Vec::with_capacity(sample_count as usize);
        match field_size {
            4 => {
                // Two sizes per byte, high nibble first.
                let mut left = sample_count;
                while left >= 2 {
                    let b = reader.get_u8();
                    sample_sizes.push((b >> 4) as u32);
                    sample_sizes.push((b & 0x0F) as u32);
                    left -= 2;
                }
                if left == 1 {
                    sample_sizes.push((reader.get_u8() >> 4) as u32);
                }
            }
            8 => {
                for _ in 0..sample_count {
                    sample_sizes.push(reader.get_u8() as u32);
                }
            }
            _ => {
                for _ in 0..sample_count {
                    sample_sizes.push(reader.get_u16() as u32);
                }
            }
        }

        Ok(Stz2Box {
            version,
            flags,
            field_size,
            sample_count,
            sample_sizes,
        })
    }

    fn size_hint() -> usize {
        12
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stsz_uniform() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&1200u32.to_be_bytes());
        buf.extend_from_slice(&50u32.to_be_bytes());

        let dst_box = StszBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.sample_size, 1200);
        assert!(dst_box.sample_sizes.is_empty());
        assert_eq!(dst_box.size_for(49), Some(1200));
        assert_eq!(dst_box.size_for(50), None);
    }

    #[test]
    fn test_stsz_per_sample() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        for v in [100u32, 200, 300] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let dst_box = StszBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.size_for(1), Some(200));
    }

    #[test]
    fn test_stz2_nibbles() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&[0, 0, 0, 4]); // reserved + field_size
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.push(0x5A);
        buf.push(0x70);

        let dst_box = Stz2Box::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.sample_sizes, vec![5, 10, 7]);

        let stsz: StszBox = dst_box.into();
        assert_eq!(stsz.sample_size, 0);
        assert_eq!(stsz.size_for(2), Some(7));
    }
}
