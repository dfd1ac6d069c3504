use serde::Serialize;
use std::mem::size_of;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ElstBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<ElstEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ElstEntry {
    pub segment_duration: u64,
    /// -1 marks an empty edit.
    pub media_time: i64,
    pub media_rate: u16,
    pub media_rate_fraction: u16,
}

impl Mp4Box for ElstBox {
    const TYPE: BoxType = BoxType::ElstBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("elst_entries={}", self.entries.len());
        Ok(s)
    }
}

impl BlockReader for ElstBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let entry_count = reader.get_u32();
        let entry_size = match version {
            1 => size_of::<u64>() + size_of::<i64>() + 4,
            0 => size_of::<u32>() + size_of::<i32>() + 4,
            v => return Err(Error::UnsupportedBoxVersion(BoxType::ElstBox, v)),
        };

        if entry_count as usize > reader.remaining() / entry_size {
            return Err(Error::InvalidData(
                "elst entry_count indicates more entries than could fit in the box",
            ));
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let (segment_duration, media_time) = if version == 1 {
                (reader.get_u64(), reader.get_i64())
            } else {
                (reader.get_u32() as u64, reader.get_i32() as i64)
            };

            entries.push(ElstEntry {
                segment_duration,
                media_time,
                media_rate: reader.get_u16(),
                media_rate_fraction: reader.get_u16(),
            });
        }

        Ok(ElstBox {
            version,
            flags,
            entries,
        })
    }

    fn size_hint() -> usize {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elst32() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&1u32.to_be_bytes());
        buf.extend_from_slice(&12000u32.to_be_bytes());
        buf.extend_from_slice(&(-1i32).to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());

        let dst_box = ElstBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.entries.len(), 1);
        assert_eq!(dst_box.entries[0].segment_duration, 12000);
        assert_eq!(dst_box.entries[0].media_time, -1);
    }

    #[test]
    fn test_elst_overflowing_count() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&u32::MAX.to_be_bytes());
        let error = ElstBox::read_block(&mut buf.as_slice());
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }
}
