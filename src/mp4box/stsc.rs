use serde::Serialize;
use std::mem::size_of;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StscBox {
    pub version: u8,
    pub flags: u32,

    #[serde(skip_serializing)]
    pub entries: Vec<StscEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StscEntry {
    /// 1-based index of the first chunk this run applies to. The run
    /// extends until the next entry's first chunk, the last entry runs to
    /// the end of the chunk list.
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    /// 1-based stsd entry index.
    pub sample_description_index: u32,
}

impl Mp4Box for StscBox {
    const TYPE: BoxType = BoxType::StscBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("entries={}", self.entries.len());
        Ok(s)
    }
}

impl BlockReader for StscBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let entry_size = size_of::<u32>() * 3;
        let entry_count = reader.get_u32();

        if entry_count as usize > reader.remaining() / entry_size {
            return Err(Error::InvalidData(
                "stsc entry_count indicates more entries than could fit in the box",
            ));
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(StscEntry {
                first_chunk: reader.get_u32(),
                samples_per_chunk: reader.get_u32(),
                sample_description_index: reader.get_u32(),
            });
        }

        Ok(StscBox {
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
    fn test_stsc() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&2u32.to_be_bytes());
        for v in [1u32, 30, 1, 4, 15, 1] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let dst_box = StscBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.entries.len(), 2);
        assert_eq!(dst_box.entries[1].first_chunk, 4);
        assert_eq!(dst_box.entries[1].samples_per_chunk, 15);
    }
}
