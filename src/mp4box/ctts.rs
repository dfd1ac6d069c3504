use serde::Serialize;
use std::mem::size_of;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CttsBox {
    pub version: u8,
    pub flags: u32,

    #[serde(skip_serializing)]
    pub entries: Vec<CttsEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CttsEntry {
    pub sample_count: u32,
    /// Unsigned in version 0, signed in version 1.
    pub sample_offset: i64,
}

impl Mp4Box for CttsBox {
    const TYPE: BoxType = BoxType::CttsBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("entries={}", self.entries.len());
        Ok(s)
    }
}

impl BlockReader for CttsBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        if version > 1 {
            return Err(Error::UnsupportedBoxVersion(BoxType::CttsBox, version));
        }

        let entry_size = size_of::<u32>() + size_of::<u32>(); // sample_count + sample_offset
        let entry_count = reader.get_u32();

        if entry_count as usize > reader.remaining() / entry_size {
            return Err(Error::InvalidData(
                "ctts entry_count indicates more entries than could fit in the box",
            ));
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            let sample_count = reader.get_u32();
            let sample_offset = if version == 1 {
                reader.get_i32() as i64
            } else {
                reader.get_u32() as i64
            };

            entries.push(CttsEntry {
                sample_count,
                sample_offset,
            });
        }

        Ok(CttsBox {
            version,
            flags,
            entries,
        })
    }

    fn size_hint() -> usize {
        8
    }
}
