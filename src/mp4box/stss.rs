use serde::Serialize;
use std::mem::size_of;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StssBox {
    pub version: u8,
    pub flags: u32,

    /// 1-based sample numbers of the sync samples, in file order.
    #[serde(skip_serializing)]
    pub entries: Vec<u32>,
}

impl Mp4Box for StssBox {
    const TYPE: BoxType = BoxType::StssBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("entries={}", self.entries.len());
        Ok(s)
    }
}

impl BlockReader for StssBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let entry_count = reader.get_u32();

        if entry_count as usize > reader.remaining() / size_of::<u32>() {
            return Err(Error::InvalidData(
                "stss entry_count indicates more entries than could fit in the box",
            ));
        }

        let mut entries = Vec::with_capacity(entry_count as usize);
        for _ in 0..entry_count {
            entries.push(reader.get_u32());
        }

        Ok(StssBox {
            version,
            flags,
            entries,
        })
    }

    fn size_hint() -> usize {
        8
    }
}
