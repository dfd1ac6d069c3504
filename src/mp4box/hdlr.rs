use serde::Serialize;

use crate::mp4box::*;

pub const HANDLER_VIDEO: FourCC = FourCC::new(b"vide");
pub const HANDLER_AUDIO: FourCC = FourCC::new(b"soun");

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HdlrBox {
    pub version: u8,
    pub flags: u32,
    pub handler_type: FourCC,
    pub name: String,
}

impl Mp4Box for HdlrBox {
    const TYPE: BoxType = BoxType::HdlrBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("handler_type={} name={}", self.handler_type, self.name);
        Ok(s)
    }
}

impl BlockReader for HdlrBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        reader.get_u32(); // pre-defined
        let handler = reader.get_u32();
        reader.skip(12); // reserved

        let name = reader.get_null_terminated_string();

        Ok(HdlrBox {
            version,
            flags,
            handler_type: From::from(handler),
            name,
        })
    }

    fn size_hint() -> usize {
        24
    }
}
