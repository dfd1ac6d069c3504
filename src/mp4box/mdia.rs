use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MdiaBox {
    pub mdhd: Option<MdhdBox>,
    pub hdlr: Option<HdlrBox>,
    pub minf: Option<MinfBox>,
    pub others: Vec<RawBox>,
}

impl Mp4Box for MdiaBox {
    const TYPE: BoxType = BoxType::MdiaBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        Ok(String::new())
    }
}

impl BlockReader for MdiaBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let mut mdia = MdiaBox::default();

        while let Some(mut bx) = reader.get_box()? {
            match bx.kind() {
                BoxType::MdhdBox => mdia.mdhd = bx.read_or_raw(&mut mdia.others),
                BoxType::HdlrBox => mdia.hdlr = bx.read_or_raw(&mut mdia.others),
                BoxType::MinfBox => mdia.minf = bx.read_or_raw(&mut mdia.others),
                _ => mdia.others.push(bx.raw()),
            }
        }

        Ok(mdia)
    }

    fn size_hint() -> usize {
        0
    }
}
