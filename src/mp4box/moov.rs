use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MoovBox {
    pub mvhd: Option<MvhdBox>,
    pub traks: Vec<TrakBox>,
    pub others: Vec<RawBox>,
}

impl Mp4Box for MoovBox {
    const TYPE: BoxType = BoxType::MoovBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("traks={}", self.traks.len());
        Ok(s)
    }
}

impl BlockReader for MoovBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let mut moov = MoovBox::default();

        while let Some(mut bx) = reader.get_box()? {
            match bx.kind() {
                BoxType::MvhdBox => moov.mvhd = bx.read_or_raw(&mut moov.others),
                BoxType::TrakBox => {
                    if let Some(trak) = bx.read_or_raw(&mut moov.others) {
                        moov.traks.push(trak);
                    }
                }
                _ => moov.others.push(bx.raw()),
            }
        }

        Ok(moov)
    }

    fn size_hint() -> usize {
        0
    }
}
