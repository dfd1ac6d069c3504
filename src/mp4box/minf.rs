use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MinfBox {
    pub stbl: Option<StblBox>,
    pub others: Vec<RawBox>,
}

impl Mp4Box for MinfBox {
    const TYPE: BoxType = BoxType::MinfBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        Ok(String::new())
    }
}

impl BlockReader for MinfBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let mut minf = MinfBox::default();

        while let Some(mut bx) = reader.get_box()? {
            match bx.kind() {
                BoxType::StblBox => minf.stbl = bx.read_or_raw(&mut minf.others),
                _ => minf.others.push(bx.raw()),
            }
        }

        Ok(minf)
    }

    fn size_hint() -> usize {
        0
    }
}
