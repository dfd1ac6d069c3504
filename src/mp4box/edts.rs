use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EdtsBox {
    pub elst: Option<ElstBox>,
    pub others: Vec<RawBox>,
}

impl Mp4Box for EdtsBox {
    const TYPE: BoxType = BoxType::EdtsBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        Ok(String::new())
    }
}

impl BlockReader for EdtsBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let mut edts = EdtsBox::default();

        while let Some(mut bx) = reader.get_box()? {
            match bx.kind() {
                BoxType::ElstBox => edts.elst = bx.read_or_raw(&mut edts.others),
                _ => edts.others.push(bx.raw()),
            }
        }

        Ok(edts)
    }

    fn size_hint() -> usize {
        0
    }
}
