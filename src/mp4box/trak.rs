use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TrakBox {
    pub tkhd: Option<TkhdBox>,
    pub edts: Option<EdtsBox>,
    pub mdia: Option<MdiaBox>,
    pub others: Vec<RawBox>,
}

impl TrakBox {
    pub fn track_id(&self) -> Option<u32> {
        self.tkhd.as_ref().map(|tkhd| tkhd.track_id)
    }

    pub fn handler_type(&self) -> Option<FourCC> {
        Some(self.mdia.as_ref()?.hdlr.as_ref()?.handler_type)
    }

    pub fn mdhd(&self) -> Option<&MdhdBox> {
        self.mdia.as_ref()?.mdhd.as_ref()
    }

    pub fn stbl(&self) -> Option<&StblBox> {
        self.mdia.as_ref()?.minf.as_ref()?.stbl.as_ref()
    }

    pub fn elst(&self) -> Option<&ElstBox> {
        self.edts.as_ref()?.elst.as_ref()
    }
}

impl Mp4Box for TrakBox {
    const TYPE: BoxType = BoxType::TrakBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = match (self.track_id(), self.handler_type()) {
            (Some(id), Some(handler)) => format!("track_id={id} handler={handler}"),
            _ => String::from("incomplete"),
        };
        Ok(s)
    }
}

impl BlockReader for TrakBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let mut trak = TrakBox::default();

        while let Some(mut bx) = reader.get_box()? {
            match bx.kind() {
                BoxType::TkhdBox => trak.tkhd = bx.read_or_raw(&mut trak.others),
                BoxType::EdtsBox => trak.edts = bx.read_or_raw(&mut trak.others),
                BoxType::MdiaBox => trak.mdia = bx.read_or_raw(&mut trak.others),
                _ => trak.others.push(bx.raw()),
            }
        }

        Ok(trak)
    }

    fn size_hint() -> usize {
        0
    }
}
