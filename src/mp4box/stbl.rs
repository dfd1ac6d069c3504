use serde::Serialize;

use crate::mp4box::*;

/// Sample table. Every child is optional so one broken table degrades the
/// track instead of aborting the whole parse.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StblBox {
    pub stsd: Option<StsdBox>,
    pub stts: Option<SttsBox>,
    pub ctts: Option<CttsBox>,
    pub stss: Option<StssBox>,
    pub stsc: Option<StscBox>,
    pub stsz: Option<StszBox>,
    pub stco: Option<StcoBox>,
    pub co64: Option<Co64Box>,
    pub cslg: Option<CslgBox>,
    pub others: Vec<RawBox>,
}

impl StblBox {
    pub fn chunk_count(&self) -> usize {
        if let Some(stco) = &self.stco {
            stco.entries.len()
        } else if let Some(co64) = &self.co64 {
            co64.entries.len()
        } else {
            0
        }
    }

    pub fn chunk_offset(&self, index: usize) -> Option<u64> {
        if let Some(stco) = &self.stco {
            stco.entries.get(index).map(|&v| v as u64)
        } else {
            self.co64.as_ref()?.entries.get(index).copied()
        }
    }
}

impl Mp4Box for StblBox {
    const TYPE: BoxType = BoxType::StblBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!("chunks={}", self.chunk_count());
        Ok(s)
    }
}

impl BlockReader for StblBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let mut stbl = StblBox::default();

        while let Some(mut bx) = reader.get_box()? {
            match bx.kind() {
                BoxType::StsdBox => stbl.stsd = bx.read_or_raw(&mut stbl.others),
                BoxType::SttsBox => stbl.stts = bx.read_or_raw(&mut stbl.others),
                BoxType::CttsBox => stbl.ctts = bx.read_or_raw(&mut stbl.others),
                BoxType::StssBox => stbl.stss = bx.read_or_raw(&mut stbl.others),
                BoxType::StscBox => stbl.stsc = bx.read_or_raw(&mut stbl.others),
                BoxType::StszBox => stbl.stsz = bx.read_or_raw(&mut stbl.others),
                BoxType::Stz2Box => {
                    stbl.stsz = bx.read_or_raw::<Stz2Box>(&mut stbl.others).map(Into::into)
                }
                BoxType::StcoBox => stbl.stco = bx.read_or_raw(&mut stbl.others),
                BoxType::Co64Box => stbl.co64 = bx.read_or_raw(&mut stbl.others),
                BoxType::CslgBox => stbl.cslg = bx.read_or_raw(&mut stbl.others),
                _ => stbl.others.push(bx.raw()),
            }
        }

        Ok(stbl)
    }

    fn size_hint() -> usize {
        0
    }
}
