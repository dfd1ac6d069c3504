use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SampleEntry {
    Avc1(VisualSampleEntry),
    Mp4a(AudioSampleEntry),
    /// Codec the pipeline does not repacketize.
    Unsupported(RawBox),
}

impl SampleEntry {
    pub fn kind(&self) -> BoxType {
        match self {
            SampleEntry::Avc1(_) => BoxType::Avc1Box,
            SampleEntry::Mp4a(_) => BoxType::Mp4aBox,
            SampleEntry::Unsupported(raw) => raw.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StsdBox {
    pub version: u8,
    pub flags: u32,
    pub entries: Vec<SampleEntry>,
}

impl Mp4Box for StsdBox {
    const TYPE: BoxType = BoxType::StsdBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let mut kinds = Vec::new();
        for entry in self.entries.iter() {
            kinds.push(entry.kind().to_string());
        }
        let s = format!("entries={}", kinds.join("-"));
        Ok(s)
    }
}

impl BlockReader for StsdBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let entry_count = reader.get_u32();
        let mut entries = Vec::with_capacity((entry_count as usize).min(8));

        while let Some(mut bx) = reader.get_box()? {
            let entry = match bx.kind() {
                BoxType::Avc1Box => match bx.try_read::<VisualSampleEntry>() {
                    Ok(Some(avc1)) => SampleEntry::Avc1(avc1),
                    Ok(None) => continue,
                    Err(err) => {
                        log::warn!("undecodable avc1 sample entry: {err}");
                        SampleEntry::Unsupported(bx.raw())
                    }
                },
                BoxType::Mp4aBox => match bx.try_read::<AudioSampleEntry>() {
                    Ok(Some(mp4a)) => SampleEntry::Mp4a(mp4a),
                    Ok(None) => continue,
                    Err(err) => {
                        log::warn!("undecodable mp4a sample entry: {err}");
                        SampleEntry::Unsupported(bx.raw())
                    }
                },
                kind => {
                    log::debug!("unsupported sample entry {kind}");
                    SampleEntry::Unsupported(bx.raw())
                }
            };

            entries.push(entry);
        }

        if entries.len() != entry_count as usize {
            log::debug!(
                "stsd declares {} entries, decoded {}",
                entry_count,
                entries.len()
            );
        }

        Ok(StsdBox {
            version,
            flags,
            entries,
        })
    }

    fn size_hint() -> usize {
        8
    }
}
