use serde::Serialize;
use std::char::{decode_utf16, REPLACEMENT_CHARACTER};

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MdhdBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
}

impl Default for MdhdBox {
    fn default() -> Self {
        MdhdBox {
            version: 0,
            flags: 0,
            creation_time: 0,
            modification_time: 0,
            timescale: 1000,
            duration: 0,
            language: String::from("und"),
        }
    }
}

impl Mp4Box for MdhdBox {
    const TYPE: BoxType = BoxType::MdhdBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "timescale={} duration={} language={}",
            self.timescale, self.duration, self.language
        );
        Ok(s)
    }
}

impl BlockReader for MdhdBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let (creation_time, modification_time, timescale, duration) = match version {
            1 => (
                reader.get_u64(),
                reader.get_u64(),
                reader.try_get_u32()?,
                reader.try_get_u64()?,
            ),
            0 => (
                reader.get_u32() as u64,
                reader.get_u32() as u64,
                reader.get_u32(),
                reader.get_u32() as u64,
            ),
            v => return Err(Error::UnsupportedBoxVersion(BoxType::MdhdBox, v)),
        };

        if timescale == 0 {
            return Err(Error::InvalidData("mdhd timescale is zero"));
        }

        let language_code = reader.try_get_u16()?;
        let language = language_string(language_code);

        Ok(MdhdBox {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            language,
        })
    }

    fn size_hint() -> usize {
        22
    }
}

fn language_string(language: u16) -> String {
    let mut lang: [u16; 3] = [0; 3];

    lang[0] = ((language >> 10) & 0x1F) + 0x60;
    lang[1] = ((language >> 5) & 0x1F) + 0x60;
    lang[2] = ((language) & 0x1F) + 0x60;

    // Decode utf-16 encoded bytes into a string.
    decode_utf16(lang.iter().cloned())
        .map(|r| r.unwrap_or(REPLACEMENT_CHARACTER))
        .collect::<String>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mdhd_v0(timescale: u32, duration: u32, language: u16) -> Vec<u8> {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&100u32.to_be_bytes());
        buf.extend_from_slice(&200u32.to_be_bytes());
        buf.extend_from_slice(&timescale.to_be_bytes());
        buf.extend_from_slice(&duration.to_be_bytes());
        buf.extend_from_slice(&language.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes()); // pre-defined
        buf
    }

    #[test]
    fn test_mdhd32() {
        // "eng" packs as ((e-0x60)<<10)|((n-0x60)<<5)|(g-0x60)
        let buf = mdhd_v0(48000, 30439936, 0x15C7);
        let dst_box = MdhdBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.timescale, 48000);
        assert_eq!(dst_box.duration, 30439936);
        assert_eq!(dst_box.language, "eng");
    }

    #[test]
    fn test_mdhd_zero_timescale() {
        let buf = mdhd_v0(0, 100, 0);
        let error = MdhdBox::read_block(&mut buf.as_slice());
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }
}
