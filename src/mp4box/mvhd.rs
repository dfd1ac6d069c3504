use serde::Serialize;

use crate::mp4box::*;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MvhdBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub rate: u32,
    pub volume: u16,
    pub next_track_id: u32,
}

impl Default for MvhdBox {
    fn default() -> Self {
        MvhdBox {
            version: 0,
            flags: 0,
            creation_time: 0,
            modification_time: 0,
            timescale: 1000,
            duration: 0,
            rate: 0x0001_0000,
            volume: 0x0100,
            next_track_id: 1,
        }
    }
}

impl Mp4Box for MvhdBox {
    const TYPE: BoxType = BoxType::MvhdBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "timescale={} duration={} rate={} volume={}",
            self.timescale,
            self.duration,
            self.rate >> 16,
            self.volume >> 8,
        );
        Ok(s)
    }
}

impl BlockReader for MvhdBox {
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
            v => return Err(Error::UnsupportedBoxVersion(BoxType::MvhdBox, v)),
        };

        let rate = reader.try_get_u32()?;
        let volume = reader.try_get_u16()?;

        // reserved(10) + matrix(36) + pre_defined(24)
        if reader.remaining() < 74 {
            return Err(Error::InvalidData("mvhd box is truncated"));
        }
        reader.skip(70);
        let next_track_id = reader.get_u32();

        Ok(MvhdBox {
            version,
            flags,
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            next_track_id,
        })
    }

    fn size_hint() -> usize {
        20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mvhd_v0(timescale: u32, duration: u32) -> Vec<u8> {
        let mut buf = vec![0u8; 4]; // version + flags
        buf.extend_from_slice(&100u32.to_be_bytes());
        buf.extend_from_slice(&200u32.to_be_bytes());
        buf.extend_from_slice(&timescale.to_be_bytes());
        buf.extend_from_slice(&duration.to_be_bytes());
        buf.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        buf.extend_from_slice(&0x0100u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 70]);
        buf.extend_from_slice(&2u32.to_be_bytes());
        buf
    }

    #[test]
    fn test_mvhd32() {
        let buf = mvhd_v0(1000, 72000);
        let dst_box = MvhdBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.version, 0);
        assert_eq!(dst_box.timescale, 1000);
        assert_eq!(dst_box.duration, 72000);
        assert_eq!(dst_box.next_track_id, 2);
    }

    #[test]
    fn test_mvhd_bad_version() {
        let mut buf = mvhd_v0(1000, 72000);
        buf[0] = 2;
        let error = MvhdBox::read_block(&mut buf.as_slice());
        assert!(matches!(error, Err(Error::UnsupportedBoxVersion(_, 2))));
    }
}
