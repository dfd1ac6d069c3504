use serde::Serialize;

use crate::mp4box::*;

pub const TRACK_ENABLED: u32 = 0x1;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TkhdBox {
    pub version: u8,
    pub flags: u32,
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: u16,
    /// 16.16 fixed point.
    pub width: u32,
    /// 16.16 fixed point.
    pub height: u32,
}

impl TkhdBox {
    pub fn enabled(&self) -> bool {
        self.flags & TRACK_ENABLED != 0
    }
}

impl Mp4Box for TkhdBox {
    const TYPE: BoxType = BoxType::TkhdBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "track_id={} duration={} layer={} volume={} width={} height={}",
            self.track_id,
            self.duration,
            self.layer,
            self.volume >> 8,
            self.width >> 16,
            self.height >> 16,
        );
        Ok(s)
    }
}

impl BlockReader for TkhdBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let (creation_time, modification_time, track_id, _, duration) = match version {
            1 => (
                reader.get_u64(),
                reader.get_u64(),
                reader.try_get_u32()?,
                reader.try_get_u32()?,
                reader.try_get_u64()?,
            ),
            0 => (
                reader.get_u32() as u64,
                reader.get_u32() as u64,
                reader.get_u32(),
                reader.get_u32(),
                reader.get_u32() as u64,
            ),
            v => return Err(Error::UnsupportedBoxVersion(BoxType::TkhdBox, v)),
        };

        // reserved(8) + layer + alternate_group + volume + reserved(2) +
        // matrix(36) + width + height
        if reader.remaining() < 60 {
            return Err(Error::InvalidData("tkhd box is truncated"));
        }

        reader.skip(8);
        let layer = reader.get_i16();
        let alternate_group = reader.get_i16();
        let volume = reader.get_u16();
        reader.skip(2);
        reader.skip(36);
        let width = reader.get_u32();
        let height = reader.get_u32();

        Ok(TkhdBox {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            width,
            height,
        })
    }

    fn size_hint() -> usize {
        84
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tkhd32() {
        let mut buf = vec![0u8, 0, 0, 1]; // version 0, track enabled
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&3u32.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(&54000u32.to_be_bytes());
        buf.extend_from_slice(&[0u8; 8]);
        buf.extend_from_slice(&0i16.to_be_bytes());
        buf.extend_from_slice(&0i16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&[0u8; 2]);
        buf.extend_from_slice(&[0u8; 36]);
        buf.extend_from_slice(&(1280u32 << 16).to_be_bytes());
        buf.extend_from_slice(&(720u32 << 16).to_be_bytes());

        let dst_box = TkhdBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.track_id, 3);
        assert_eq!(dst_box.duration, 54000);
        assert!(dst_box.enabled());
        assert_eq!(dst_box.width >> 16, 1280);
        assert_eq!(dst_box.height >> 16, 720);
    }
}
