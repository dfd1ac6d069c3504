use serde::Serialize;

use crate::mp4box::*;

/// Composition to decode timeline mapping. When present it gives the
/// media composition range directly, without scanning the sample table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CslgBox {
    pub version: u8,
    pub flags: u32,
    pub composition_to_dts_shift: i64,
    pub least_decode_to_display_delta: i64,
    pub greatest_decode_to_display_delta: i64,
    pub composition_start_time: i64,
    pub composition_end_time: i64,
}

impl Mp4Box for CslgBox {
    const TYPE: BoxType = BoxType::CslgBox;

    fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self).unwrap())
    }

    fn summary(&self) -> Result<String> {
        let s = format!(
            "composition_start_time={} composition_end_time={}",
            self.composition_start_time, self.composition_end_time
        );
        Ok(s)
    }
}

impl BlockReader for CslgBox {
    fn read_block<'a>(reader: &mut impl Reader<'a>) -> Result<Self> {
        let (version, flags) = read_box_header_ext(reader);

        let fields: [i64; 5] = match version {
            1 => {
                if reader.remaining() < 40 {
                    return Err(Error::InvalidData("cslg box is truncated"));
                }
                core::array::from_fn(|_| reader.get_i64())
            }
            0 => core::array::from_fn(|_| reader.get_i32() as i64),
            v => return Err(Error::UnsupportedBoxVersion(BoxType::CslgBox, v)),
        };

        Ok(CslgBox {
            version,
            flags,
            composition_to_dts_shift: fields[0],
            least_decode_to_display_delta: fields[1],
            greatest_decode_to_display_delta: fields[2],
            composition_start_time: fields[3],
            composition_end_time: fields[4],
        })
    }

    fn size_hint() -> usize {
        24
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cslg_v0_sign_extension() {
        let mut buf = vec![0u8; 4];
        for v in [1024i32, -1024, 3072, 0, 60000] {
            buf.extend_from_slice(&v.to_be_bytes());
        }

        let dst_box = CslgBox::read_block(&mut buf.as_slice()).unwrap();
        assert_eq!(dst_box.least_decode_to_display_delta, -1024);
        assert_eq!(dst_box.composition_start_time, 0);
        assert_eq!(dst_box.composition_end_time, 60000);
    }
}
