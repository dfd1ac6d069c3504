//! ISO-MP4 box (atom) records and the recursive-descent reader.
//!
//! * [ISO/IEC 14496-12](https://en.wikipedia.org/wiki/ISO/IEC_base_media_file_format) - ISO Base Media File Format
//! * [ISO/IEC 14496-14](https://en.wikipedia.org/wiki/MPEG-4_Part_14) - MP4 file format
//! * ISO/IEC 14496-1 - MPEG-4 Systems (esds descriptor chain)
//!
//! http://mp4ra.org/#/atoms
//!
//! Supported Atoms:
//! ftyp
//! moov
//!     mvhd
//!     trak
//!         tkhd
//!         edts
//!             elst
//!         mdia
//!             mdhd
//!             hdlr
//!             minf
//!                 stbl
//!                     stsd
//!                         avc1 (avcC)
//!                         mp4a (esds)
//!                     stts
//!                     ctts
//!                     stss
//!                     stsc
//!                     stsz
//!                     stz2
//!                     stco
//!                     co64
//!                     cslg
//!
//! Everything else is retained as an opaque `RawBox` record.

use byteorder::{BigEndian, ByteOrder};
use bytes::Buf;
use serde::Serialize;
use std::marker::PhantomData;

use crate::{Error, FourCC, Result};

pub(crate) mod avc1;
pub(crate) mod co64;
pub(crate) mod cslg;
pub(crate) mod ctts;
pub(crate) mod edts;
pub(crate) mod elst;
pub(crate) mod esds;
pub(crate) mod ftyp;
pub(crate) mod hdlr;
pub(crate) mod mdhd;
pub(crate) mod mdia;
pub(crate) mod minf;
pub(crate) mod moov;
pub(crate) mod mp4a;
pub(crate) mod mvhd;
pub(crate) mod stbl;
pub(crate) mod stco;
pub(crate) mod stsc;
pub(crate) mod stsd;
pub(crate) mod stss;
pub(crate) mod stsz;
pub(crate) mod stts;
pub(crate) mod tkhd;
pub(crate) mod trak;

pub use avc1::{AvcConfig, VisualSampleEntry};
pub use co64::Co64Box;
pub use cslg::CslgBox;
pub use ctts::{CttsBox, CttsEntry};
pub use edts::EdtsBox;
pub use elst::{ElstBox, ElstEntry};
pub use esds::{AudioSpecificConfig, EsdsBox, SAMPLE_FREQUENCIES};
pub use ftyp::FtypBox;
pub use hdlr::{HdlrBox, HANDLER_AUDIO, HANDLER_VIDEO};
pub use mdhd::MdhdBox;
pub use mdia::MdiaBox;
pub use minf::MinfBox;
pub use moov::MoovBox;
pub use mp4a::AudioSampleEntry;
pub use mvhd::MvhdBox;
pub use stbl::StblBox;
pub use stco::StcoBox;
pub use stsc::{StscBox, StscEntry};
pub use stsd::{SampleEntry, StsdBox};
pub use stss::StssBox;
pub use stsz::{StszBox, Stz2Box};
pub use stts::{SttsBox, SttsEntry};
pub use tkhd::TkhdBox;
pub use trak::TrakBox;

pub const HEADER_SIZE: u64 = 8;
pub const HEADER_EXT_SIZE: u64 = 4;

macro_rules! boxtype {
    ($( $name:ident => $value:expr ),*) => {
        #[derive(Clone, Copy, PartialEq, Eq)]
        pub enum BoxType {
            $( $name, )*
            UnknownBox(u32),
        }

        impl BoxType {
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( BoxType::$name => stringify!($name), )*
                    BoxType::UnknownBox(_) => "unknown",
                }
            }
        }

        impl From<u32> for BoxType {
            fn from(t: u32) -> BoxType {
                match t {
                    $( $value => BoxType::$name, )*
                    _ => BoxType::UnknownBox(t),
                }
            }
        }

        impl From<BoxType> for u32 {
            fn from(b: BoxType) -> u32 {
                match b {
                    $( BoxType::$name => $value, )*
                    BoxType::UnknownBox(t) => t,
                }
            }
        }
    }
}

boxtype! {
    FtypBox => 0x66747970,
    MoovBox => 0x6d6f6f76,
    MvhdBox => 0x6d766864,
    TrakBox => 0x7472616b,
    TkhdBox => 0x746b6864,
    EdtsBox => 0x65647473,
    ElstBox => 0x656c7374,
    MdiaBox => 0x6d646961,
    MdhdBox => 0x6d646864,
    HdlrBox => 0x68646c72,
    MinfBox => 0x6d696e66,
    StblBox => 0x7374626c,
    StsdBox => 0x73747364,
    SttsBox => 0x73747473,
    CttsBox => 0x63747473,
    StssBox => 0x73747373,
    StscBox => 0x73747363,
    StszBox => 0x7374737A,
    Stz2Box => 0x73747A32,
    StcoBox => 0x7374636F,
    Co64Box => 0x636F3634,
    CslgBox => 0x63736C67,
    EsdsBox => 0x65736473,
    Avc1Box => 0x61766331,
    AvcCBox => 0x61766343,
    Mp4aBox => 0x6d703461,
    MdatBox => 0x6d646174,
    MoofBox => 0x6d6f6f66,
    FreeBox => 0x66726565
}

impl std::fmt::Display for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fourcc = FourCC::from(u32::from(*self));
        write!(f, "{fourcc}")
    }
}

impl std::fmt::Debug for BoxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl Serialize for BoxType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Operations every decoded box record supports.
pub trait Mp4Box: Sized {
    const TYPE: BoxType;

    fn summary(&self) -> Result<String>;
    fn to_json(&self) -> Result<String>;
}

/// Opaque record kept for boxes the pipeline does not decode, including
/// known kinds whose version is unsupported. Declared size and type are
/// always retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawBox {
    pub kind: BoxType,
    pub size: u64,
}

pub trait BlockReader: Sized {
    fn read_block<'a>(block: &mut impl Reader<'a>) -> Result<Self>;

    /// Minimum number of payload bytes a well-formed box of this kind has.
    fn size_hint() -> usize;
}

/// One child box handed out by [`Reader::get_box`]. The inner reader covers
/// exactly the child's payload, so whatever a decoder does with it cannot
/// desynchronise iteration over the siblings.
pub struct BoxReader<'a, R: Reader<'a>> {
    kind: BoxType,
    size: u64,
    inner: R,
    m: PhantomData<&'a ()>,
}

impl<'a, R: Reader<'a>> BoxReader<'a, R> {
    #[inline]
    pub fn kind(&self) -> BoxType {
        self.kind
    }

    #[inline]
    pub fn try_read<T: Mp4Box + BlockReader>(&mut self) -> Result<Option<T>> {
        if T::TYPE == self.kind {
            if self.inner.remaining() < T::size_hint() {
                return Err(Error::InvalidData("box too small for its declared type"));
            }

            Ok(Some(T::read_block(&mut self.inner)?))
        } else {
            Ok(None)
        }
    }

    #[inline]
    pub fn read<T: Mp4Box + BlockReader>(&mut self) -> Result<T> {
        self.try_read()?.ok_or(Error::BoxNotFound(T::TYPE))
    }

    /// Decodes the child as `T`, degrading to an opaque record in `others`
    /// when the payload is malformed or the version unsupported.
    pub fn read_or_raw<T: Mp4Box + BlockReader>(&mut self, others: &mut Vec<RawBox>) -> Option<T> {
        match self.try_read::<T>() {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("keeping {} box as raw record: {err}", self.kind);
                others.push(RawBox {
                    kind: self.kind,
                    size: self.size,
                });
                None
            }
        }
    }

    #[inline]
    pub fn raw(&self) -> RawBox {
        RawBox {
            kind: self.kind,
            size: self.size,
        }
    }
}

/// Big-endian cursor over one box payload.
pub trait Reader<'a> {
    fn take(&mut self, size: usize) -> Result<impl Reader<'a> + '_>;
    fn remaining(&self) -> usize;
    fn skip(&mut self, size: usize);

    fn get_u8(&mut self) -> u8;
    fn get_u16(&mut self) -> u16;
    fn get_u24(&mut self) -> u32;
    fn get_u32(&mut self) -> u32;
    fn get_u64(&mut self) -> u64;

    fn get_i16(&mut self) -> i16;
    fn get_i32(&mut self) -> i32;
    fn get_i64(&mut self) -> i64;

    #[inline]
    fn try_get_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            Err(Error::InvalidData("expected at least 1 byte more"))
        } else {
            Ok(self.get_u8())
        }
    }

    #[inline]
    fn try_get_u16(&mut self) -> Result<u16> {
        if self.remaining() < 2 {
            Err(Error::InvalidData("expected at least 2 bytes more"))
        } else {
            Ok(self.get_u16())
        }
    }

    #[inline]
    fn try_get_u32(&mut self) -> Result<u32> {
        if self.remaining() < 4 {
            Err(Error::InvalidData("expected at least 4 bytes more"))
        } else {
            Ok(self.get_u32())
        }
    }

    #[inline]
    fn try_get_u64(&mut self) -> Result<u64> {
        if self.remaining() < 8 {
            Err(Error::InvalidData("expected at least 8 bytes more"))
        } else {
            Ok(self.get_u64())
        }
    }

    fn get_null_terminated_string(&mut self) -> String;

    fn copy_to_slice(&mut self, slice: &mut [u8]) -> Result<()>;

    fn collect(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; size];
        self.copy_to_slice(&mut buf)?;

        Ok(buf)
    }

    #[inline]
    fn collect_remaining(&mut self) -> Vec<u8> {
        self.collect(self.remaining()).unwrap()
    }

    fn get_box(&mut self) -> Result<Option<BoxReader<'a, impl Reader<'a> + '_>>>;

    fn find_box<B: Mp4Box + BlockReader>(&mut self) -> Result<B> {
        self.try_find_box()
            .and_then(|x| x.ok_or(Error::BoxNotFound(B::TYPE)))
    }

    #[inline]
    fn try_find_box<B: Mp4Box + BlockReader>(&mut self) -> Result<Option<B>> {
        while let Some(mut bx) = self.get_box()? {
            if let Some(inner) = bx.try_read::<B>()? {
                return Ok(Some(inner));
            }

            log::debug!("skipping {} box", bx.kind);
        }

        Ok(None)
    }
}

impl<'a> Reader<'a> for &'a [u8] {
    #[inline]
    fn take(&mut self, size: usize) -> Result<impl Reader<'a> + '_> {
        if self.len() < size {
            return Err(Error::InvalidData("no bytes left"));
        }

        let buff = &(*self)[0..size];
        self.advance(size);

        Ok(buff)
    }

    #[inline]
    fn remaining(&self) -> usize {
        Buf::remaining(self)
    }

    #[inline]
    fn skip(&mut self, size: usize) {
        Buf::advance(self, size)
    }

    #[inline]
    fn get_u8(&mut self) -> u8 {
        Buf::get_u8(self)
    }

    #[inline]
    fn get_u16(&mut self) -> u16 {
        Buf::get_u16(self)
    }

    #[inline]
    fn get_u24(&mut self) -> u32 {
        let val = BigEndian::read_u24(self.chunk());
        self.skip(3);
        val
    }

    #[inline]
    fn get_u32(&mut self) -> u32 {
        Buf::get_u32(self)
    }

    #[inline]
    fn get_u64(&mut self) -> u64 {
        Buf::get_u64(self)
    }

    #[inline]
    fn get_i16(&mut self) -> i16 {
        Buf::get_i16(self)
    }

    #[inline]
    fn get_i32(&mut self) -> i32 {
        Buf::get_i32(self)
    }

    #[inline]
    fn get_i64(&mut self) -> i64 {
        Buf::get_i64(self)
    }

    #[inline]
    fn get_null_terminated_string(&mut self) -> String {
        let rem = self.len();

        if rem > 0 {
            let size = self.iter().position(|&b| b == b'\0');

            let (size, eat) = if let Some(size) = size {
                (size, size + 1)
            } else {
                (rem, rem)
            };

            let val = String::from_utf8_lossy(&self[0..size]).to_string();
            self.advance(eat);
            val
        } else {
            String::new()
        }
    }

    #[inline]
    fn copy_to_slice(&mut self, slice: &mut [u8]) -> Result<()> {
        if self.len() < slice.len() {
            return Err(Error::InvalidData("expected more bytes"));
        }

        Buf::copy_to_slice(self, slice);

        Ok(())
    }

    #[inline]
    fn get_box(&mut self) -> Result<Option<BoxReader<'a, impl Reader<'a> + '_>>> {
        let Some(BoxHeader { kind, size }) = BoxHeader::read_sync(self)? else {
            return Ok(None);
        };

        // An inconsistent child size consumes the rest of the parent, the
        // same recovery a forced seek to the computed box end gives.
        let take = usize::try_from(size)
            .map_err(|_| Error::Overflow("converting box size"))?
            .min(self.len());

        if take as u64 != size {
            log::debug!("{kind} box declares {size} bytes, {take} left in parent");
        }

        Ok(Some(BoxReader {
            kind,
            size,
            inner: Reader::take(self, take)?,
            m: PhantomData,
        }))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoxHeader {
    pub kind: BoxType,
    /// Payload size, header excluded.
    pub size: u64,
}

impl BoxHeader {
    pub fn read_sync<'a>(reader: &mut impl Reader<'a>) -> Result<Option<Self>> {
        if reader.remaining() < 8 {
            return Ok(None);
        }

        let sz = reader.get_u32();
        let typ = reader.get_u32();

        let size = match sz {
            // Box extends to the end of the enclosing container and is the
            // last of its siblings.
            0 => reader.remaining() as u64,
            1 => {
                let largesize = reader.try_get_u64()?;

                // Disallow `largesize < 16`, or else a largesize of 8 would
                // yield a payload size of 0 and silently hide the box body.
                match largesize {
                    0 => reader.remaining() as u64,
                    1..=15 => return Err(Error::InvalidData("64-bit box size too small")),
                    16..=u64::MAX => largesize - 16,
                }
            }
            2..=7 => return Err(Error::InvalidData("box size too small")),
            _ => (sz - 8) as u64,
        };

        Ok(Some(BoxHeader {
            kind: BoxType::from(typ),
            size,
        }))
    }
}

#[inline]
pub fn read_box_header_ext<'a, R: Reader<'a>>(reader: &mut R) -> (u8, u32) {
    (reader.get_u8(), reader.get_u24())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourcc() {
        let ftyp_fcc = 0x66747970;
        let ftyp_value = FourCC::from(ftyp_fcc);
        assert_eq!(&ftyp_value.value[..], b"ftyp");
        let ftyp_fcc2: u32 = ftyp_value.into();
        assert_eq!(ftyp_fcc, ftyp_fcc2);
    }

    #[test]
    fn test_header_small() {
        let header = BoxHeader::read_sync(&mut &[0, 0, 0, 16, b'f', b't', b'y', b'p'][..])
            .unwrap()
            .unwrap();
        assert_eq!(header.kind, BoxType::FtypBox);
        assert_eq!(header.size, 8);
    }

    #[test]
    fn test_header_largesize_too_small() {
        let error =
            BoxHeader::read_sync(&mut &[0, 0, 0, 1, 1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 7][..]);
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_header_valid_largesize() {
        let header =
            BoxHeader::read_sync(&mut &[0, 0, 0, 1, 1, 2, 3, 4, 0, 0, 0, 0, 0, 0, 0, 24][..])
                .unwrap()
                .unwrap();
        assert_eq!(header.size, 8);
    }

    #[test]
    fn test_header_zero_size_runs_to_end() {
        let buf = [0u8, 0, 0, 0, b'm', b'd', b'a', b't', 1, 2, 3, 4];
        let mut reader = &buf[..];
        let header = BoxHeader::read_sync(&mut reader).unwrap().unwrap();
        assert_eq!(header.kind, BoxType::MdatBox);
        assert_eq!(header.size, 4);
    }

    #[test]
    fn test_sibling_iteration_skips_unknown() {
        // A `free` box followed by an unknown kind, then truncated tail.
        let buf = [
            0u8, 0, 0, 12, b'f', b'r', b'e', b'e', 1, 2, 3, 4, //
            0, 0, 0, 9, b'z', b'z', b'z', b'z', 7, //
            0, 0, 0,
        ];
        let mut reader = &buf[..];
        let mut kinds = Vec::new();
        while let Some(bx) = reader.get_box().unwrap() {
            kinds.push(bx.kind());
        }
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0], BoxType::FreeBox);
        assert_eq!(kinds[1], BoxType::UnknownBox(0x7a7a7a7a));
    }
}
