use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use bytes::Bytes;

use crate::mp4box::*;
use crate::{Error, Result};

/// Parsed file-level metadata. Only `ftyp` and `moov` payloads are ever
/// held in memory, media data is read on demand through [`MediaRead`].
#[derive(Debug, Clone, Default)]
pub struct Mp4File {
    pub ftyp: Option<FtypBox>,
    pub moov: MoovBox,
}

impl Mp4File {
    pub fn read<R: Read + Seek>(input: &mut R) -> Result<Self> {
        let mut ftyp = None;
        let mut moov = None;

        loop {
            let mut header = [0u8; 8];
            match input.read_exact(&mut header) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }

            let sz = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
            let typ = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
            let kind = BoxType::from(typ);

            // None means the box runs to the end of the file.
            let payload = match sz {
                0 => None,
                1 => {
                    let mut large = [0u8; 8];
                    input.read_exact(&mut large)?;
                    match u64::from_be_bytes(large) {
                        0 => None,
                        large @ 1..=15 => {
                            log::warn!("{kind} box with bad largesize {large}, stopping");
                            break;
                        }
                        large => Some(large - 16),
                    }
                }
                2..=7 => {
                    log::warn!("{kind} box with bad size {sz}, stopping");
                    break;
                }
                _ => Some((sz - 8) as u64),
            };

            match kind {
                BoxType::FtypBox | BoxType::MoovBox => {
                    let buf = match payload {
                        Some(size) => {
                            let size = usize::try_from(size)
                                .map_err(|_| Error::Overflow("converting box size"))?;
                            let mut buf = vec![0u8; size];
                            input.read_exact(&mut buf)?;
                            buf
                        }
                        None => {
                            let mut buf = Vec::new();
                            input.read_to_end(&mut buf)?;
                            buf
                        }
                    };

                    let mut reader = buf.as_slice();
                    if kind == BoxType::FtypBox {
                        ftyp = Some(FtypBox::read_block(&mut reader)?);
                    } else {
                        moov = Some(MoovBox::read_block(&mut reader)?);
                    }
                }
                other => {
                    if other == BoxType::MoofBox {
                        log::warn!("fragmented input, moof boxes are ignored");
                    } else {
                        log::debug!("skipping top-level {other} box");
                    }

                    match payload {
                        Some(size) => {
                            input.seek(SeekFrom::Current(
                                i64::try_from(size)
                                    .map_err(|_| Error::Overflow("converting box size"))?,
                            ))?;
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(Mp4File {
            ftyp,
            moov: moov.ok_or(Error::BoxNotFound(BoxType::MoovBox))?,
        })
    }
}

/// Random access reads into the media data, shared across request handlers.
pub trait MediaRead: Send + Sync {
    fn read_at(&self, offset: u64, size: usize) -> Result<Bytes>;
}

/// [`MediaRead`] over a file on disk. A mutex serializes the seek and the
/// read that follows it.
pub struct FileSource {
    file: Mutex<File>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(FileSource {
            file: Mutex::new(File::open(path)?),
        })
    }
}

impl MediaRead for FileSource {
    fn read_at(&self, offset: u64, size: usize) -> Result<Bytes> {
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; size];
        file.read_exact(&mut buf)?;

        Ok(buf.into())
    }
}

impl MediaRead for Bytes {
    fn read_at(&self, offset: u64, size: usize) -> Result<Bytes> {
        let start = usize::try_from(offset).map_err(|_| Error::Overflow("converting offset"))?;
        let end = start
            .checked_add(size)
            .ok_or(Error::Overflow("computing read range"))?;

        if end > self.len() {
            return Err(Error::InvalidData("sample range is outside the media data"));
        }

        Ok(self.slice(start..end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_file() -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&16u32.to_be_bytes());
        buf.extend_from_slice(b"ftyp");
        buf.extend_from_slice(b"isom");
        buf.extend_from_slice(&512u32.to_be_bytes());

        // free box the reader must skip
        buf.extend_from_slice(&12u32.to_be_bytes());
        buf.extend_from_slice(b"free");
        buf.extend_from_slice(&[0u8; 4]);

        buf.extend_from_slice(&8u32.to_be_bytes());
        buf.extend_from_slice(b"moov");

        buf
    }

    #[test]
    fn test_read_minimal() {
        let mut cursor = Cursor::new(minimal_file());
        let file = Mp4File::read(&mut cursor).unwrap();
        assert_eq!(file.ftyp.unwrap().major_brand, crate::FourCC::new(b"isom"));
        assert!(file.moov.traks.is_empty());
    }

    #[test]
    fn test_read_without_moov() {
        let data = minimal_file();
        let mut cursor = Cursor::new(&data[..28]);
        let error = Mp4File::read(&mut cursor);
        assert!(matches!(error, Err(Error::BoxNotFound(BoxType::MoovBox))));
    }

    #[test]
    fn test_bytes_source_bounds() {
        let data = Bytes::from_static(b"0123456789");
        assert_eq!(&data.read_at(2, 3).unwrap()[..], b"234");
        assert!(data.read_at(8, 3).is_err());
    }
}
