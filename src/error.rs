use crate::mp4box::BoxType;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    InvalidData(&'static str),

    #[error("{0} not found")]
    BoxNotFound(BoxType),

    #[error("{0} version {1} is not supported")]
    UnsupportedBoxVersion(BoxType, u8),

    #[error("arithmetic overflow while {0}")]
    Overflow(&'static str),

    #[error("access unit delimiter found in NAL payload, source is corrupt or already Annex-B")]
    UnexpectedAccessUnitDelimiter,

    #[error("no usable video track with sync samples")]
    NoVideoTrack,

    #[error("no {0} elementary stream in file")]
    NoElementaryStream(&'static str),
}
