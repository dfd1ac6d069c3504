pub mod error;
pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

mod types;
pub use types::FourCC;

mod mp4box;
pub use mp4box::*;

mod file;
pub use file::{FileSource, MediaRead, Mp4File};

mod track;
pub use track::{composition_range, Mp4Track, Sample};

mod es;
pub use es::{ElementaryStream, MediaSet, Repacketize, StreamId, StreamType};

pub mod adts;
pub mod h264;

pub mod mux;
pub use mux::{write_segment, TsMuxer};

pub mod hls;
pub use hls::MediaSegment;
