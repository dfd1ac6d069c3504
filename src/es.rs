use crate::adts::AdtsWriter;
use crate::file::Mp4File;
use crate::h264::AnnexBWriter;
use crate::mp4box::*;
use crate::track::{Mp4Track, Sample};
use crate::{Error, Result};

/// PMT stream_type values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamType {
    /// H.264 video, stream_type 0x1B.
    Video = 0x1B,
    /// ADTS AAC audio, stream_type 0x0F.
    Audio = 0x0F,
}

/// PES stream_id values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamId {
    Video = 0xE0,
    Audio = 0xC0,
}

/// Converts one MP4 sample payload into its packaged elementary form,
/// Annex-B for video and ADTS for audio. `prev` is the previously written
/// sample of the same stream, `None` at a segment start.
pub trait Repacketize: Send + Sync {
    fn write_sample(
        &self,
        sample: &Sample,
        prev: Option<&Sample>,
        payload: &[u8],
        out: &mut Vec<u8>,
    ) -> Result<()>;
}

/// One track mapped onto a transport stream PID.
pub struct ElementaryStream {
    pub pid: u16,
    pub stream_type: StreamType,
    pub stream_id: StreamId,
    pub timescale: u32,
    pub samples: Vec<Sample>,
    pub packager: Box<dyn Repacketize>,
}

/// The streams selected for remuxing. The video stream always comes
/// first and carries the PCR.
pub struct MediaSet {
    pub streams: Vec<ElementaryStream>,
    /// Composition range of the video track, in the video timescale.
    pub video_range: (u64, u64),
}

const FIRST_PID: u16 = 0x100;

impl MediaSet {
    /// Picks the remuxable tracks: the first enabled H.264 video track
    /// that has sync samples, plus every enabled AAC audio track. A track
    /// is excluded when any of its sample descriptions lacks a usable
    /// codec configuration.
    pub fn from_file(file: &Mp4File) -> Result<Self> {
        let movie_timescale = file
            .moov
            .mvhd
            .as_ref()
            .map(|mvhd| mvhd.timescale)
            .unwrap_or(1000);

        let tracks: Vec<Mp4Track> = file
            .moov
            .traks
            .iter()
            .filter_map(Mp4Track::from_trak)
            .collect();

        let mut streams = Vec::new();
        let mut video_range = None;

        for track in tracks.iter() {
            if !track.enabled || track.samples.is_empty() {
                continue;
            }

            if track.handler_type != HANDLER_VIDEO || video_range.is_some() {
                continue;
            }

            if track.video_entry().is_none() {
                log::info!("track {}: video codec is not H.264, skipping", track.track_id);
                continue;
            }

            if !track.samples.iter().any(|s| s.is_sync) {
                log::warn!("track {}: no sync samples, skipping", track.track_id);
                continue;
            }

            let configs: Vec<AvcConfig> = track
                .entries
                .iter()
                .filter_map(|entry| match entry {
                    SampleEntry::Avc1(avc1) => Some(avc1.avcc.clone()),
                    _ => None,
                })
                .collect();

            // Every sample description must carry a codec configuration,
            // samples referencing a bare one cannot be repacketized.
            if configs.len() != track.entries.len() {
                log::warn!(
                    "track {}: {} of {} sample descriptions are usable, skipping",
                    track.track_id,
                    configs.len(),
                    track.entries.len()
                );
                continue;
            }

            video_range = Some(composition_range_checked(track, movie_timescale)?);

            streams.push(ElementaryStream {
                pid: 0, // assigned below
                stream_type: StreamType::Video,
                stream_id: StreamId::Video,
                timescale: track.timescale,
                samples: track.samples.clone(),
                packager: Box::new(AnnexBWriter::new(configs)),
            });
        }

        let Some(video_range) = video_range else {
            return Err(Error::NoVideoTrack);
        };

        for track in tracks.iter() {
            if !track.enabled || track.samples.is_empty() {
                continue;
            }

            if track.handler_type != HANDLER_AUDIO {
                continue;
            }

            if track.audio_entry().is_none() {
                log::info!("track {}: audio codec is not AAC, skipping", track.track_id);
                continue;
            }

            // Object types 1 through 4 are the ones the ADTS profile field
            // can express.
            let configs: Vec<AudioSpecificConfig> = track
                .entries
                .iter()
                .filter_map(|entry| match entry {
                    SampleEntry::Mp4a(mp4a) => mp4a.audio_config().copied(),
                    _ => None,
                })
                .filter(|config| (1..=4).contains(&config.object_type))
                .collect();

            if configs.len() != track.entries.len() {
                log::warn!(
                    "track {}: unsupported audio configuration, skipping",
                    track.track_id
                );
                continue;
            }

            streams.push(ElementaryStream {
                pid: 0,
                stream_type: StreamType::Audio,
                stream_id: StreamId::Audio,
                timescale: track.timescale,
                samples: track.samples.clone(),
                packager: Box::new(AdtsWriter::new(configs)),
            });
        }

        for (i, stream) in streams.iter_mut().enumerate() {
            stream.pid = FIRST_PID + i as u16;
        }

        Ok(MediaSet {
            streams,
            video_range,
        })
    }

    pub fn video(&self) -> &ElementaryStream {
        // from_file never builds a set without the video stream
        &self.streams[0]
    }

    /// Merges the samples of every stream that fall inside `[start, end)`
    /// of the video timeline, ordered by decode time. `end` is `None` for
    /// the final segment.
    pub fn interleave(&self, start: u64, end: Option<u64>) -> Vec<(usize, &Sample)> {
        let video_timescale = self.video().timescale;

        let mut merged: Vec<(usize, &Sample)> = Vec::new();
        for (index, stream) in self.streams.iter().enumerate() {
            let ts = stream.timescale as u128;
            let vts = video_timescale as u128;

            for sample in stream.samples.iter() {
                let scaled = sample.dts as u128 * vts;
                if scaled < start as u128 * ts {
                    continue;
                }
                if let Some(end) = end {
                    if scaled >= end as u128 * ts {
                        continue;
                    }
                }
                merged.push((index, sample));
            }
        }

        merged.sort_by(|(ia, a), (ib, b)| {
            let ta = self.streams[*ia].timescale as u128;
            let tb = self.streams[*ib].timescale as u128;
            (a.dts as u128 * tb)
                .cmp(&(b.dts as u128 * ta))
                .then_with(|| self.streams[*ia].pid.cmp(&self.streams[*ib].pid))
        });

        merged
    }
}

fn composition_range_checked(track: &Mp4Track, movie_timescale: u32) -> Result<(u64, u64)> {
    let (start, end) = crate::track::composition_range(track, movie_timescale)?;
    log::debug!(
        "track {}: composition range [{start}, {end}) at {}/s",
        track.track_id,
        track.timescale
    );
    Ok((start, end))
}
