use serde::Serialize;

use crate::mp4box::*;
use crate::{Error, FourCC, Result};

/// One media sample located in the file, with both timelines resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Sample {
    pub offset: u64,
    pub size: u32,
    /// Decode timestamp in the track timescale.
    pub dts: u64,
    /// Composition timestamp, `None` when the track has no `ctts`.
    pub cts: Option<u64>,
    pub duration: u32,
    pub is_sync: bool,
    /// Zero-based index into the `stsd` entry list.
    pub description_index: usize,
}

impl Sample {
    /// Timestamp to present the sample at: cts when the track reorders
    /// frames, dts otherwise.
    #[inline]
    pub fn presentation_time(&self) -> u64 {
        self.cts.unwrap_or(self.dts)
    }
}

/// A fully indexed track: header fields plus a flat sample list in decode
/// order.
#[derive(Debug, Clone)]
pub struct Mp4Track {
    pub track_id: u32,
    pub enabled: bool,
    pub handler_type: FourCC,
    pub timescale: u32,
    pub duration: u64,
    pub language: String,
    pub entries: Vec<SampleEntry>,
    pub cslg: Option<CslgBox>,
    pub edits: Vec<ElstEntry>,
    pub samples: Vec<Sample>,
}

impl Mp4Track {
    /// Indexes one `trak`. Returns `None` when the track lacks the boxes
    /// needed to locate its samples, the caller moves on to the next one.
    pub fn from_trak(trak: &TrakBox) -> Option<Self> {
        let Some(tkhd) = &trak.tkhd else {
            log::warn!("trak without tkhd, skipping");
            return None;
        };

        let Some(mdhd) = trak.mdhd() else {
            log::warn!("trak {} without mdhd, skipping", tkhd.track_id);
            return None;
        };

        let Some(handler_type) = trak.handler_type() else {
            log::warn!("trak {} without hdlr, skipping", tkhd.track_id);
            return None;
        };

        let Some(stbl) = trak.stbl() else {
            log::warn!("trak {} without stbl, skipping", tkhd.track_id);
            return None;
        };

        let samples = match index_samples(stbl) {
            Ok(samples) => samples,
            Err(err) => {
                log::warn!("trak {} is not indexable: {err}, skipping", tkhd.track_id);
                return None;
            }
        };

        let entries = stbl
            .stsd
            .as_ref()
            .map(|stsd| stsd.entries.clone())
            .unwrap_or_default();

        Some(Mp4Track {
            track_id: tkhd.track_id,
            enabled: tkhd.enabled(),
            handler_type,
            timescale: mdhd.timescale,
            duration: mdhd.duration,
            language: mdhd.language.clone(),
            entries,
            cslg: stbl.cslg.clone(),
            edits: trak.elst().map(|elst| elst.entries.clone()).unwrap_or_default(),
            samples,
        })
    }

    pub fn video_entry(&self) -> Option<&VisualSampleEntry> {
        self.entries.iter().find_map(|entry| match entry {
            SampleEntry::Avc1(avc1) => Some(avc1),
            _ => None,
        })
    }

    pub fn audio_entry(&self) -> Option<&AudioSampleEntry> {
        self.entries.iter().find_map(|entry| match entry {
            SampleEntry::Mp4a(mp4a) => Some(mp4a),
            _ => None,
        })
    }
}

/// Expands the compacted `stbl` tables into one record per sample.
fn index_samples(stbl: &StblBox) -> Result<Vec<Sample>> {
    let stts = stbl.stts.as_ref().ok_or(Error::BoxNotFound(BoxType::SttsBox))?;
    let stsc = stbl.stsc.as_ref().ok_or(Error::BoxNotFound(BoxType::StscBox))?;
    let stsz = stbl.stsz.as_ref().ok_or(Error::BoxNotFound(BoxType::StszBox))?;

    if stbl.stco.is_none() && stbl.co64.is_none() {
        return Err(Error::BoxNotFound(BoxType::StcoBox));
    }

    let count = stsz.sample_count as usize;
    let mut samples = vec![Sample::default(); count];

    // Decode clock walk over the duration runs. The run total must land
    // exactly on the size-table count.
    let mut dts = 0u64;
    let mut indexed = 0usize;
    for entry in stts.entries.iter() {
        for _ in 0..entry.sample_count {
            if indexed >= count {
                return Err(Error::InvalidData("stts counts more samples than stsz"));
            }
            samples[indexed].dts = dts;
            samples[indexed].duration = entry.sample_delta;
            dts = dts
                .checked_add(entry.sample_delta as u64)
                .ok_or(Error::Overflow("advancing the decode clock"))?;
            indexed += 1;
        }
    }
    if indexed != count {
        return Err(Error::InvalidData("stts counts fewer samples than stsz"));
    }

    if let Some(ctts) = &stbl.ctts {
        let mut i = 0usize;
        for entry in ctts.entries.iter() {
            for _ in 0..entry.sample_count {
                if i >= count {
                    return Err(Error::InvalidData("ctts covers more samples than stsz"));
                }
                let cts = samples[i].dts as i128 + entry.sample_offset as i128;
                samples[i].cts =
                    Some(u64::try_from(cts).map_err(|_| {
                        Error::Overflow("applying the composition offset")
                    })?);
                i += 1;
            }
        }
        // Composition offsets, when present, cover every sample.
        if i != count {
            return Err(Error::InvalidData("ctts does not cover every sample"));
        }
    }

    match &stbl.stss {
        Some(stss) => {
            for &number in stss.entries.iter() {
                // Sample numbers are 1-based.
                if let Some(sample) = number
                    .checked_sub(1)
                    .and_then(|n| samples.get_mut(n as usize))
                {
                    sample.is_sync = true;
                }
            }
        }
        None => {
            for sample in samples.iter_mut() {
                sample.is_sync = true;
            }
        }
    }

    // Chunk runs: each stsc entry covers chunks up to the next entry's
    // first_chunk, the last entry runs to the end of the offset table.
    let chunk_count = stbl.chunk_count();
    let mut sample_idx = 0usize;

    'stsc: for (run, entry) in stsc.entries.iter().enumerate() {
        let first = entry.first_chunk as usize;
        if first == 0 {
            return Err(Error::InvalidData("stsc first_chunk is zero"));
        }

        let next_first = stsc
            .entries
            .get(run + 1)
            .map(|e| e.first_chunk as usize)
            .unwrap_or(chunk_count + 1)
            .min(chunk_count + 1);

        for chunk in first..next_first {
            let mut offset = stbl
                .chunk_offset(chunk - 1)
                .ok_or(Error::InvalidData("chunk index outside the offset table"))?;

            for _ in 0..entry.samples_per_chunk {
                if sample_idx >= count {
                    break 'stsc;
                }

                let size = stsz
                    .size_for(sample_idx)
                    .ok_or(Error::InvalidData("sample index outside the size table"))?;

                samples[sample_idx].offset = offset;
                samples[sample_idx].size = size;
                samples[sample_idx].description_index =
                    entry.sample_description_index.saturating_sub(1) as usize;

                offset = offset
                    .checked_add(size as u64)
                    .ok_or(Error::Overflow("advancing the chunk offset"))?;
                sample_idx += 1;
            }
        }
    }
    if sample_idx != count {
        return Err(Error::InvalidData("chunk runs do not locate every sample"));
    }

    Ok(samples)
}

/// Resolves the half-open composition interval of the track media, in the
/// track timescale. Sources, in order of authority: the `cslg` box, a
/// single-entry edit list, a scan over the composition timestamps, the
/// declared media duration.
pub fn composition_range(track: &Mp4Track, movie_timescale: u32) -> Result<(u64, u64)> {
    if let Some(cslg) = &track.cslg {
        let start = cslg.composition_start_time.max(0) as u64;
        let end = cslg.composition_end_time.max(0) as u64;
        return Ok((start, end));
    }

    if track.edits.len() == 1 {
        let edit = &track.edits[0];
        let start = edit.media_time.max(0) as u64;

        if movie_timescale == 0 {
            return Err(Error::InvalidData("movie timescale is zero"));
        }

        // segment_duration counts in the movie timescale.
        let scaled = (edit.segment_duration as u128 * track.timescale as u128)
            / movie_timescale as u128;
        let end = start
            .checked_add(u64::try_from(scaled).map_err(|_| Error::Overflow("scaling the edit duration"))?)
            .ok_or(Error::Overflow("computing the edit end"))?;

        return Ok((start, end));
    }

    let mut reordered = track.samples.iter().filter(|s| s.cts.is_some()).peekable();
    if reordered.peek().is_some() {
        let mut start = u64::MAX;
        let mut end = 0u64;

        for sample in reordered {
            let cts = sample.presentation_time();
            start = start.min(cts);
            end = end.max(
                cts.checked_add(sample.duration as u64)
                    .ok_or(Error::Overflow("computing the sample end"))?,
            );
        }

        return Ok((start, end));
    }

    Ok((0, track.duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stbl_fixture() -> StblBox {
        StblBox {
            stts: Some(SttsBox {
                entries: vec![
                    SttsEntry {
                        sample_count: 4,
                        sample_delta: 1000,
                    },
                    SttsEntry {
                        sample_count: 2,
                        sample_delta: 500,
                    },
                ],
                ..Default::default()
            }),
            stsc: Some(StscBox {
                entries: vec![
                    StscEntry {
                        first_chunk: 1,
                        samples_per_chunk: 2,
                        sample_description_index: 1,
                    },
                    StscEntry {
                        first_chunk: 2,
                        samples_per_chunk: 1,
                        sample_description_index: 2,
                    },
                ],
                ..Default::default()
            }),
            stsz: Some(StszBox {
                sample_size: 0,
                sample_count: 6,
                sample_sizes: vec![10, 20, 30, 40, 50, 60],
                ..Default::default()
            }),
            stco: Some(StcoBox {
                entries: vec![100, 1000, 2000, 3000, 4000],
                ..Default::default()
            }),
            stss: Some(StssBox {
                entries: vec![1, 5],
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_index_samples() {
        let samples = index_samples(&stbl_fixture()).unwrap();
        assert_eq!(samples.len(), 6);

        // decode clock
        assert_eq!(samples[3].dts, 3000);
        assert_eq!(samples[4].dts, 4000);
        assert_eq!(samples[5].dts, 4500);
        assert_eq!(samples[5].duration, 500);

        // first chunk holds two samples back to back
        assert_eq!(samples[0].offset, 100);
        assert_eq!(samples[1].offset, 110);
        assert_eq!(samples[0].description_index, 0);

        // last stsc entry extends across the remaining chunks
        assert_eq!(samples[2].offset, 1000);
        assert_eq!(samples[3].offset, 2000);
        assert_eq!(samples[5].offset, 4000);
        assert_eq!(samples[5].description_index, 1);

        // stss marks
        assert!(samples[0].is_sync);
        assert!(!samples[1].is_sync);
        assert!(samples[4].is_sync);
    }

    #[test]
    fn test_index_samples_ctts() {
        let mut stbl = stbl_fixture();
        stbl.ctts = Some(CttsBox {
            version: 1,
            entries: vec![
                CttsEntry {
                    sample_count: 1,
                    sample_offset: 2000,
                },
                CttsEntry {
                    sample_count: 5,
                    sample_offset: -500,
                },
            ],
            ..Default::default()
        });

        let samples = index_samples(&stbl).unwrap();
        assert_eq!(samples[0].cts, Some(2000));
        assert_eq!(samples[1].cts, Some(500));
        assert_eq!(samples[2].cts, Some(1500));
        assert_eq!(samples[5].cts, Some(4000));
        assert_eq!(samples[5].presentation_time(), 4000);
    }

    #[test]
    fn test_index_samples_ctts_shortfall_rejected() {
        let mut stbl = stbl_fixture();
        // three of six samples covered
        stbl.ctts = Some(CttsBox {
            version: 1,
            entries: vec![CttsEntry {
                sample_count: 3,
                sample_offset: 0,
            }],
            ..Default::default()
        });

        let error = index_samples(&stbl);
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_index_samples_stts_stsz_disagree() {
        let mut stbl = stbl_fixture();
        // duration runs add up to five samples, the size table holds six
        stbl.stts.as_mut().unwrap().entries[1].sample_count = 1;

        let error = index_samples(&stbl);
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_index_samples_offset_table_shortfall_rejected() {
        let mut stbl = stbl_fixture();
        // two chunks locate only three of the six samples
        stbl.stco.as_mut().unwrap().entries.truncate(2);

        let error = index_samples(&stbl);
        assert!(matches!(error, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_index_samples_negative_cts_rejected() {
        let mut stbl = stbl_fixture();
        stbl.ctts = Some(CttsBox {
            version: 1,
            entries: vec![CttsEntry {
                sample_count: 1,
                sample_offset: -1,
            }],
            ..Default::default()
        });

        let error = index_samples(&stbl);
        assert!(matches!(error, Err(Error::Overflow(_))));
    }

    #[test]
    fn test_index_samples_no_stss_all_sync() {
        let mut stbl = stbl_fixture();
        stbl.stss = None;
        let samples = index_samples(&stbl).unwrap();
        assert!(samples.iter().all(|s| s.is_sync));
    }

    #[test]
    fn test_index_samples_missing_table() {
        let mut stbl = stbl_fixture();
        stbl.stco = None;
        let error = index_samples(&stbl);
        assert!(matches!(error, Err(Error::BoxNotFound(BoxType::StcoBox))));
    }

    fn track_fixture() -> Mp4Track {
        Mp4Track {
            track_id: 1,
            enabled: true,
            handler_type: FourCC::new(b"vide"),
            timescale: 90000,
            duration: 450000,
            language: String::from("und"),
            entries: Vec::new(),
            cslg: None,
            edits: Vec::new(),
            samples: Vec::new(),
        }
    }

    #[test]
    fn test_composition_range_cslg() {
        let mut track = track_fixture();
        track.cslg = Some(CslgBox {
            composition_start_time: 3000,
            composition_end_time: 453000,
            ..Default::default()
        });

        assert_eq!(composition_range(&track, 1000).unwrap(), (3000, 453000));
    }

    #[test]
    fn test_composition_range_single_edit() {
        let mut track = track_fixture();
        track.edits = vec![ElstEntry {
            segment_duration: 5000, // movie timescale 1000
            media_time: 3000,
            media_rate: 1,
            media_rate_fraction: 0,
        }];

        // 5000 / 1000 * 90000 = 450000
        assert_eq!(composition_range(&track, 1000).unwrap(), (3000, 453000));
    }

    #[test]
    fn test_composition_range_sample_scan() {
        let mut track = track_fixture();
        track.samples = vec![
            Sample {
                dts: 0,
                cts: Some(3000),
                duration: 3000,
                ..Default::default()
            },
            Sample {
                dts: 3000,
                cts: Some(9000),
                duration: 3000,
                ..Default::default()
            },
            Sample {
                dts: 6000,
                cts: Some(6000),
                duration: 3000,
                ..Default::default()
            },
        ];

        assert_eq!(composition_range(&track, 1000).unwrap(), (3000, 12000));
    }

    #[test]
    fn test_composition_range_fallback() {
        let track = track_fixture();
        assert_eq!(composition_range(&track, 1000).unwrap(), (0, 450000));
    }

    #[test]
    fn test_multiple_edits_fall_through() {
        let mut track = track_fixture();
        track.edits = vec![ElstEntry::default(), ElstEntry::default()];
        assert_eq!(composition_range(&track, 1000).unwrap(), (0, 450000));
    }
}
