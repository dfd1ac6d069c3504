//! Segment planning over the video timeline and media playlist rendering.

use std::fmt::Write;

use crate::track::Sample;

/// One planned segment, both fields in the video track timescale. The
/// window is half-open, the last segment runs to the end of the media.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaSegment {
    pub start: u64,
    pub duration: u64,
}

impl MediaSegment {
    pub fn end(&self) -> u64 {
        self.start + self.duration
    }
}

/// Segment URIs count from one to line up with `EXT-X-MEDIA-SEQUENCE:1`.
pub fn segment_uri(index: usize) -> String {
    format!("{}.ts", index + 1)
}

/// Cuts the video timeline at sync samples. A segment closes at the first
/// sync sample at least `min_duration` ticks past its start, so every
/// segment meets the minimum and begins decodable. Sync samples before
/// `composition_start` never close a segment, the leading reorder gap
/// stays inside the first one.
pub fn plan_segments(
    samples: &[Sample],
    min_duration: u64,
    composition_start: u64,
) -> Vec<MediaSegment> {
    let Some(last) = samples.last() else {
        return Vec::new();
    };
    let end = last.presentation_time() + last.duration as u64;

    let mut segments = Vec::new();
    let mut start = samples[0].dts;

    for sample in samples.iter().skip(1) {
        if sample.dts < composition_start {
            continue;
        }
        if sample.is_sync && sample.dts - start >= min_duration {
            segments.push(MediaSegment {
                start,
                duration: sample.dts - start,
            });
            start = sample.dts;
        }
    }

    if end > start || segments.is_empty() {
        segments.push(MediaSegment {
            start,
            duration: end.saturating_sub(start),
        });
    }

    segments
}

/// Renders the VOD media playlist. `trim` is the part of the first
/// segment before the composition start, advertised durations exclude it
/// so the displayed timeline starts at zero.
pub fn render_playlist(segments: &[MediaSegment], timescale: u32, trim: u64) -> String {
    let durations: Vec<f64> = segments
        .iter()
        .enumerate()
        .map(|(i, segment)| {
            let ticks = if i == 0 {
                segment.duration.saturating_sub(trim)
            } else {
                segment.duration
            };
            ticks as f64 / timescale as f64
        })
        .collect();

    let target = durations.iter().cloned().fold(0.0f64, f64::max).ceil();

    let mut out = String::new();
    let _ = writeln!(out, "#EXTM3U");
    let _ = writeln!(out, "#EXT-X-VERSION:3");
    let _ = writeln!(out, "#EXT-X-TARGETDURATION:{}", target as u64);
    let _ = writeln!(out, "#EXT-X-MEDIA-SEQUENCE:1");
    let _ = writeln!(out, "#EXT-X-PLAYLIST-TYPE:VOD");

    for (i, duration) in durations.iter().enumerate() {
        let _ = writeln!(out, "#EXTINF:{duration:.3},");
        let _ = writeln!(out, "{}", segment_uri(i));
    }

    let _ = writeln!(out, "#EXT-X-ENDLIST");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_samples(count: u64, delta: u32, sync: &[u64]) -> Vec<Sample> {
        (0..count)
            .map(|i| Sample {
                dts: i * delta as u64,
                duration: delta,
                is_sync: sync.contains(&(i + 1)),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_segments_cut_at_first_late_enough_sync() {
        // ten samples of 1000 ticks, sync at samples 1 and 6
        let samples = video_samples(10, 1000, &[1, 6]);
        let segments = plan_segments(&samples, 4000, 0);

        assert_eq!(
            segments,
            vec![
                MediaSegment {
                    start: 0,
                    duration: 5000
                },
                MediaSegment {
                    start: 5000,
                    duration: 5000
                },
            ]
        );
    }

    #[test]
    fn test_segments_cut_exactly_at_minimum() {
        // sync at sample 5 sits exactly min_duration past the start
        let samples = video_samples(10, 1000, &[1, 5]);
        let segments = plan_segments(&samples, 4000, 0);

        assert_eq!(
            segments,
            vec![
                MediaSegment {
                    start: 0,
                    duration: 4000
                },
                MediaSegment {
                    start: 4000,
                    duration: 6000
                },
            ]
        );
    }

    #[test]
    fn test_single_segment_when_no_cut_qualifies() {
        let samples = video_samples(5, 1000, &[1, 3]);
        let segments = plan_segments(&samples, 10_000, 0);

        assert_eq!(
            segments,
            vec![MediaSegment {
                start: 0,
                duration: 5000
            }]
        );
    }

    #[test]
    fn test_empty_track() {
        assert!(plan_segments(&[], 4000, 0).is_empty());
    }

    #[test]
    fn test_tail_shorter_than_minimum_still_emitted() {
        // cut at 4000, then only 1000 ticks remain
        let samples = video_samples(5, 1000, &[1, 5]);
        let segments = plan_segments(&samples, 4000, 0);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].duration, 1000);
    }

    #[test]
    fn test_sync_before_composition_start_does_not_cut() {
        // sync points at dts 0, 2000 and 5000; presentation starts at 2500
        let samples = video_samples(10, 1000, &[1, 3, 6]);
        let segments = plan_segments(&samples, 2000, 2500);

        // the 2000 sync point sits before the composition start, the first
        // cut lands at 5000
        assert_eq!(
            segments,
            vec![
                MediaSegment {
                    start: 0,
                    duration: 5000
                },
                MediaSegment {
                    start: 5000,
                    duration: 5000
                },
            ]
        );
    }

    #[test]
    fn test_track_end_uses_presentation_time() {
        let mut samples = video_samples(5, 1000, &[1]);
        // reordered tail: the last frame presents 2000 ticks past its dts
        samples[4].cts = Some(6000);

        let segments = plan_segments(&samples, 10_000, 0);
        assert_eq!(
            segments,
            vec![MediaSegment {
                start: 0,
                duration: 7000
            }]
        );
    }

    #[test]
    fn test_playlist_rendering() {
        let segments = vec![
            MediaSegment {
                start: 0,
                duration: 5000,
            },
            MediaSegment {
                start: 5000,
                duration: 4500,
            },
        ];

        let playlist = render_playlist(&segments, 1000, 0);
        let lines: Vec<&str> = playlist.lines().collect();

        assert_eq!(lines[0], "#EXTM3U");
        assert_eq!(lines[1], "#EXT-X-VERSION:3");
        assert_eq!(lines[2], "#EXT-X-TARGETDURATION:5");
        assert_eq!(lines[3], "#EXT-X-MEDIA-SEQUENCE:1");
        assert_eq!(lines[4], "#EXT-X-PLAYLIST-TYPE:VOD");
        assert_eq!(lines[5], "#EXTINF:5.000,");
        assert_eq!(lines[6], "1.ts");
        assert_eq!(lines[7], "#EXTINF:4.500,");
        assert_eq!(lines[8], "2.ts");
        assert_eq!(lines[9], "#EXT-X-ENDLIST");
    }

    #[test]
    fn test_playlist_first_segment_trim() {
        let segments = vec![
            MediaSegment {
                start: 0,
                duration: 5000,
            },
            MediaSegment {
                start: 5000,
                duration: 5000,
            },
        ];

        let playlist = render_playlist(&segments, 1000, 1500);
        assert!(playlist.contains("#EXTINF:3.500,"));
        // target duration follows the advertised durations
        assert!(playlist.contains("#EXT-X-TARGETDURATION:5"));
    }
}
