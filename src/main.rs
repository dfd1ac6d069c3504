use std::fs::File;
use std::io::Write as _;
use std::net::SocketAddr;
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use clap::{Parser, Subcommand};

use mp4hls::hls::{plan_segments, render_playlist, segment_uri, MediaSegment};
use mp4hls::{write_segment, FileSource, MediaRead, MediaSet, Mp4Box, Mp4File};

#[derive(Parser)]
#[command(name = "mp4hls", version, about = "Serve an MP4 file as HLS without re-encoding")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the file as an HLS playlist over HTTP
    Serve {
        input: PathBuf,
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        listen: SocketAddr,
        /// Minimum segment duration in seconds
        #[arg(short, long, default_value_t = 4)]
        min_segment: u32,
    },
    /// Write the playlist and every segment to a directory
    Remux {
        input: PathBuf,
        out_dir: PathBuf,
        /// Minimum segment duration in seconds
        #[arg(short, long, default_value_t = 4)]
        min_segment: u32,
    },
    /// Extract the video track as a raw Annex-B H.264 stream
    RawH264 { input: PathBuf, output: PathBuf },
    /// Extract the first audio track as a raw ADTS stream
    RawAdts { input: PathBuf, output: PathBuf },
    /// Print the track layout
    Info {
        input: PathBuf,
        /// Print box records as JSON
        #[arg(long)]
        json: bool,
    },
}

struct App {
    media: MediaSet,
    source: FileSource,
    segments: Vec<MediaSegment>,
    playlist: String,
}

fn load(input: &FsPath, min_segment: u32) -> anyhow::Result<App> {
    let mut file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mp4 = Mp4File::read(&mut file).context("parsing the file structure")?;

    let media = MediaSet::from_file(&mp4)?;
    let video = media.video();

    let min_duration = min_segment as u64 * video.timescale as u64;
    let trim = media.video_range.0;
    let segments = plan_segments(&video.samples, min_duration, trim);
    let playlist = render_playlist(&segments, video.timescale, trim);

    log::info!(
        "{}: {} streams, {} segments",
        input.display(),
        media.streams.len(),
        segments.len()
    );

    Ok(App {
        media,
        source: FileSource::open(input)?,
        segments,
        playlist,
    })
}

fn render_segment(app: &App, index: usize) -> anyhow::Result<Vec<u8>> {
    let segment = app
        .segments
        .get(index)
        .ok_or_else(|| anyhow!("segment {index} out of range"))?;

    // the last window stays open so trailing audio is not dropped
    let end = (index + 1 < app.segments.len()).then(|| segment.end());
    Ok(write_segment(&app.media, &app.source, segment.start, end)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            input,
            listen,
            min_segment,
        } => serve(&input, listen, min_segment).await,
        Command::Remux {
            input,
            out_dir,
            min_segment,
        } => remux(&input, &out_dir, min_segment),
        Command::RawH264 { input, output } => extract(&input, &output, true),
        Command::RawAdts { input, output } => extract(&input, &output, false),
        Command::Info { input, json } => info(&input, json),
    }
}

async fn serve(input: &FsPath, listen: SocketAddr, min_segment: u32) -> anyhow::Result<()> {
    let app = Arc::new(load(input, min_segment)?);

    let router = Router::new()
        .route("/", get(index_page))
        .route("/index.html", get(index_page))
        .route("/playlist.m3u8", get(playlist))
        .route("/:segment", get(segment))
        .fallback(not_found)
        .with_state(app);

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("listening on http://{listen}/");
    axum::serve(listener, router).await?;

    Ok(())
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn playlist(State(app): State<Arc<App>>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        app.playlist.clone(),
    )
        .into_response()
}

async fn segment(State(app): State<Arc<App>>, Path(name): Path<String>) -> Response {
    let Some(index) = name
        .strip_suffix(".ts")
        .and_then(|n| n.parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
        .filter(|&n| n < app.segments.len())
    else {
        return not_found().await;
    };

    let result = tokio::task::spawn_blocking(move || render_segment(&app, index)).await;

    match result {
        Ok(Ok(data)) => ([(header::CONTENT_TYPE, "video/mp2t")], data).into_response(),
        Ok(Err(err)) => {
            log::error!("segment {}: {err:#}", segment_uri(index));
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(err) => {
            log::error!("segment task panicked: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "not found").into_response()
}

fn remux(input: &FsPath, out_dir: &FsPath, min_segment: u32) -> anyhow::Result<()> {
    let app = load(input, min_segment)?;

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    std::fs::write(out_dir.join("playlist.m3u8"), &app.playlist)?;

    for index in 0..app.segments.len() {
        let name = segment_uri(index);
        let data = render_segment(&app, index)?;
        std::fs::write(out_dir.join(&name), &data)?;
        log::info!("{name}: {} bytes", data.len());
    }

    Ok(())
}

fn extract(input: &FsPath, output: &FsPath, video: bool) -> anyhow::Result<()> {
    let app = load(input, u32::MAX)?;

    let stream = if video {
        app.media.video()
    } else {
        app.media
            .streams
            .iter()
            .find(|s| s.stream_type == mp4hls::StreamType::Audio)
            .ok_or(mp4hls::Error::NoElementaryStream("audio"))?
    };

    let mut out = File::create(output)?;
    let mut buf = Vec::new();
    let mut prev = None;

    for sample in stream.samples.iter() {
        let payload = app.source.read_at(sample.offset, sample.size as usize)?;
        buf.clear();
        stream
            .packager
            .write_sample(sample, prev.as_ref(), &payload, &mut buf)?;
        out.write_all(&buf)?;
        prev = Some(*sample);
    }

    log::info!("{}: {} samples", output.display(), stream.samples.len());
    Ok(())
}

fn info(input: &FsPath, json: bool) -> anyhow::Result<()> {
    let mut file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let mp4 = Mp4File::read(&mut file)?;

    if json {
        println!("{}", mp4.moov.to_json()?);
        return Ok(());
    }

    if let Some(ftyp) = &mp4.ftyp {
        println!("ftyp: {}", ftyp.summary()?);
    }
    if let Some(mvhd) = &mp4.moov.mvhd {
        println!("mvhd: {}", mvhd.summary()?);
    }
    for trak in mp4.moov.traks.iter() {
        println!("trak: {}", trak.summary()?);
        if let Some(stbl) = trak.stbl() {
            if let Some(stsd) = &stbl.stsd {
                println!("  stsd: {}", stsd.summary()?);
            }
            if let Some(stsz) = &stbl.stsz {
                println!("  stsz: {}", stsz.summary()?);
            }
        }
    }

    Ok(())
}

const INDEX_HTML: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>mp4hls</title>
<style>body{margin:0;background:#000}video{width:100vw;height:100vh}</style>
</head>
<body>
<video id="video" controls autoplay muted></video>
<script src="https://cdn.jsdelivr.net/npm/hls.js@1"></script>
<script>
const video = document.getElementById('video');
const src = '/playlist.m3u8';
if (Hls.isSupported()) {
  const hls = new Hls();
  hls.loadSource(src);
  hls.attachMedia(video);
} else if (video.canPlayType('application/vnd.apple.mpegurl')) {
  video.src = src;
}
</script>
</body>
</html>
"#;
