use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serde::Serialize;
use skycam::{
    decoder::{nal_type, split_nal_units, AccessUnitDecoder, VideoDecoder},
    events::VideoPacket,
    recording::list_recordings,
    SkycamConfig,
};
use tokio::fs;
use tracing::{error, info};

/// Frame geometry only labels the emitted access units here
const FRAME_WIDTH: u32 = 960;
const FRAME_HEIGHT: u32 = 720;

/// Report on raw H.264 session recordings.
#[derive(Parser, Debug)]
#[command(name = "skycam-inspect")]
#[command(about = "List skycam recordings and report NAL unit statistics")]
struct Args {
    /// Recording file or directory of recordings (defaults to recording.path in config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Path to skycam configuration file
    #[arg(short = 'c', long, default_value = "skycam.toml")]
    config: PathBuf,

    /// Only list recordings, do not parse them
    #[arg(long)]
    list: bool,

    /// Print reports as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct RecordingReport {
    path: String,
    bytes: u64,
    nal_units: usize,
    access_units: u64,
    keyframes: usize,
    nal_types: BTreeMap<u8, usize>,
    has_session_metadata: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let input = match args.input.clone() {
        Some(input) => input,
        None => {
            let config = SkycamConfig::load_from_file(&args.config)
                .with_context(|| format!("Failed to load {}", args.config.display()))?;
            PathBuf::from(config.recording.path)
        }
    };

    let recordings = collect_recordings(&input)
        .await
        .context("Failed to discover recordings")?;

    if recordings.is_empty() {
        return Err(anyhow!("No recordings found at {}", input.display()));
    }

    if args.list {
        for path in &recordings {
            println!("{}", path.display());
        }
        return Ok(());
    }

    info!("Inspecting {} recording(s)", recordings.len());

    let mut reports = Vec::new();
    for path in recordings {
        match inspect_recording(&path).await {
            Ok(report) => reports.push(report),
            Err(e) => error!("Failed to inspect {}: {}", path.display(), e),
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }

    Ok(())
}

async fn collect_recordings(input: &Path) -> Result<Vec<PathBuf>> {
    let metadata = fs::metadata(input)
        .await
        .with_context(|| format!("Cannot read {}", input.display()))?;

    if metadata.is_dir() {
        Ok(list_recordings(input).await?)
    } else {
        Ok(vec![input.to_path_buf()])
    }
}

async fn inspect_recording(path: &Path) -> Result<RecordingReport> {
    let data = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let units = split_nal_units(&data);
    let mut nal_types = BTreeMap::new();
    for unit in &units {
        if let Some(&header) = unit.first() {
            *nal_types.entry(nal_type(header)).or_insert(0) += 1;
        }
    }
    let keyframes = nal_types.get(&5).copied().unwrap_or(0);

    let mut decoder = AccessUnitDecoder::new(FRAME_WIDTH, FRAME_HEIGHT)
        .with_max_access_unit_bytes(data.len().max(1));
    let mut access_units = 0u64;
    decoder
        .decode(&VideoPacket::new(data.clone()), &mut |_| access_units += 1)
        .map_err(|e| anyhow!("Recording is not a valid Annex-B stream: {}", e))?;
    decoder.flush(&mut |_| access_units += 1);

    Ok(RecordingReport {
        path: path.display().to_string(),
        bytes: data.len() as u64,
        nal_units: units.len(),
        access_units,
        keyframes,
        nal_types,
        has_session_metadata: path.with_extension("json").exists(),
    })
}

fn print_report(report: &RecordingReport) {
    println!("{}", report.path);
    println!("  bytes:        {}", report.bytes);
    println!("  nal units:    {}", report.nal_units);
    println!("  access units: {}", report.access_units);
    println!("  keyframes:    {}", report.keyframes);
    for (nal_type, count) in &report.nal_types {
        println!("    type {:>2}: {}", nal_type, count);
    }
    if report.has_session_metadata {
        println!("  metadata:     {}", Path::new(&report.path).with_extension("json").display());
    }
}
