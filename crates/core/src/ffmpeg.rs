//! ffmpeg/ffprobe implementation of [`MediaWorker`].
//!
//! Each operation spawns the tool through `tokio::process`, so awaiting it
//! suspends only the calling task. Non-zero exits become [`MediaError`]s
//! carrying the tool's stderr, and any output file left behind by a failed
//! run is removed before the error is returned.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use serde::Deserialize;

use crate::media::{
    remove_partial_output, validate_merge_inputs, validate_trim_range, MediaError, MediaWorker,
    ProbeInfo,
};

/// Default ffmpeg binary, resolved through `PATH`.
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";

/// Default ffprobe binary, resolved through `PATH`.
pub const DEFAULT_FFPROBE_BIN: &str = "ffprobe";

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Media worker backed by the ffmpeg command-line tools.
#[derive(Debug, Clone)]
pub struct FfmpegWorker {
    ffmpeg_bin: String,
    ffprobe_bin: String,
}

impl Default for FfmpegWorker {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG_BIN, DEFAULT_FFPROBE_BIN)
    }
}

impl FfmpegWorker {
    pub fn new(ffmpeg_bin: impl Into<String>, ffprobe_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Run `ffprobe` on a file and return the parsed JSON output.
    pub async fn probe_raw(&self, path: &Path) -> Result<FfprobeOutput, MediaError> {
        let probe_err = |reason: String| MediaError::Probe {
            path: path.to_string_lossy().to_string(),
            reason,
        };

        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(probe_err("file not found".into()));
        }

        let output = tokio::process::Command::new(&self.ffprobe_bin)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::ToolUnavailable(format!("{}: {e}", self.ffprobe_bin)))?;

        if !output.status.success() {
            return Err(probe_err(format!(
                "exit code {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str::<FfprobeOutput>(&stdout)
            .map_err(|e| probe_err(format!("unparseable ffprobe output: {e}")))
    }

    /// Run ffmpeg with `args`; on failure remove `output_path` and report stderr.
    async fn run_ffmpeg(&self, args: Vec<String>, output_path: &Path) -> Result<(), MediaError> {
        tracing::debug!(bin = %self.ffmpeg_bin, ?args, "Spawning ffmpeg");

        let result: Result<Output, MediaError> = tokio::process::Command::new(&self.ffmpeg_bin)
            .args(&args)
            // Killed if the job future is dropped mid-run.
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| MediaError::ToolUnavailable(format!("{}: {e}", self.ffmpeg_bin)));

        match result {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => {
                remove_partial_output(output_path).await;
                Err(MediaError::Processing(format!(
                    "ffmpeg exit code {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )))
            }
            Err(e) => {
                remove_partial_output(output_path).await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl MediaWorker for FfmpegWorker {
    async fn probe(&self, path: &Path) -> Result<ProbeInfo, MediaError> {
        let raw = self.probe_raw(path).await?;
        probe_info(&raw).ok_or_else(|| MediaError::Probe {
            path: path.to_string_lossy().to_string(),
            reason: "no video stream found".into(),
        })
    }

    async fn trim(
        &self,
        input: &Path,
        output: &Path,
        start_secs: f64,
        end_secs: f64,
    ) -> Result<(), MediaError> {
        validate_trim_range(start_secs, end_secs)?;
        let args = trim_args(input, output, start_secs, end_secs);
        self.run_ffmpeg(args, output).await
    }

    async fn merge(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MediaError> {
        validate_merge_inputs(inputs).await?;

        // Every input is normalised to the first input's frame size so the
        // concat filter sees uniform streams.
        let mut probes = Vec::with_capacity(inputs.len());
        for input in inputs {
            probes.push(self.probe(input).await.map_err(|e| {
                MediaError::Processing(format!("cannot merge {}: {e}", input.display()))
            })?);
        }
        let (width, height) = match (probes[0].width, probes[0].height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => (DEFAULT_MERGE_WIDTH, DEFAULT_MERGE_HEIGHT),
        };
        let with_audio = probes.iter().all(|p| p.has_audio);

        let filter = build_concat_filter(inputs.len(), width, height, with_audio);
        let args = merge_args(inputs, output, &filter, with_audio);
        self.run_ffmpeg(args, output).await
    }
}

/// Frame size used when the first merge input reports no dimensions.
const DEFAULT_MERGE_WIDTH: i32 = 1280;
const DEFAULT_MERGE_HEIGHT: i32 = 720;

// ---------------------------------------------------------------------------
// Command builders
// ---------------------------------------------------------------------------

fn trim_args(input: &Path, output: &Path, start_secs: f64, end_secs: f64) -> Vec<String> {
    vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-ss".into(),
        format!("{start_secs:.3}"),
        "-i".into(),
        input.to_string_lossy().to_string(),
        "-t".into(),
        format!("{:.3}", end_secs - start_secs),
        output.to_string_lossy().to_string(),
    ]
}

fn merge_args(inputs: &[PathBuf], output: &Path, filter: &str, with_audio: bool) -> Vec<String> {
    let mut args: Vec<String> = vec!["-y".into(), "-v".into(), "error".into()];
    for input in inputs {
        args.push("-i".into());
        args.push(input.to_string_lossy().to_string());
    }
    args.push("-filter_complex".into());
    args.push(filter.to_string());
    args.push("-map".into());
    args.push("[outv]".into());
    if with_audio {
        args.push("-map".into());
        args.push("[outa]".into());
    }
    args.push(output.to_string_lossy().to_string());
    args
}

/// Build the `-filter_complex` graph concatenating `count` inputs in order.
///
/// Video streams are scaled and padded to `width`x`height`; audio is only
/// wired in when every input has it.
pub fn build_concat_filter(count: usize, width: i32, height: i32, with_audio: bool) -> String {
    let mut graph = String::new();
    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:v:0]scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,setsar=1[v{i}];"
        ));
    }
    for i in 0..count {
        graph.push_str(&format!("[v{i}]"));
        if with_audio {
            graph.push_str(&format!("[{i}:a:0]"));
        }
    }
    let audio_flag = u8::from(with_audio);
    graph.push_str(&format!("concat=n={count}:v=1:a={audio_flag}[outv]"));
    if with_audio {
        graph.push_str("[outa]");
    }
    graph
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(secs) = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
    {
        return secs.max(0.0);
    }
    // Fall back to the first video stream's duration.
    first_video_stream(probe)
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .map(|secs| secs.max(0.0))
        .unwrap_or(0.0)
}

/// Condense raw ffprobe output into [`ProbeInfo`].
///
/// Returns `None` when the container holds no video stream.
pub fn probe_info(probe: &FfprobeOutput) -> Option<ProbeInfo> {
    let video = first_video_stream(probe)?;
    Some(ProbeInfo {
        duration_secs: parse_duration(probe),
        format_name: probe.format.format_name.clone(),
        video_codec: video.codec_name.clone(),
        width: video.width,
        height: video.height,
        has_audio: probe
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}
