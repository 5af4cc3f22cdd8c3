use crate::config::FfmpegConfig;
use crate::domain::jobs::ENCODER_PLAYLIST_NAME;
use crate::domain::ladder::{Ladder, GOP_SIZE, SEGMENT_SECONDS};
use crate::error::EncodeError;
use crate::ports::transcoder::Transcoder;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const STDERR_TAIL_LINES: usize = 20;

/// Runs a single multi-output `ffmpeg` invocation per job.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    config: FfmpegConfig,
    timeout: Option<Duration>,
}

impl FfmpegTranscoder {
    pub fn new(config: FfmpegConfig) -> Self {
        Self {
            config,
            timeout: None,
        }
    }

    /// Kill the encoder if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), EncodeError> {
        let binary = self.config.binary.display().to_string();
        info!(
            "Starting encoder: {} {}",
            binary,
            args.iter()
                .map(|arg| arg.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );
        let started = Instant::now();

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EncodeError::Spawn {
                binary: binary.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let stderr_tail = tokio::spawn(async move {
            match stderr {
                Some(stderr) => collect_tail(stderr, STDERR_TAIL_LINES).await,
                None => String::new(),
            }
        });

        let run = async move {
            if let Some(stdout) = stdout {
                report_progress(stdout).await?;
            }
            Ok::<_, EncodeError>(child.wait().await?)
        };

        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run)
                .await
                .map_err(|_| EncodeError::TimedOut(limit))??,
            None => run.await?,
        };

        if !status.success() {
            let stderr_tail = stderr_tail.await.unwrap_or_default();
            return Err(EncodeError::Exited {
                status,
                stderr_tail,
            });
        }

        info!(
            "Encoding completed in {:.2} seconds",
            started.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        source: &Path,
        output_root: &Path,
        ladder: &Ladder,
    ) -> Result<(), EncodeError> {
        for variant in ladder {
            tokio::fs::create_dir_all(output_root.join(variant.dir_name())).await?;
        }
        let args = build_args(source, output_root, ladder, &self.config.preset);
        self.run(args).await
    }
}

/// Arguments for one invocation that splits the source video into one branch
/// per ladder entry, each paired with its own AAC encode of the first audio
/// track, and writes every branch as a VOD HLS rendition.
pub fn build_args(source: &Path, output_root: &Path, ladder: &Ladder, preset: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-y", "-hide_banner", "-nostats", "-progress", "pipe:1", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(source.as_os_str().to_owned());

    let branches: String = ladder.iter().map(|v| format!("[v{}]", v.index)).collect();
    let mut filter = format!("[0:v]split={}{}", ladder.len(), branches);
    for variant in ladder {
        filter.push_str(&format!(
            ";[v{i}]scale={w}:{h}[v{i}out]",
            i = variant.index,
            w = variant.width,
            h = variant.height
        ));
    }

    let mut opts: Vec<String> = vec!["-filter_complex".into(), filter];
    for variant in ladder {
        let i = variant.index;
        opts.extend([
            "-map".into(),
            format!("[v{}out]", i),
            "-map".into(),
            "0:a:0".into(),
            format!("-c:v:{}", i),
            "libx264".into(),
            format!("-b:v:{}", i),
            format!("{}k", variant.video_bitrate_kbps),
            format!("-c:a:{}", i),
            "aac".into(),
            format!("-b:a:{}", i),
            format!("{}k", variant.audio_bitrate_kbps),
        ]);
    }
    opts.extend([
        "-preset".into(),
        preset.to_string(),
        "-g".into(),
        GOP_SIZE.to_string(),
        "-keyint_min".into(),
        GOP_SIZE.to_string(),
        "-sc_threshold".into(),
        "0".into(),
        "-force_key_frames".into(),
        format!("expr:gte(t,n_forced*{})", SEGMENT_SECONDS),
        "-ac".into(),
        "2".into(),
        "-ar".into(),
        "48000".into(),
        "-f".into(),
        "hls".into(),
        "-hls_time".into(),
        SEGMENT_SECONDS.to_string(),
        "-hls_playlist_type".into(),
        "vod".into(),
        "-var_stream_map".into(),
        ladder
            .iter()
            .map(|v| format!("v:{i},a:{i}", i = v.index))
            .collect::<Vec<_>>()
            .join(" "),
        "-hls_segment_filename".into(),
    ]);
    args.extend(opts.into_iter().map(OsString::from));

    let pattern_dir = output_root.join("stream_%v");
    args.push(pattern_dir.join("segment_%03d.ts").into_os_string());
    args.push(pattern_dir.join(ENCODER_PLAYLIST_NAME).into_os_string());
    args
}

/// Encoded position from a `-progress` line (`out_time_us=...`).
pub fn parse_progress(line: &str) -> Option<Duration> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => value.parse::<u64>().ok().map(Duration::from_micros),
        _ => None,
    }
}

async fn report_progress<R: AsyncRead + Unpin>(stdout: R) -> Result<(), EncodeError> {
    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(position) = parse_progress(&line) {
            debug!("Encoded up to {:.1}s", position.as_secs_f64());
        } else if line.trim() == "progress=end" {
            debug!("Encoder reported end of input");
        }
    }
    Ok(())
}

async fn collect_tail<R: AsyncRead + Unpin>(stderr: R, keep: usize) -> String {
    let mut tail: VecDeque<String> = VecDeque::with_capacity(keep);
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Could not read encoder stderr: {}", e);
                break;
            }
        }
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}
