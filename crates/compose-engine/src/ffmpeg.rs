//! ffmpeg-backed media engine.
//!
//! Each instance owns a private scratch directory that acts as its file
//! table. Commands run with that directory as their working directory, so
//! pipeline arguments only ever name flat files. The directory is removed on
//! `terminate` and, failing that, when the instance is dropped.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use anitemp_common::config::EngineConfig;
use anitemp_common::error::{AnitempError, AnitempResult};

use crate::engine::{
    validate_file_name, EngineLoader, MediaEngine, NativeProgress, NativeProgressFn, ProbeInfo,
};

/// Lines of ffmpeg stderr kept in exec failure messages.
const STDERR_TAIL_LINES: usize = 12;

/// Loads [`FfmpegEngine`] instances.
#[derive(Debug, Clone)]
pub struct FfmpegEngineLoader {
    config: EngineConfig,
}

impl FfmpegEngineLoader {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn scratch(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("anitemp-job-");
        match &self.config.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempdir_in(dir)
            }
            None => builder.tempdir(),
        }
    }
}

#[async_trait]
impl EngineLoader for FfmpegEngineLoader {
    async fn load(&self) -> AnitempResult<Box<dyn MediaEngine>> {
        let ffmpeg_version = binary_version(&self.config.ffmpeg_path)
            .await
            .map_err(AnitempError::engine_load)?;
        binary_version(&self.config.ffprobe_path)
            .await
            .map_err(AnitempError::engine_load)?;

        let sandbox = self.scratch().map_err(|e| {
            AnitempError::engine_load(format!("Failed to create engine file table: {e}"))
        })?;
        let root = sandbox.path().to_path_buf();

        tracing::debug!(
            version = %ffmpeg_version,
            root = %root.display(),
            "ffmpeg engine loaded"
        );

        Ok(Box::new(FfmpegEngine {
            ffmpeg: self.config.ffmpeg_path.clone(),
            ffprobe: self.config.ffprobe_path.clone(),
            root,
            sandbox: Mutex::new(Some(sandbox)),
            listener: Mutex::new(None),
        }))
    }

    async fn is_available(&self) -> bool {
        binary_version(&self.config.ffmpeg_path).await.is_ok()
            && binary_version(&self.config.ffprobe_path).await.is_ok()
    }
}

/// A loaded ffmpeg runtime bound to one scratch directory.
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    root: PathBuf,
    sandbox: Mutex<Option<TempDir>>,
    listener: Mutex<Option<NativeProgressFn>>,
}

impl FfmpegEngine {
    /// Resolve a file-table name to its on-disk path.
    fn path_for(&self, name: &str) -> AnitempResult<PathBuf> {
        validate_file_name(name)?;
        if self.is_terminated() {
            return Err(AnitempError::exec("file-table", "engine already terminated"));
        }
        Ok(self.root.join(name))
    }

    fn is_terminated(&self) -> bool {
        self.sandbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    fn current_listener(&self) -> Option<NativeProgressFn> {
        self.listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn write_file(&self, name: &str, data: &[u8]) -> AnitempResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AnitempError::exec("write-file", format!("{name}: {e}")))
    }

    async fn read_file(&self, name: &str) -> AnitempResult<Bytes> {
        let path = self.path_for(name)?;
        tokio::fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| AnitempError::exec("read-file", format!("{name}: {e}")))
    }

    async fn delete_file(&self, name: &str) -> AnitempResult<()> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| AnitempError::exec("delete-file", format!("{name}: {e}")))
    }

    async fn list_files(&self) -> AnitempResult<Vec<String>> {
        if self.is_terminated() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn exec(&self, args: &[String]) -> AnitempResult<()> {
        if self.is_terminated() {
            return Err(AnitempError::exec("ffmpeg", "engine already terminated"));
        }
        let listener = self.current_listener();

        tracing::debug!(args = ?args, "Running ffmpeg");
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.current_dir(&self.root)
            .args(["-hide_banner", "-nostdin", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = std::time::Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| AnitempError::exec("ffmpeg", format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AnitempError::exec("ffmpeg", "Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AnitempError::exec("ffmpeg", "Failed to capture ffmpeg stderr"))?;

        // Input duration is only announced on stderr; share it with the
        // progress reader as f64 bits (0 = unknown).
        let input_duration = Arc::new(AtomicU64::new(0));

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = {
            let input_duration = Arc::clone(&input_duration);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail: Vec<String> = Vec::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    if input_duration.load(Ordering::Relaxed) == 0 {
                        if let Some(secs) = parse_duration_line(&line) {
                            input_duration.store(secs.to_bits(), Ordering::Relaxed);
                        }
                    }
                    tail.push(line);
                    if tail.len() > STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                }
                tail.join("\n")
            })
        };

        let mut lines = BufReader::new(stdout).lines();
        let mut state = ProgressState::default();
        while let Some(line) = lines.next_line().await.map_err(|e| {
            AnitempError::exec("ffmpeg", format!("Failed reading ffmpeg progress: {e}"))
        })? {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            state.update(key, value);
            if key == "progress" {
                if let Some(listener) = &listener {
                    let duration = f64::from_bits(input_duration.load(Ordering::Relaxed));
                    listener(state.report(duration));
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| AnitempError::exec("ffmpeg", format!("Failed to wait on ffmpeg: {e}")))?;

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(AnitempError::exec(
                "ffmpeg",
                format!("exited with {status}: {}", stderr_output.trim()),
            ));
        }

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            output = args.last().map(String::as_str).unwrap_or(""),
            "ffmpeg finished"
        );
        Ok(())
    }

    async fn probe(&self, name: &str) -> AnitempResult<ProbeInfo> {
        let path = self.path_for(name)?;
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration:stream=codec_type",
                "-of",
                "json",
            ])
            .arg(&path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AnitempError::exec("probe", format!("Failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(AnitempError::exec(
                "probe",
                format!(
                    "{name}: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        parse_probe_output(&output.stdout)
            .map_err(|e| AnitempError::exec("probe", format!("{name}: {e}")))
    }

    fn set_progress_listener(&self, listener: Option<NativeProgressFn>) {
        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = listener;
    }

    async fn terminate(&self) -> AnitempResult<()> {
        self.set_progress_listener(None);
        let sandbox = self
            .sandbox
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(dir) = sandbox {
            let root = dir.path().to_path_buf();
            dir.close()
                .map_err(|e| AnitempError::exec("terminate", format!("{}: {e}", root.display())))?;
            tracing::debug!(root = %root.display(), "ffmpeg engine terminated");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Run `<binary> -version` and return its first output line.
async fn binary_version(binary: &Path) -> Result<String, String> {
    let output = Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| format!("{} could not be started: {e}", binary.display()))?;

    if !output.status.success() {
        return Err(format!(
            "{} -version exited with {}",
            binary.display(),
            output.status
        ));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports out_time_ms in microseconds as well.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = (us / 1_000_000.0).max(0.0);
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }

    fn report(&self, input_duration_secs: f64) -> NativeProgress {
        let ratio = if self.complete {
            Some(1.0)
        } else if input_duration_secs > 0.0 {
            Some((self.out_time_secs / input_duration_secs).clamp(0.0, 1.0))
        } else {
            None
        };
        NativeProgress {
            out_time_secs: self.out_time_secs,
            ratio,
        }
    }
}

/// Extract seconds from an ffmpeg banner line such as
/// `  Duration: 00:00:05.03, start: 0.000000, bitrate: 1205 kb/s`.
fn parse_duration_line(line: &str) -> Option<f64> {
    let rest = line.trim_start().strip_prefix("Duration:")?;
    let stamp = rest.trim_start().split(',').next()?.trim();
    parse_timestamp(stamp).filter(|secs| *secs > 0.0)
}

/// Parse `HH:MM:SS.ss` into seconds.
fn parse_timestamp(stamp: &str) -> Option<f64> {
    let mut parts = stamp.split(':');
    let h = parts.next()?.parse::<f64>().ok()?;
    let m = parts.next()?.parse::<f64>().ok()?;
    let s = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(h * 3600.0 + m * 60.0 + s)
}

#[derive(Debug, Deserialize)]
struct ProbeJson {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

fn parse_probe_output(stdout: &[u8]) -> Result<ProbeInfo, serde_json::Error> {
    let parsed: ProbeJson = serde_json::from_slice(stdout)?;
    let has = |kind: &str| {
        parsed
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some(kind))
    };
    Ok(ProbeInfo {
        duration_secs: parsed
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok()),
        has_video: has("video"),
        has_audio: has("audio"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_line() {
        let line = "  Duration: 00:01:05.50, start: 0.000000, bitrate: 1205 kb/s";
        assert_eq!(parse_duration_line(line), Some(65.5));
        assert_eq!(parse_duration_line("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration_line("Stream #0:0: Video: h264"), None);
    }

    #[test]
    fn test_progress_state_ratio() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "2500000");
        state.update("progress", "continue");
        let report = state.report(10.0);
        assert_eq!(report.out_time_secs, 2.5);
        assert_eq!(report.ratio, Some(0.25));

        assert_eq!(state.report(0.0).ratio, None);

        state.update("progress", "end");
        assert_eq!(state.report(0.0).ratio, Some(1.0));
    }

    #[test]
    fn test_negative_out_time_is_clamped() {
        let mut state = ProgressState::default();
        state.update("out_time_ms", "-9223372036854775807");
        assert_eq!(state.out_time_secs, 0.0);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [{"codec_type": "video"}, {"codec_type": "audio"}],
            "format": {"duration": "4.970000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!(info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.duration_secs, Some(4.97));
    }

    #[test]
    fn test_parse_probe_output_without_streams() {
        let info = parse_probe_output(br#"{"format": {}}"#).unwrap();
        assert!(!info.has_video);
        assert_eq!(info.duration_secs, None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_load_failure() {
        let loader = FfmpegEngineLoader::new(EngineConfig {
            ffmpeg_path: PathBuf::from("/nonexistent/anitemp-ffmpeg"),
            ffprobe_path: PathBuf::from("/nonexistent/anitemp-ffprobe"),
            scratch_dir: None,
        });
        assert!(!loader.is_available().await);
        match loader.load().await {
            Err(AnitempError::EngineLoadFailure { message }) => {
                assert!(message.contains("anitemp-ffmpeg"));
            }
            Err(other) => panic!("expected engine load failure, got {other}"),
            Ok(_) => panic!("expected engine load failure, got an engine"),
        }
    }
}
