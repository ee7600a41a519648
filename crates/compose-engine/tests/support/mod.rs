//! Scripted in-memory media engine for pipeline tests.
//!
//! Files live in a shared map. Each exec derives its output from its input
//! so tests can read the composition order straight out of the result:
//! normalize prefixes `norm:`, a transition prefixes `proc:`, and concat
//! joins the manifest entries with `|`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use anitemp_common::config::{AppConfig, LoaderConfig};
use anitemp_common::error::{AnitempError, AnitempResult};
use anitemp_compose_engine::{
    Composer, EngineLoader, MediaEngine, MediaLoader, NativeProgress, NativeProgressFn,
    ObjectHandle, ProbeInfo, ProgressCallback,
};
use anitemp_edit_model::{MediaBlob, Segment, TransitionSpec};

/// Scripted behaviour for one engine family.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Engine load fails.
    pub load_fails: bool,
    /// Delay before `load` returns.
    pub load_delay_ms: u64,
    /// Exec writing this output fails.
    pub fail_on: Option<String>,
    /// Per-output exec delays.
    pub delays_ms: HashMap<String, u64>,
    /// Probes of these files report zero duration.
    pub zero_duration: HashSet<String>,
    /// Probes of these files report no audio stream.
    pub silent: HashSet<String>,
}

/// Everything the engines of one family did.
#[derive(Debug, Default)]
pub struct Recorder {
    pub files: Mutex<HashMap<String, Bytes>>,
    pub ever_written: Mutex<Vec<String>>,
    pub execs: Mutex<Vec<Vec<String>>>,
    pub loads: AtomicUsize,
    pub terminations: AtomicUsize,
}

impl Recorder {
    pub fn remaining_files(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn exec_outputs(&self) -> Vec<String> {
        self.execs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|args| args.last().cloned())
            .collect()
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

pub struct ScriptedLoader {
    script: Arc<Script>,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl EngineLoader for ScriptedLoader {
    async fn load(&self) -> AnitempResult<Box<dyn MediaEngine>> {
        if self.script.load_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.script.load_delay_ms)).await;
        }
        if self.script.load_fails {
            return Err(AnitempError::engine_load("scripted load failure"));
        }
        self.recorder.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedEngine {
            script: Arc::clone(&self.script),
            recorder: Arc::clone(&self.recorder),
            listener: Mutex::new(None),
        }))
    }

    async fn is_available(&self) -> bool {
        !self.script.load_fails
    }
}

pub struct ScriptedEngine {
    script: Arc<Script>,
    recorder: Arc<Recorder>,
    listener: Mutex<Option<NativeProgressFn>>,
}

impl ScriptedEngine {
    fn get(&self, name: &str) -> AnitempResult<Bytes> {
        self.recorder
            .files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| AnitempError::exec("ffmpeg", format!("{name}: No such file")))
    }

    fn render(&self, args: &[String]) -> AnitempResult<Vec<u8>> {
        let is_concat = args.windows(2).any(|w| w[0] == "-f" && w[1] == "concat");
        if is_concat {
            let manifest = self.get("concat.txt")?;
            let parts = String::from_utf8_lossy(&manifest)
                .lines()
                .map(|line| {
                    let name = line.trim_start_matches("file '").trim_end_matches('\'');
                    self.get(name)
                })
                .collect::<AnitempResult<Vec<Bytes>>>()?;
            return Ok(parts.join(&b'|'));
        }

        let input = args
            .windows(2)
            .find(|w| w[0] == "-i")
            .map(|w| w[1].clone())
            .ok_or_else(|| AnitempError::exec("ffmpeg", "no input"))?;
        let data = self.get(&input)?;
        let output = args.last().map(String::as_str).unwrap_or_default();
        let prefix: &[u8] = if output.starts_with("normalized") {
            b"norm:"
        } else {
            b"proc:"
        };
        Ok([prefix, data.as_ref()].concat())
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn write_file(&self, name: &str, data: &[u8]) -> AnitempResult<()> {
        self.recorder.ever_written.lock().unwrap().push(name.to_string());
        self.recorder
            .files
            .lock()
            .unwrap()
            .insert(name.to_string(), Bytes::copy_from_slice(data));
        Ok(())
    }

    async fn read_file(&self, name: &str) -> AnitempResult<Bytes> {
        self.get(name)
    }

    async fn delete_file(&self, name: &str) -> AnitempResult<()> {
        self.recorder
            .files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AnitempError::exec("delete-file", format!("{name}: No such file")))
    }

    async fn list_files(&self) -> AnitempResult<Vec<String>> {
        Ok(self.recorder.remaining_files())
    }

    async fn exec(&self, args: &[String]) -> AnitempResult<()> {
        self.recorder.execs.lock().unwrap().push(args.to_vec());
        let output = args.last().cloned().unwrap_or_default();

        if let Some(ms) = self.script.delays_ms.get(&output) {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        if self.script.fail_on.as_deref() == Some(output.as_str()) {
            return Err(AnitempError::exec("ffmpeg", "scripted failure"));
        }

        let body = self.render(args)?;
        let listener = self.listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            for ratio in [0.25, 0.75, 1.0] {
                listener(NativeProgress {
                    out_time_secs: ratio * 2.0,
                    ratio: Some(ratio),
                });
            }
        }

        self.recorder.ever_written.lock().unwrap().push(output.clone());
        self.recorder
            .files
            .lock()
            .unwrap()
            .insert(output, Bytes::from(body));
        Ok(())
    }

    async fn probe(&self, name: &str) -> AnitempResult<ProbeInfo> {
        self.get(name)?;
        Ok(ProbeInfo {
            duration_secs: Some(if self.script.zero_duration.contains(name) {
                0.0
            } else {
                2.0
            }),
            has_video: true,
            has_audio: !self.script.silent.contains(name),
        })
    }

    fn set_progress_listener(&self, listener: Option<NativeProgressFn>) {
        *self.listener.lock().unwrap() = listener;
    }

    async fn terminate(&self) -> AnitempResult<()> {
        self.set_progress_listener(None);
        self.recorder.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub struct Harness {
    pub composer: Composer,
    pub recorder: Arc<Recorder>,
}

pub fn harness(script: Script) -> Harness {
    harness_with_loader(script, LoaderConfig::default())
}

pub fn harness_with_loader(script: Script, loader: LoaderConfig) -> Harness {
    let recorder = Arc::new(Recorder::default());
    let engines = Arc::new(ScriptedLoader {
        script: Arc::new(script),
        recorder: Arc::clone(&recorder),
    });
    let composer = Composer::new(
        MediaLoader::new(&loader).unwrap(),
        engines,
        &AppConfig::default(),
    );
    Harness { composer, recorder }
}

/// Segment with inline bytes `seg{id}`.
pub fn inline_segment(id: u32) -> Segment {
    Segment::remote(id, format!("/default{id}.mp4"))
        .with_replacement(MediaBlob::new(format!("seg{id}").into_bytes(), "video/mp4"))
}

pub fn with_tag(segment: Segment, tag: &str) -> Segment {
    segment.with_transition(TransitionSpec::new(tag))
}

/// Progress callback that records every value.
pub fn progress_sink() -> (ProgressCallback, Arc<Mutex<Vec<u8>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (Arc::new(move |p| sink.lock().unwrap().push(p)), seen)
}

pub fn contents(handle: &ObjectHandle) -> String {
    String::from_utf8(handle.bytes().to_vec()).unwrap()
}

pub fn assert_monotonic(values: &[u8]) {
    assert!(
        values.windows(2).all(|w| w[0] <= w[1]),
        "progress went backwards: {values:?}"
    );
}
