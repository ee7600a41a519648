//! Composition jobs.
//!
//! A [`Composer`] turns an edit-list snapshot into one published MP4. Each
//! call loads a fresh engine, runs normalize, transitions and concat inside
//! it, publishes the result and tears the engine down again.

use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use futures::future::try_join_all;

use anitemp_common::config::{AppConfig, NormalizeProfile, ProgressConfig};
use anitemp_common::error::{AnitempError, AnitempResult};
use anitemp_edit_model::{ensure_unique_ids, Segment, Transition};

use crate::engine::{EngineLoader, MediaEngine, NativeProgressFn};
use crate::ffmpeg::FfmpegEngineLoader;
use crate::loader::MediaLoader;
use crate::plan;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::publisher::{HandleStore, ObjectHandle};
use crate::transition::filter_for;

pub const OUTPUT_MIME: &str = "video/mp4";

/// Which passes a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeMode {
    /// Normalize, apply transitions, concatenate.
    Transitions,
    /// Normalize and concatenate. Transition tags are ignored.
    Direct,
}

/// Settings shared by every job a composer runs.
#[derive(Debug, Clone)]
struct ComposeSettings {
    profile: NormalizeProfile,
    transition_secs: f64,
    progress: ProgressConfig,
}

/// Entry point for composition. Clones share one busy flag and one
/// [`HandleStore`], so at most one job runs per composer family.
#[derive(Clone)]
pub struct Composer {
    loader: MediaLoader,
    engines: Arc<dyn EngineLoader>,
    settings: Arc<ComposeSettings>,
    store: HandleStore,
    busy: Arc<AtomicBool>,
}

impl Composer {
    pub fn new(loader: MediaLoader, engines: Arc<dyn EngineLoader>, config: &AppConfig) -> Self {
        Self {
            loader,
            engines,
            settings: Arc::new(ComposeSettings {
                profile: config.profile.clone(),
                transition_secs: config.transitions.duration_secs,
                progress: config.progress.clone(),
            }),
            store: HandleStore::new(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Composer backed by the ffmpeg engine and the configured loader.
    pub fn from_config(config: &AppConfig) -> AnitempResult<Self> {
        let loader = MediaLoader::new(&config.loader)?;
        let engines = Arc::new(FfmpegEngineLoader::new(config.engine.clone()));
        Ok(Self::new(loader, engines, config))
    }

    /// Publish outputs into `store` instead of a private one.
    pub fn with_store(mut self, store: HandleStore) -> Self {
        self.store = store;
        self
    }

    pub fn store(&self) -> &HandleStore {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Compose `segments` in order, applying their transitions.
    pub async fn generate(
        &self,
        segments: &[Segment],
        on_progress: ProgressCallback,
    ) -> AnitempResult<ObjectHandle> {
        self.run(segments, on_progress, ComposeMode::Transitions)
            .await
    }

    /// Legacy path: normalize and concatenate only.
    pub async fn generate_direct(
        &self,
        segments: &[Segment],
        on_progress: ProgressCallback,
    ) -> AnitempResult<ObjectHandle> {
        self.run(segments, on_progress, ComposeMode::Direct).await
    }

    async fn run(
        &self,
        segments: &[Segment],
        on_progress: ProgressCallback,
        mode: ComposeMode,
    ) -> AnitempResult<ObjectHandle> {
        check_segments(segments)?;
        let busy = self.reserve()?;
        self.run_reserved(busy, segments, on_progress, mode).await
    }

    /// Claim the busy flag without starting a job, so a caller can release
    /// per-run state only once the run is certain to go ahead.
    pub(crate) fn reserve(&self) -> AnitempResult<BusyGuard<'_>> {
        BusyGuard::acquire(&self.busy)
    }

    /// [`Composer::generate`] under a reservation from [`Composer::reserve`].
    pub(crate) async fn generate_reserved(
        &self,
        busy: BusyGuard<'_>,
        segments: &[Segment],
        on_progress: ProgressCallback,
    ) -> AnitempResult<ObjectHandle> {
        self.run_reserved(busy, segments, on_progress, ComposeMode::Transitions)
            .await
    }

    async fn run_reserved(
        &self,
        _busy: BusyGuard<'_>,
        segments: &[Segment],
        on_progress: ProgressCallback,
        mode: ComposeMode,
    ) -> AnitempResult<ObjectHandle> {
        tracing::info!(segments = segments.len(), ?mode, "Starting composition");
        let start = Instant::now();

        let reporter = ProgressReporter::new(on_progress, &self.settings.progress);
        reporter.start();
        let heuristic = reporter.spawn_heuristic();

        let result = self.run_job(segments, mode, &reporter).await;
        drop(heuristic);

        match &result {
            Ok(handle) => {
                reporter.complete();
                tracing::info!(
                    url = handle.url(),
                    bytes = handle.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Composition finished"
                );
            }
            Err(err) => {
                reporter.fail();
                tracing::warn!(
                    error = %err,
                    kind = err.kind(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Composition failed"
                );
            }
        }
        result
    }

    async fn run_job(
        &self,
        segments: &[Segment],
        mode: ComposeMode,
        reporter: &ProgressReporter,
    ) -> AnitempResult<ObjectHandle> {
        let engine = self.engines.load().await.map_err(|err| match err {
            AnitempError::EngineLoadFailure { .. } => err,
            other => AnitempError::engine_load(other.to_string()),
        })?;
        tracing::info!(engine = engine.name(), "Media engine ready");
        reporter.engine_loaded();

        let job = CompositionJob::new(engine, &self.settings, reporter);
        let outcome = job.execute(&self.loader, segments, mode).await;
        job.finish().await;

        let bytes = outcome?;
        Ok(self.store.create(bytes, OUTPUT_MIME))
    }
}

/// Empty input and duplicate ids are rejected before any engine work.
pub(crate) fn check_segments(segments: &[Segment]) -> AnitempResult<()> {
    if segments.is_empty() {
        return Err(AnitempError::EmptyInput);
    }
    ensure_unique_ids(segments)
}

/// Marks a composer busy for the lifetime of one job.
pub(crate) struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> AnitempResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| AnitempError::Busy)?;
        Ok(Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One engine instance plus the bookkeeping for files written into it.
struct CompositionJob<'a> {
    engine: Box<dyn MediaEngine>,
    settings: &'a ComposeSettings,
    reporter: &'a ProgressReporter,
    written: Mutex<BTreeSet<String>>,
}

impl<'a> CompositionJob<'a> {
    fn new(
        engine: Box<dyn MediaEngine>,
        settings: &'a ComposeSettings,
        reporter: &'a ProgressReporter,
    ) -> Self {
        let listener_reporter = reporter.clone();
        let listener: NativeProgressFn = Arc::new(move |event| listener_reporter.native(event));
        engine.set_progress_listener(Some(listener));

        Self {
            engine,
            settings,
            reporter,
            written: Mutex::new(BTreeSet::new()),
        }
    }

    async fn execute(
        &self,
        loader: &MediaLoader,
        segments: &[Segment],
        mode: ComposeMode,
    ) -> AnitempResult<Bytes> {
        let sources = loader.load_all(segments).await?;
        let total = segments.len();

        let mut durations = Vec::with_capacity(total);
        for (index, bytes) in sources.into_iter().enumerate() {
            durations.push(self.normalize(index, bytes).await?);
            self.reporter.segment_normalized(index + 1, total);
        }

        let processed = match mode {
            ComposeMode::Transitions => self.apply_transitions(segments, &durations).await?,
            ComposeMode::Direct => HashSet::new(),
        };
        self.reporter.transition_finished(processed.len(), processed.len());

        self.concat(total, &processed, durations.iter().sum()).await
    }

    /// Normalize `input{i}` and verify the result. Returns its duration.
    async fn normalize(&self, index: usize, source: Bytes) -> AnitempResult<f64> {
        let input = plan::input_name(index);
        self.write(&input, &source).await?;
        drop(source);

        let has_audio = match self.engine.probe(&input).await {
            Ok(info) => info.has_audio,
            Err(err) => {
                tracing::debug!(index, error = %err, "Input probe failed, assuming audio");
                true
            }
        };

        let output = plan::normalized_name(index);
        self.track(&output);
        self.exec(
            format!("normalize[{index}]"),
            &plan::normalize_args(index, has_audio, &self.settings.profile),
        )
        .await?;
        self.remove(&input).await;

        let info = self
            .engine
            .probe(&output)
            .await
            .map_err(|err| AnitempError::verification(index, err.to_string()))?;
        if !info.has_video {
            return Err(AnitempError::verification(index, "no video stream"));
        }
        match info.duration_secs {
            Some(secs) if secs > 0.0 => {
                tracing::debug!(index, duration_secs = secs, has_audio, "Segment normalized");
                Ok(secs)
            }
            _ => Err(AnitempError::verification(
                index,
                "duration is zero or unknown",
            )),
        }
    }

    /// Run every recognized transition concurrently. Returns the indices
    /// that now have a `processed{i}` file.
    async fn apply_transitions(
        &self,
        segments: &[Segment],
        durations: &[f64],
    ) -> AnitempResult<HashSet<usize>> {
        let planned: Vec<(usize, Transition, f64)> = segments
            .iter()
            .enumerate()
            .filter_map(|(index, segment)| {
                let spec = segment.transition.as_ref()?;
                let Some(kind) = spec.kind() else {
                    tracing::debug!(index, tag = %spec.tag, "Unknown transition, passing through");
                    return None;
                };
                let secs = spec
                    .duration_or(self.settings.transition_secs)
                    .min(durations[index]);
                Some((index, kind, secs))
            })
            .collect();

        let total = planned.len();
        let done = AtomicUsize::new(0);
        let jobs = planned.iter().map(|&(index, kind, secs)| {
            let done = &done;
            async move {
                let filter = filter_for(kind, secs, &self.settings.profile);
                self.track(&plan::processed_name(index));
                self.exec(
                    format!("transition[{index}]"),
                    &plan::transition_args(index, &filter, &self.settings.profile),
                )
                .await?;
                let finished = done.fetch_add(1, Ordering::AcqRel) + 1;
                self.reporter.transition_finished(finished, total);
                tracing::debug!(index, transition = %kind, duration_secs = secs, "Transition applied");
                Ok::<usize, AnitempError>(index)
            }
        });

        Ok(try_join_all(jobs).await?.into_iter().collect())
    }

    async fn concat(
        &self,
        total: usize,
        processed: &HashSet<usize>,
        expected_secs: f64,
    ) -> AnitempResult<Bytes> {
        let files: Vec<String> = (0..total)
            .map(|index| {
                if processed.contains(&index) {
                    plan::processed_name(index)
                } else {
                    plan::normalized_name(index)
                }
            })
            .collect();
        let manifest = plan::concat_manifest(&files);
        self.write(plan::CONCAT_MANIFEST, manifest.as_bytes())
            .await?;

        self.reporter.begin_concat(Some(expected_secs));
        self.track(plan::OUTPUT_FILE);
        self.exec("concat".to_string(), &plan::concat_args(&self.settings.profile))
            .await?;

        let output = self
            .engine
            .read_file(plan::OUTPUT_FILE)
            .await
            .map_err(|err| relabel("concat", err))?;
        if output.is_empty() {
            return Err(AnitempError::exec("concat", "produced an empty output"));
        }
        Ok(output)
    }

    async fn write(&self, name: &str, data: &[u8]) -> AnitempResult<()> {
        self.track(name);
        self.engine.write_file(name, data).await
    }

    async fn exec(&self, step: String, args: &[String]) -> AnitempResult<()> {
        self.engine
            .exec(args)
            .await
            .map_err(|err| relabel(&step, err))
    }

    fn track(&self, name: &str) {
        self.written
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string());
    }

    /// Delete a file early. Failures are left for the final cleanup.
    async fn remove(&self, name: &str) {
        match self.engine.delete_file(name).await {
            Ok(()) => {
                self.written
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(name);
            }
            Err(err) => tracing::debug!(file = name, error = %err, "Early delete failed"),
        }
    }

    /// Delete every tracked file still present, then terminate the engine.
    async fn finish(self) {
        self.engine.set_progress_listener(None);

        let tracked = self.written.into_inner().unwrap_or_else(|e| e.into_inner());
        let present: Option<HashSet<String>> = match self.engine.list_files().await {
            Ok(names) => Some(names.into_iter().collect()),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to list engine files before cleanup");
                None
            }
        };

        for name in tracked {
            if present.as_ref().is_some_and(|p| !p.contains(&name)) {
                continue;
            }
            if let Err(err) = self.engine.delete_file(&name).await {
                tracing::warn!(file = %name, error = %err, "Failed to delete intermediate file");
            }
        }

        if let Err(err) = self.engine.terminate().await {
            tracing::warn!(error = %err, "Failed to terminate media engine");
        }
    }
}

/// Attribute an engine error to the pipeline step that raised it.
fn relabel(step: &str, err: AnitempError) -> AnitempError {
    match err {
        AnitempError::ExecFailure { message, .. } => AnitempError::exec(step, message),
        other => AnitempError::exec(step, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relabel_keeps_message() {
        let err = relabel("normalize[2]", AnitempError::exec("ffmpeg", "exited with 1"));
        match err {
            AnitempError::ExecFailure { step, message } => {
                assert_eq!(step, "normalize[2]");
                assert_eq!(message, "exited with 1");
            }
            other => panic!("expected exec failure, got {other}"),
        }
    }

    #[test]
    fn test_busy_guard_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);
        let guard = BusyGuard::acquire(&flag).unwrap();
        assert!(matches!(BusyGuard::acquire(&flag), Err(AnitempError::Busy)));
        drop(guard);
        assert!(BusyGuard::acquire(&flag).is_ok());
    }
}
