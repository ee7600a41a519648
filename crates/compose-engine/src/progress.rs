//! Monotonic job progress.
//!
//! [`ProgressReporter`] turns pipeline milestones, native engine events and
//! an elapsed-time heuristic into one non-decreasing percentage:
//!
//! ```text
//!   0 ── start
//!  10 ── engine loaded
//!  10..30  normalize, proportional to segments done
//!  30..40  transitions, proportional to filters done
//!  40..ceiling  concat, mapped from native progress
//! 100 ── confirmed success only
//! ```
//!
//! When nothing has been reported for `stall_window_ms`, a background tick
//! nudges the value up by one. Nudges stay below the next milestone of the
//! current phase and never pass `ceiling`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use anitemp_common::config::ProgressConfig;

use crate::engine::NativeProgress;

/// Callback receiving progress percentages.
pub type ProgressCallback = Arc<dyn Fn(u8) + Send + Sync>;

pub const ENGINE_LOADED: u8 = 10;
pub const NORMALIZE_END: u8 = 30;
pub const TRANSITION_END: u8 = 40;
pub const COMPLETE: u8 = 100;

/// Where the job currently is. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressPhase {
    Idle,
    Loading,
    Normalizing,
    Transitioning,
    Concatenating,
    Complete,
    Failed,
}

impl ProgressPhase {
    fn is_active(self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Normalizing | Self::Transitioning | Self::Concatenating
        )
    }
}

#[derive(Debug)]
struct ReporterState {
    value: u8,
    phase: ProgressPhase,
    last_signal: Instant,
    concat_expected_secs: Option<f64>,
}

struct Inner {
    state: Mutex<ReporterState>,
    callback: ProgressCallback,
    ceiling: u8,
    tick: Duration,
    stall_window: Duration,
}

/// Clamping progress state machine shared by a job and its heuristic task.
///
/// The callback runs while the reporter's lock is held, which keeps the
/// reported sequence ordered; it must not call back into the reporter.
#[derive(Clone)]
pub struct ProgressReporter {
    inner: Arc<Inner>,
}

/// Stops the heuristic task when dropped.
pub struct HeuristicGuard {
    handle: JoinHandle<()>,
}

impl Drop for HeuristicGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl ProgressReporter {
    pub fn new(callback: ProgressCallback, config: &ProgressConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ReporterState {
                    value: 0,
                    phase: ProgressPhase::Idle,
                    last_signal: Instant::now(),
                    concat_expected_secs: None,
                }),
                callback,
                ceiling: config.ceiling.clamp(TRANSITION_END + 1, COMPLETE - 1),
                tick: Duration::from_millis(config.tick_ms.max(1)),
                stall_window: Duration::from_millis(config.stall_window_ms),
            }),
        }
    }

    /// Reset to 0 and report it.
    pub fn start(&self) {
        let mut state = self.lock();
        state.value = 0;
        state.phase = ProgressPhase::Loading;
        state.last_signal = Instant::now();
        state.concat_expected_secs = None;
        (self.inner.callback)(0);
    }

    pub fn engine_loaded(&self) {
        self.milestone(ProgressPhase::Normalizing, ENGINE_LOADED);
    }

    /// `done` of `total` segments normalized.
    pub fn segment_normalized(&self, done: usize, total: usize) {
        let target = band(ENGINE_LOADED, NORMALIZE_END, done, total);
        self.milestone(ProgressPhase::Normalizing, target);
    }

    /// `done` of `total` transition filters finished.
    pub fn transition_finished(&self, done: usize, total: usize) {
        let target = band(NORMALIZE_END, TRANSITION_END, done, total);
        self.milestone(ProgressPhase::Transitioning, target);
    }

    /// Enter the concat phase. `expected_secs` maps native output timestamps
    /// to a ratio when the engine cannot supply one itself.
    pub fn begin_concat(&self, expected_secs: Option<f64>) {
        {
            let mut state = self.lock();
            state.concat_expected_secs = expected_secs.filter(|s| *s > 0.0);
        }
        self.milestone(ProgressPhase::Concatenating, TRANSITION_END);
    }

    /// Feed one native engine event. Outside the concat phase the event only
    /// counts as a sign of life.
    pub fn native(&self, event: NativeProgress) {
        let mut state = self.lock();
        if !state.phase.is_active() {
            return;
        }
        state.last_signal = Instant::now();
        if state.phase != ProgressPhase::Concatenating {
            return;
        }

        let ratio = event.ratio.or_else(|| {
            state
                .concat_expected_secs
                .map(|expected| event.out_time_secs / expected)
        });
        let Some(ratio) = ratio.filter(|r| r.is_finite()) else {
            return;
        };

        let span = f64::from(self.inner.ceiling - TRANSITION_END);
        let target = TRANSITION_END + (ratio.clamp(0.0, 1.0) * span).floor() as u8;
        self.raise(&mut state, target);
    }

    /// Report exactly 100. Only call on confirmed success.
    pub fn complete(&self) {
        let mut state = self.lock();
        if state.phase == ProgressPhase::Failed {
            return;
        }
        state.phase = ProgressPhase::Complete;
        if state.value != COMPLETE {
            state.value = COMPLETE;
            (self.inner.callback)(COMPLETE);
        }
    }

    /// Stop reporting. The value stays where it is.
    pub fn fail(&self) {
        let mut state = self.lock();
        if state.phase != ProgressPhase::Complete {
            state.phase = ProgressPhase::Failed;
        }
    }

    pub fn value(&self) -> u8 {
        self.lock().value
    }

    pub fn phase(&self) -> ProgressPhase {
        self.lock().phase
    }

    /// Start the elapsed-time heuristic on the current tokio runtime.
    pub fn spawn_heuristic(&self) -> HeuristicGuard {
        let reporter = self.clone();
        let tick = self.inner.tick;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !reporter.tick_at(Instant::now()) {
                    break;
                }
            }
        });
        HeuristicGuard { handle }
    }

    /// One heuristic step. Returns `false` once the job has finished.
    pub(crate) fn tick_at(&self, now: Instant) -> bool {
        let mut state = self.lock();
        match state.phase {
            ProgressPhase::Idle => return true,
            phase if !phase.is_active() => return false,
            _ => {}
        }
        if now.saturating_duration_since(state.last_signal) < self.inner.stall_window {
            return true;
        }
        if state.value < self.heuristic_cap(state.phase) {
            state.value += 1;
            (self.inner.callback)(state.value);
        }
        true
    }

    /// The heuristic never crosses the next milestone of the current phase.
    fn heuristic_cap(&self, phase: ProgressPhase) -> u8 {
        match phase {
            ProgressPhase::Loading => ENGINE_LOADED - 1,
            ProgressPhase::Normalizing => NORMALIZE_END - 1,
            ProgressPhase::Transitioning => TRANSITION_END - 1,
            _ => self.inner.ceiling,
        }
    }

    fn milestone(&self, phase: ProgressPhase, target: u8) {
        let mut state = self.lock();
        if !state.phase.is_active() {
            return;
        }
        state.phase = state.phase.max(phase);
        state.last_signal = Instant::now();
        self.raise(&mut state, target);
    }

    fn raise(&self, state: &mut ReporterState, target: u8) {
        let target = target.min(self.inner.ceiling);
        if target > state.value {
            state.value = target;
            (self.inner.callback)(target);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReporterState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Linear position of `done/total` inside `[lo, hi]`, rounded.
fn band(lo: u8, hi: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return hi;
    }
    let frac = (done.min(total) as f64) / (total as f64);
    lo + (frac * f64::from(hi - lo)).round() as u8
}
