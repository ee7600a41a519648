//! Media engine abstraction.
//!
//! An engine is a stateful media-processing runtime with its own flat file
//! table. Each composition job loads a fresh instance through an
//! [`EngineLoader`] and terminates it when the job ends.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use anitemp_common::error::{AnitempError, AnitempResult};

/// A native progress event emitted while an exec is running.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeProgress {
    /// Output timestamp reached so far, in seconds.
    pub out_time_secs: f64,

    /// Completed ratio in `[0.0, 1.0]`, when the engine knows the input length.
    pub ratio: Option<f64>,
}

/// Listener for native progress events. May fire zero, one, or many times
/// per exec.
pub type NativeProgressFn = Arc<dyn Fn(NativeProgress) + Send + Sync>;

/// Stream summary returned by [`MediaEngine::probe`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    /// Container duration in seconds, when known.
    pub duration_secs: Option<f64>,

    /// Whether at least one video stream is present.
    pub has_video: bool,

    /// Whether at least one audio stream is present.
    pub has_audio: bool,
}

/// A loaded media-processing runtime.
///
/// Methods take `&self` so several exec futures can be awaited together.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Write a file into the engine's file table, replacing any existing one.
    async fn write_file(&self, name: &str, data: &[u8]) -> AnitempResult<()>;

    /// Read a file from the engine's file table.
    async fn read_file(&self, name: &str) -> AnitempResult<Bytes>;

    /// Delete a file from the engine's file table.
    async fn delete_file(&self, name: &str) -> AnitempResult<()>;

    /// Names currently present in the file table.
    async fn list_files(&self) -> AnitempResult<Vec<String>>;

    /// Run one command with ffmpeg-style arguments.
    async fn exec(&self, args: &[String]) -> AnitempResult<()>;

    /// Inspect a file in the file table.
    async fn probe(&self, name: &str) -> AnitempResult<ProbeInfo>;

    /// Install (or clear) the native progress listener.
    fn set_progress_listener(&self, listener: Option<NativeProgressFn>);

    /// Release the runtime and everything it holds.
    async fn terminate(&self) -> AnitempResult<()>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Creates engine instances. One instance per composition job.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Load runtime and codec assets and return a fresh instance.
    async fn load(&self) -> AnitempResult<Box<dyn MediaEngine>>;

    /// Check if this engine can be loaded on the current system.
    async fn is_available(&self) -> bool;
}

/// Reject names that would escape a flat file table.
pub fn validate_file_name(name: &str) -> AnitempResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(AnitempError::exec(
            "file-table",
            format!("invalid file name {name:?}"),
        ));
    }
    Ok(())
}
