//! Anitemp Compose Engine
//!
//! Client-side composition pipeline that turns an ordered edit list into a
//! single MP4 published behind an object handle.
//!
//! # Pipeline Architecture
//!
//! ```text
//! segments ──► Media Loader ──► input{i}.mp4
//!                                   │
//!                                   ├── Normalize (scale, pad, fps, aac)
//!                                   │        │
//!                                   │   normalized{i}.mp4 ── probe
//!                                   │        │
//!                                   ├── Transitions (concurrent)
//!                                   │        │
//!                                   │   processed{i}.mp4
//!                                   │        │
//!                                   └── Concat (concat.txt, by index)
//!                                            │
//!                                            ▼
//!                                       output.mp4 ──► HandleStore (blob:)
//! ```
//!
//! Progress from every stage is merged by [`progress::ProgressReporter`]
//! into one non-decreasing percentage that reaches 100 only on success.

pub mod compose;
pub mod engine;
pub mod ffmpeg;
pub mod loader;
pub mod plan;
pub mod progress;
pub mod publisher;
pub mod studio;
pub mod transition;

pub use compose::{ComposeMode, Composer, OUTPUT_MIME};
pub use engine::{EngineLoader, MediaEngine, NativeProgress, NativeProgressFn, ProbeInfo};
pub use ffmpeg::{FfmpegEngine, FfmpegEngineLoader};
pub use loader::MediaLoader;
pub use progress::{ProgressCallback, ProgressPhase, ProgressReporter};
pub use publisher::{HandleSlot, HandleStore, ObjectHandle};
pub use studio::Studio;
