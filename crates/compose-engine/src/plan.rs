//! Deterministic file names and argument lists for each pipeline pass.
//!
//! Every intermediate key is derived from the zero-based segment index, so
//! running the same snapshot twice issues the same commands.

use anitemp_common::config::NormalizeProfile;

pub const CONCAT_MANIFEST: &str = "concat.txt";
pub const OUTPUT_FILE: &str = "output.mp4";

pub fn input_name(index: usize) -> String {
    format!("input{index}.mp4")
}

pub fn normalized_name(index: usize) -> String {
    format!("normalized{index}.mp4")
}

pub fn processed_name(index: usize) -> String {
    format!("processed{index}.mp4")
}

/// Re-encode `input{i}` to the common profile.
///
/// Frames are scaled to fit and letterboxed so every segment shares one
/// resolution, frame rate, pixel format and audio layout. Sources without
/// audio get a silent track so the concat demuxer sees uniform streams.
pub fn normalize_args(index: usize, has_audio: bool, profile: &NormalizeProfile) -> Vec<String> {
    let (w, h) = (profile.width, profile.height);
    let video_filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
         setsar=1,fps={fps},format=yuv420p",
        fps = profile.fps
    );

    let mut args = vec!["-i".to_string(), input_name(index)];
    if !has_audio {
        args.extend([
            "-f".to_string(),
            "lavfi".to_string(),
            "-i".to_string(),
            "anullsrc=channel_layout=stereo:sample_rate=48000".to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-shortest".to_string(),
        ]);
    }
    args.extend(["-vf".to_string(), video_filter]);
    args.extend(video_codec_args(profile));
    args.extend([
        "-c:a".to_string(),
        profile.audio_codec.clone(),
        "-b:a".to_string(),
        format!("{}k", profile.audio_bitrate_kbps),
        "-ar".to_string(),
        "48000".to_string(),
        "-ac".to_string(),
        "2".to_string(),
    ]);
    args.extend(container_args());
    args.push(normalized_name(index));
    args
}

/// Apply a transition filter to `normalized{i}`, writing `processed{i}`.
pub fn transition_args(index: usize, filter: &str, profile: &NormalizeProfile) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        normalized_name(index),
        "-vf".to_string(),
        filter.to_string(),
    ];
    args.extend(video_codec_args(profile));
    args.extend(["-c:a".to_string(), "copy".to_string()]);
    args.extend(container_args());
    args.push(processed_name(index));
    args
}

/// Concat-demuxer manifest listing one file per line, in the given order.
pub fn concat_manifest<S: AsRef<str>>(files: &[S]) -> String {
    files
        .iter()
        .map(|f| format!("file '{}'", f.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Single concat-demuxer pass over the manifest into `output.mp4`.
pub fn concat_args(profile: &NormalizeProfile) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        CONCAT_MANIFEST.to_string(),
    ];
    args.extend(video_codec_args(profile));
    args.extend(["-c:a".to_string(), "copy".to_string()]);
    args.extend(container_args());
    args.push(OUTPUT_FILE.to_string());
    args
}

fn video_codec_args(profile: &NormalizeProfile) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        profile.video_codec.clone(),
        "-preset".to_string(),
        profile.preset.clone(),
        "-crf".to_string(),
        profile.crf.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]
}

fn container_args() -> Vec<String> {
    vec![
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-threads".to_string(),
        "0".to_string(),
        "-y".to_string(),
    ]
}
