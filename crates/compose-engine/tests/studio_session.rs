//! Editing sessions: handle lifetimes across edits and regenerations.

mod support;

use anitemp_common::error::AnitempError;
use anitemp_compose_engine::Studio;
use anitemp_edit_model::{TemplateRecord, TransitionSpec};

use support::*;

fn template() -> TemplateRecord {
    TemplateRecord::from_json(
        r#"{
            "_id": "tpl-travel",
            "title": "Travel",
            "duration": "9",
            "videos": [
                {"videoFile": {"asset": {"url": "/default1.mp4"}}},
                {"videoFile": {"asset": {"url": "/default2.mp4"}}}
            ],
            "texts": [{"content": "Day one"}],
            "transitions": [{"type": "fade"}]
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_regenerate_releases_previous_artifact() {
    let h = harness(Script::default());
    let store = h.composer.store().clone();
    let mut studio = Studio::from_template(h.composer, &template()).unwrap();
    studio.replace_media(1, b"mine1".to_vec(), "video/mp4").unwrap();
    studio.replace_media(2, b"mine2".to_vec(), "video/mp4").unwrap();

    let (cb, _) = progress_sink();
    let first = studio.generate(cb).await.unwrap().url().to_string();
    assert_eq!(
        contents(studio.artifact().unwrap()),
        "proc:norm:mine1|norm:mine2"
    );

    studio
        .set_transition(2, Some(TransitionSpec::new("zoomout")))
        .unwrap();
    let (cb, _) = progress_sink();
    let second = studio.generate(cb).await.unwrap().url().to_string();

    assert_ne!(first, second);
    assert!(!store.is_live(&first));
    assert!(store.is_live(&second));
    assert_eq!(
        contents(studio.artifact().unwrap()),
        "proc:norm:mine1|proc:norm:mine2"
    );
    // two previews plus one artifact
    assert_eq!(store.live_count(), 3);

    drop(studio);
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn test_failed_generate_leaves_no_artifact() {
    let h = harness(Script {
        fail_on: Some("output.mp4".to_string()),
        ..Script::default()
    });
    let store = h.composer.store().clone();
    let mut studio = Studio::from_template(h.composer, &template()).unwrap();
    studio.replace_media(1, b"a".to_vec(), "video/mp4").unwrap();
    studio.replace_media(2, b"b".to_vec(), "video/mp4").unwrap();

    let (cb, seen) = progress_sink();
    assert!(studio.generate(cb).await.is_err());
    assert!(studio.artifact().is_none());
    assert_eq!(store.live_count(), 2);
    assert!(!seen.lock().unwrap().contains(&100));
}

#[tokio::test]
async fn test_download_saves_artifact() {
    let h = harness(Script::default());
    let mut studio = Studio::from_template(h.composer, &template()).unwrap();
    studio.replace_media(1, b"x".to_vec(), "video/mp4").unwrap();
    studio.replace_media(2, b"y".to_vec(), "video/mp4").unwrap();
    let (cb, _) = progress_sink();
    studio.generate(cb).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = studio.download(dir.path()).await.unwrap();
    assert_eq!(std::fs::read_to_string(path).unwrap(), "proc:norm:x|norm:y");
    assert_eq!(studio.advisory_duration(&[]), Some(9.0));
}

#[tokio::test]
async fn test_busy_generate_keeps_previous_artifact() {
    let h = harness(Script {
        load_delay_ms: 50,
        ..Script::default()
    });
    let other = h.composer.clone();
    let store = h.composer.store().clone();
    let mut studio = Studio::from_template(h.composer, &template()).unwrap();
    studio.replace_media(1, b"a".to_vec(), "video/mp4").unwrap();
    studio.replace_media(2, b"b".to_vec(), "video/mp4").unwrap();

    let (cb, _) = progress_sink();
    let first = studio.generate(cb).await.unwrap().url().to_string();

    let segments = vec![inline_segment(7)];
    let (cb_other, _) = progress_sink();
    let (cb_studio, seen) = progress_sink();
    let (running, rejected) = tokio::join!(other.generate(&segments, cb_other), async {
        studio.generate(cb_studio).await.map(|handle| handle.url().to_string())
    });

    assert!(running.is_ok());
    assert!(matches!(rejected, Err(AnitempError::Busy)));
    assert_eq!(studio.artifact().map(|a| a.url()), Some(first.as_str()));
    assert!(store.is_live(&first));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_studio_generate_runs_as_spawned_task() {
    let h = harness(Script::default());
    let mut studio = Studio::from_template(h.composer, &template()).unwrap();
    studio.replace_media(1, b"x".to_vec(), "video/mp4").unwrap();
    studio.replace_media(2, b"y".to_vec(), "video/mp4").unwrap();

    let task = tokio::spawn(async move {
        let (cb, _) = progress_sink();
        studio.generate(cb).await.map(contents)
    });

    assert_eq!(task.await.unwrap().unwrap(), "proc:norm:x|norm:y");
}
