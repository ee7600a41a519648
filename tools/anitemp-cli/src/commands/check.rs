//! Check engine availability and configuration.

use anitemp_common::config::AppConfig;
use anitemp_compose_engine::{EngineLoader, FfmpegEngineLoader, MediaEngine};

pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Anitemp System Check");
    println!("{}", "=".repeat(50));

    match config.validate() {
        Ok(()) => println!("[OK] Configuration is valid"),
        Err(e) => println!("[FAIL] Configuration: {e}"),
    }

    let profile = &config.profile;
    println!(
        "     Profile: {}x{} @ {}fps, {} ({}, crf {}), {} {}k",
        profile.width,
        profile.height,
        profile.fps,
        profile.video_codec,
        profile.preset,
        profile.crf,
        profile.audio_codec,
        profile.audio_bitrate_kbps
    );

    let engines = FfmpegEngineLoader::new(config.engine.clone());
    let available = engines.is_available().await;
    if available {
        println!(
            "[OK] Media engine: {} / {}",
            config.engine.ffmpeg_path.display(),
            config.engine.ffprobe_path.display()
        );
    } else {
        println!(
            "[FAIL] Media engine: {} or {} could not be run",
            config.engine.ffmpeg_path.display(),
            config.engine.ffprobe_path.display()
        );
    }

    match engines.load().await {
        Ok(engine) => {
            engine.terminate().await?;
            println!("[OK] Engine file table can be created");
        }
        Err(e) if available => println!("[FAIL] Engine load: {e}"),
        Err(_) => {}
    }

    match &config.loader.base_url {
        Some(url) => println!("[OK] Site-relative media resolves against {url}"),
        None => println!(
            "[OK] Site-relative media resolves against {}",
            config.loader.asset_root.display()
        ),
    }

    println!();
    if available {
        println!("Anitemp is ready to compose.");
    } else {
        println!("Install ffmpeg and ffprobe, or set engine paths in the config file.");
    }

    Ok(())
}
